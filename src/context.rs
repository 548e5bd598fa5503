//! Build-wide and per-target context.
//!
//! [`BuildEnvironment`] is the state shared by every target of a build;
//! [`BuildContext`] describes one top-level build request and acts as the
//! factory for per-target environments.

use camino::Utf8PathBuf;
use indexmap::IndexMap;
use thiserror::Error;

use crate::graph::Target;
use crate::settings::{Environment, Layer};
use crate::specs::{Sdk, SpecRegistry};

/// Errors creating a per-target environment.
#[derive(Debug, Error)]
pub enum TargetEnvironmentError {
    #[error("target '{target}' references unknown SDK '{sdk}'")]
    UnknownSdk { target: String, sdk: String },
    #[error("target '{target}' resolves no architectures")]
    NoArchitectures { target: String },
}

/// Settings, tool specs, and SDKs shared for the entire build.
#[derive(Clone, Debug, Default)]
pub struct BuildEnvironment {
    pub base_settings: Layer,
    pub specs: SpecRegistry,
    pub sdks: IndexMap<String, Sdk>,
}

impl BuildEnvironment {
    /// Environment containing only the build-wide base settings.
    #[must_use]
    pub fn base_environment(&self) -> Environment {
        Environment::new().push_front(self.base_settings.clone())
    }

    #[must_use]
    pub fn sdk(&self, name: &str) -> Option<&Sdk> {
        self.sdks.get(name)
    }
}

/// Reference to the workspace or project file driving the build.
#[derive(Clone, Debug)]
pub enum WorkspaceRef {
    Workspace(Utf8PathBuf),
    Project(Utf8PathBuf),
}

/// One top-level build request.
#[derive(Clone, Debug)]
pub struct BuildContext {
    /// Named verb being executed (build, clean, test).
    pub action: String,
    pub scheme: Option<String>,
    pub configuration: String,
    pub workspace: WorkspaceRef,
    /// Settings layered over the build environment for this request.
    pub base_settings: Layer,
}

impl BuildContext {
    /// Resolve the per-target environment for `target`.
    ///
    /// Stacks the target's settings over this context's, resolves the
    /// variant and architecture lists, and snapshots the SDK named by
    /// `SDKROOT`. An empty `VARIANTS` defaults to `normal`.
    ///
    /// # Errors
    ///
    /// Fails when `ARCHS` resolves to nothing or `SDKROOT` names an SDK the
    /// build environment does not carry.
    pub fn target_environment(
        &self,
        build_environment: &BuildEnvironment,
        target: &Target,
    ) -> Result<TargetEnvironment, TargetEnvironmentError> {
        let environment = build_environment
            .base_environment()
            .push_front(self.base_settings.clone())
            .push_front(target.settings.clone());

        let mut variants = split_list(&environment.resolve("VARIANTS"));
        if variants.is_empty() {
            variants.push("normal".to_owned());
        }

        let architectures = split_list(&environment.resolve("ARCHS"));
        if architectures.is_empty() {
            return Err(TargetEnvironmentError::NoArchitectures {
                target: target.name.clone(),
            });
        }

        let sdk_name = environment.resolve("SDKROOT");
        let sdk = build_environment
            .sdk(&sdk_name)
            .cloned()
            .ok_or_else(|| TargetEnvironmentError::UnknownSdk {
                target: target.name.clone(),
                sdk: sdk_name,
            })?;
        let spec_domains = sdk.domains.clone();

        Ok(TargetEnvironment {
            environment,
            variants,
            architectures,
            sdk,
            spec_domains,
            working_directory: target.working_directory.clone(),
        })
    }
}

/// Fully resolved settings and toolchain state for a single target.
#[derive(Clone, Debug)]
pub struct TargetEnvironment {
    pub environment: Environment,
    /// Build variants, in emission order.
    pub variants: Vec<String>,
    /// Architectures, in emission order; never empty.
    pub architectures: Vec<String>,
    pub sdk: Sdk,
    pub spec_domains: Vec<String>,
    pub working_directory: Utf8PathBuf,
}

fn split_list(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_owned).collect()
}
