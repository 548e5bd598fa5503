//! Build-phase plumbing: contexts, scoped setting levels, and phase
//! composition.
//!
//! A phase resolver turns one build phase of a target into tool
//! invocations. [`PhaseInvocations`] composes the resolved phases into the
//! single ordered list the emitter consumes.

mod frameworks;

pub use frameworks::{FrameworksPhase, FrameworksResolver, PhaseError};

use camino::Utf8PathBuf;
use indexmap::IndexMap;

use crate::context::{BuildEnvironment, TargetEnvironment};
use crate::invocation::Invocation;
use crate::settings::{Environment, Layer};

/// Shared state handed to each phase resolver.
#[derive(Clone, Copy, Debug)]
pub struct PhaseContext<'a> {
    pub build_environment: &'a BuildEnvironment,
    pub target_environment: &'a TargetEnvironment,
}

impl<'a> PhaseContext<'a> {
    #[must_use]
    pub fn new(
        build_environment: &'a BuildEnvironment,
        target_environment: &'a TargetEnvironment,
    ) -> Self {
        Self {
            build_environment,
            target_environment,
        }
    }

    /// Resolve a phase's build files against `environment`, preserving
    /// phase order.
    #[must_use]
    pub fn resolve_build_files(
        &self,
        environment: &Environment,
        files: &[BuildFile],
    ) -> IndexMap<String, ResolvedFile> {
        files
            .iter()
            .map(|file| {
                let path = Utf8PathBuf::from(environment.resolve_value(&file.path));
                (file.id.clone(), ResolvedFile { path })
            })
            .collect()
    }
}

/// Settings layer activated while resolving one build variant.
///
/// The variant suffix keeps the `normal` variant's products unsuffixed.
#[must_use]
pub fn variant_level(variant: &str) -> Layer {
    let suffix = if variant == "normal" {
        String::new()
    } else {
        format!("_{variant}")
    };
    Layer::new("variant")
        .with("CURRENT_VARIANT", variant)
        .with("EXECUTABLE_VARIANT_SUFFIX", suffix)
}

/// Settings layer activated while resolving one architecture.
#[must_use]
pub fn architecture_level(arch: &str) -> Layer {
    Layer::new("architecture")
        .with("CURRENT_ARCH", arch)
        .with("arch", arch)
}

/// A (file reference, settings) pair from a build phase.
#[derive(Clone, Debug)]
pub struct BuildFile {
    pub id: String,
    /// Path reference; may contain setting references such as `$(SDKROOT)`.
    pub path: String,
}

/// A build file after setting resolution.
#[derive(Clone, Debug)]
pub struct ResolvedFile {
    pub path: Utf8PathBuf,
}

/// Resolved output of the sources phase, consumed when linking.
#[derive(Clone, Debug, Default)]
pub struct SourcesResolver {
    /// Compiler driver used to link, chosen by language runtime decisions
    /// made while resolving sources. Empty means "use the linker spec's
    /// own executable".
    pub linker_driver: String,
    /// Argument prefix composed alongside the driver.
    pub linker_args: Vec<String>,
    /// Invocations produced per (variant, architecture).
    pub variant_architecture_invocations: IndexMap<(String, String), Vec<Invocation>>,
    /// Explicit object-file view per (variant, architecture). When a key is
    /// absent the linker falls back to filtering the invocations' outputs
    /// for the `o` extension.
    pub object_outputs: IndexMap<(String, String), Vec<Utf8PathBuf>>,
}

impl SourcesResolver {
    /// Object files to link for `(variant, arch)`.
    #[must_use]
    pub fn objects_for(&self, variant: &str, arch: &str) -> Vec<Utf8PathBuf> {
        let key = (variant.to_owned(), arch.to_owned());
        if let Some(objects) = self.object_outputs.get(&key) {
            return objects.clone();
        }
        let Some(invocations) = self.variant_architecture_invocations.get(&key) else {
            return Vec::new();
        };
        invocations
            .iter()
            .flat_map(|invocation| &invocation.outputs)
            .filter(|output| output.extension() == Some("o"))
            .cloned()
            .collect()
    }
}

/// The composed invocation list for a target's phases.
#[derive(Debug, Default)]
pub struct PhaseInvocations {
    invocations: Vec<Invocation>,
}

impl PhaseInvocations {
    /// Compose the sources-phase invocations with the frameworks phase.
    ///
    /// Sources invocations come first in map order, then the link phase's
    /// in its own documented order.
    ///
    /// # Errors
    ///
    /// Fails when a linker-category tool spec is missing.
    pub fn resolve(
        context: &PhaseContext<'_>,
        sources: &SourcesResolver,
        frameworks: &FrameworksPhase,
    ) -> Result<Self, PhaseError> {
        let mut invocations: Vec<Invocation> = sources
            .variant_architecture_invocations
            .values()
            .flatten()
            .cloned()
            .collect();
        let resolver = FrameworksResolver::resolve(context, frameworks, sources)?;
        invocations.extend(resolver.into_invocations());
        Ok(Self { invocations })
    }

    #[must_use]
    pub fn invocations(&self) -> &[Invocation] {
        &self.invocations
    }

    #[must_use]
    pub fn into_invocations(self) -> Vec<Invocation> {
        self.invocations
    }
}
