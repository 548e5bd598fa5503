//! Frameworks-phase resolution: linking, universal-binary merging, and
//! debug-symbol extraction.
//!
//! For each build variant this resolver emits one link (or archive)
//! invocation per architecture, merges the per-architecture binaries with
//! `lipo` when more than one architecture is active, and extracts a dSYM
//! when the debug format asks for one. The emission order is load-bearing:
//! the emitter's dependency wiring follows it.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::invocation::Invocation;
use crate::specs::{self, SpecRegistry, ToolSpec};

use super::{PhaseContext, ResolvedFile, SourcesResolver, architecture_level, variant_level};

/// The frameworks build phase: file references linked into the product.
#[derive(Clone, Debug, Default)]
pub struct FrameworksPhase {
    pub files: Vec<super::BuildFile>,
}

/// Errors resolving the frameworks phase.
#[derive(Debug, Error)]
pub enum PhaseError {
    /// A linker-category tool spec is not registered for the active
    /// domains.
    #[error("missing linker tool spec '{identifier}'")]
    MissingLinker { identifier: &'static str },
}

/// Materialized link, archive, merge, and dsym invocations for one target.
#[derive(Debug)]
pub struct FrameworksResolver {
    invocations: Vec<Invocation>,
}

impl FrameworksResolver {
    /// Resolve the frameworks phase into tool invocations.
    ///
    /// `MACH_O_TYPE` selects the active linker: `staticlib` archives with
    /// the archiver spec, everything else links with the driver and
    /// argument prefix the sources phase composed. Per variant the output
    /// binary is `BUILT_PRODUCTS_DIR/EXECUTABLE_PATH` plus the variant
    /// suffix; with multiple architectures each slice lands under the
    /// variant's object-file directory first.
    ///
    /// # Errors
    ///
    /// Fails when any of the four linker-category tool specs is missing.
    pub fn resolve(
        context: &PhaseContext<'_>,
        phase: &FrameworksPhase,
        sources: &SourcesResolver,
    ) -> Result<Self, PhaseError> {
        let target_environment = context.target_environment;
        let registry = &context.build_environment.specs;
        let domains = &target_environment.spec_domains;

        let ld = lookup(registry, specs::LD, domains)?;
        let libtool = lookup(registry, specs::LIBTOOL, domains)?;
        let lipo = lookup(registry, specs::LIPO, domains)?;
        let dsymutil = lookup(registry, specs::DSYMUTIL, domains)?;

        let binary_type = target_environment.environment.resolve("MACH_O_TYPE");

        let (linker, linker_driver, linker_args) = if binary_type == "staticlib" {
            (libtool, String::new(), Vec::new())
        } else {
            (ld, sources.linker_driver.clone(), sources.linker_args.clone())
        };

        let working_directory = target_environment.working_directory.clone();
        let products_directory = target_environment.environment.resolve("BUILT_PRODUCTS_DIR");

        let mut invocations = Vec::new();

        for variant in &target_environment.variants {
            let variant_environment = target_environment
                .environment
                .push_front(variant_level(variant));

            let variant_intermediates_name = format!(
                "{}{}",
                variant_environment.resolve("EXECUTABLE_NAME"),
                variant_environment.resolve("EXECUTABLE_VARIANT_SUFFIX"),
            );
            let variant_intermediates_directory = Utf8PathBuf::from(
                variant_environment.resolve(&format!("OBJECT_FILE_DIR_{variant}")),
            );

            let variant_products_path = format!(
                "{}{}",
                variant_environment.resolve("EXECUTABLE_PATH"),
                variant_environment.resolve("EXECUTABLE_VARIANT_SUFFIX"),
            );
            let variant_products_output =
                Utf8PathBuf::from(format!("{products_directory}/{variant_products_path}"));

            let create_universal_binary = target_environment.architectures.len() > 1;
            let mut universal_binary_inputs = Vec::new();

            for arch in &target_environment.architectures {
                let arch_environment = variant_environment.push_front(architecture_level(arch));

                let build_files = context.resolve_build_files(&arch_environment, &phase.files);
                let files: Vec<ResolvedFile> = build_files.into_values().collect();

                let source_outputs = sources.objects_for(variant, arch);

                let output = if create_universal_binary {
                    variant_intermediates_directory
                        .join(arch)
                        .join(&variant_intermediates_name)
                } else {
                    variant_products_output.clone()
                };

                let step = LinkStep {
                    linker,
                    driver: &linker_driver,
                    prefix_args: &linker_args,
                    objects: &source_outputs,
                    libraries: &files,
                    output: &output,
                    variant,
                    arch,
                    working_directory: &working_directory,
                };
                invocations.push(step.invocation());

                if create_universal_binary {
                    universal_binary_inputs.push(output);
                }
            }

            if create_universal_binary {
                invocations.push(lipo_invocation(
                    lipo,
                    &universal_binary_inputs,
                    &variant_products_output,
                    variant,
                    &working_directory,
                ));
            }

            if variant_environment.resolve("DEBUG_INFORMATION_FORMAT") == "dwarf-with-dsym"
                && binary_type != "staticlib"
                && binary_type != "mh_object"
            {
                let dsym_file = Utf8PathBuf::from(format!(
                    "{}/{}",
                    variant_environment.resolve("DWARF_DSYM_FOLDER_PATH"),
                    variant_environment.resolve("DWARF_DSYM_FILE_NAME"),
                ));
                invocations.push(dsym_invocation(
                    dsymutil,
                    &variant_products_output,
                    &dsym_file,
                    &working_directory,
                ));
            }
        }

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

fn lookup<'r>(
    registry: &'r SpecRegistry,
    identifier: &'static str,
    domains: &[String],
) -> Result<&'r ToolSpec, PhaseError> {
    registry.lookup(identifier, domains).ok_or_else(|| {
        tracing::error!(identifier, "couldn't get linker tools");
        PhaseError::MissingLinker { identifier }
    })
}

/// One link or archive step for a single (variant, architecture) pair.
struct LinkStep<'a> {
    linker: &'a ToolSpec,
    driver: &'a str,
    prefix_args: &'a [String],
    objects: &'a [Utf8PathBuf],
    libraries: &'a [ResolvedFile],
    output: &'a Utf8Path,
    variant: &'a str,
    arch: &'a str,
    working_directory: &'a Utf8Path,
}

impl LinkStep<'_> {
    fn invocation(&self) -> Invocation {
        let executable = if self.driver.is_empty() {
            self.linker.executable.clone()
        } else {
            self.driver.to_owned()
        };

        let object_args = self.objects.iter().map(ToString::to_string);
        let library_args = library_arguments(self.libraries);

        let mut arguments = Vec::new();
        if self.linker.identifier == specs::LIBTOOL {
            arguments.extend([
                "-static".to_owned(),
                "-arch_only".to_owned(),
                self.arch.to_owned(),
                "-o".to_owned(),
                self.output.to_string(),
            ]);
            arguments.extend(object_args);
            arguments.extend(library_args);
        } else {
            arguments.extend(self.prefix_args.iter().cloned());
            arguments.extend(["-arch".to_owned(), self.arch.to_owned()]);
            arguments.extend(object_args);
            arguments.extend(library_args);
            arguments.extend(["-o".to_owned(), self.output.to_string()]);
        }

        let mut inputs = self.objects.to_vec();
        inputs.extend(self.libraries.iter().map(|file| file.path.clone()));

        Invocation {
            executable,
            arguments,
            working_directory: self.working_directory.to_path_buf(),
            inputs,
            outputs: vec![self.output.to_path_buf()],
            description: format!(
                "{} {} {} {}",
                self.linker.name, self.output, self.variant, self.arch,
            ),
            ..Invocation::default()
        }
    }
}

/// Linker arguments for the resolved frameworks-phase files: `.framework`
/// references become `-framework <name>`, everything else is passed by
/// path.
fn library_arguments(files: &[ResolvedFile]) -> Vec<String> {
    let mut arguments = Vec::new();
    for file in files {
        if file.path.extension() == Some("framework") {
            arguments.push("-framework".to_owned());
            arguments.push(file.path.file_stem().unwrap_or_default().to_owned());
        } else {
            arguments.push(file.path.to_string());
        }
    }
    arguments
}

fn lipo_invocation(
    spec: &ToolSpec,
    inputs: &[Utf8PathBuf],
    output: &Utf8Path,
    variant: &str,
    working_directory: &Utf8Path,
) -> Invocation {
    let mut arguments = vec!["-create".to_owned()];
    arguments.extend(inputs.iter().map(ToString::to_string));
    arguments.extend(["-output".to_owned(), output.to_string()]);
    Invocation {
        executable: spec.executable.clone(),
        arguments,
        working_directory: working_directory.to_path_buf(),
        inputs: inputs.to_vec(),
        outputs: vec![output.to_path_buf()],
        description: format!("{} {} {}", spec.name, output, variant),
        ..Invocation::default()
    }
}

fn dsym_invocation(
    spec: &ToolSpec,
    input: &Utf8Path,
    output: &Utf8Path,
    working_directory: &Utf8Path,
) -> Invocation {
    Invocation {
        executable: spec.executable.clone(),
        arguments: vec![input.to_string(), "-o".to_owned(), output.to_string()],
        working_directory: working_directory.to_path_buf(),
        inputs: vec![input.to_path_buf()],
        outputs: vec![output.to_path_buf()],
        description: format!("{} {}", spec.name, output),
        ..Invocation::default()
    }
}
