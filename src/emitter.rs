//! Build-graph emission.
//!
//! Lowers every target's invocation list into Ninja files: one sub-graph
//! per target plus a root graph that wires begin/finish coordination
//! nodes, output-directory creation, and `subninja` includes. A single
//! pass-through rule named `invoke` carries every command; the per-edge
//! `dir` and `exec` bindings supply the variation.
//!
//! Cross-target ordering works in three parts: each target's begin node
//! waits on its dependencies' finish nodes, every invocation edge
//! order-depends on its target's begin node, and the finish node collects
//! every invocation output. Targets without a graph edge between them stay
//! free to build in parallel.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use digest::Digest;
use indexmap::IndexSet;
use md5::Md5;
use thiserror::Error;

use crate::context::{BuildContext, BuildEnvironment, TargetEnvironment, WorkspaceRef};
use crate::formatter::Formatter;
use crate::graph::{Target, TargetGraph};
use crate::invocation::Invocation;
use crate::ninja::{Edge, PHONY, Writer};
use crate::phase::{PhaseContext, PhaseError, PhaseInvocations};
use crate::shell;

/// Name of the single pass-through rule shared by every command edge.
const RULE_NAME: &str = "invoke";

/// Errors that abort build-graph emission.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("failed to write {path}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Phase(#[from] PhaseError),
}

/// Emits the coordinated Ninja description of a whole build.
pub struct NinjaEmitter {
    formatter: Box<dyn Formatter>,
    dry_run: bool,
}

impl NinjaEmitter {
    /// In dry-run mode auxiliary files are not written; the graph files
    /// still are.
    #[must_use]
    pub fn new(formatter: Box<dyn Formatter>, dry_run: bool) -> Self {
        Self { formatter, dry_run }
    }

    /// Emit the root graph and one sub-graph per target, returning the
    /// root graph path.
    ///
    /// Per-target failures (unresolvable target environment) and
    /// per-invocation failures (unresolvable executable) are reported on
    /// the diagnostic stream and skipped; the walk completes either way,
    /// though the emitted graph is then unsuitable for execution.
    ///
    /// # Errors
    ///
    /// Filesystem write failures and missing linker tool specs abort the
    /// emission.
    pub fn emit(
        &self,
        build_environment: &BuildEnvironment,
        context: &BuildContext,
        graph: &TargetGraph,
    ) -> Result<Utf8PathBuf, EmitError> {
        let environment = build_environment
            .base_environment()
            .push_front(context.base_settings.clone());
        let intermediates_directory = Utf8PathBuf::from(environment.resolve("OBJROOT"));

        let mut writer = Writer::new();
        writer.comment("xcplan ninja");
        writer.comment(&format!("Action: {}", context.action));
        match &context.workspace {
            WorkspaceRef::Workspace(path) => writer.comment(&format!("Workspace: {path}")),
            WorkspaceRef::Project(path) => writer.comment(&format!("Project: {path}")),
        }
        if let Some(scheme) = &context.scheme {
            writer.comment(&format!("Scheme: {scheme}"));
        }
        writer.comment(&format!("Configuration: {}", context.configuration));
        writer.newline();

        // Ninja's own intermediate state lives with ours.
        writer.binding("builddir", intermediates_directory.as_str());
        writer.newline();

        // Invocations are fully resolved by now, so one rule passes each
        // command through as-is.
        writer.rule(RULE_NAME, "cd $dir && $exec");

        // Each output directory may only have one producing edge, and
        // directories are shared between targets, so the set spans the
        // whole walk.
        let mut seen_directories: HashSet<Utf8PathBuf> = HashSet::new();

        for target in graph.nodes() {
            self.emit_target(
                &mut writer,
                build_environment,
                context,
                graph,
                target,
                &mut seen_directories,
            )?;
        }

        let path = intermediates_directory.join("build.ninja");
        write_ninja(&writer, &path)?;
        tracing::info!(path = %path, "wrote meta-ninja");
        Ok(path)
    }

    fn emit_target(
        &self,
        writer: &mut Writer,
        build_environment: &BuildEnvironment,
        context: &BuildContext,
        graph: &TargetGraph,
        target: &Target,
        seen_directories: &mut HashSet<Utf8PathBuf>,
    ) -> Result<(), EmitError> {
        // The begin node waits for every direct dependency to finish.
        let dependencies_finished: Vec<String> = graph
            .dependencies(&target.name)
            .iter()
            .map(|dependency| finish_node(dependency))
            .collect();
        let begin = begin_node(&target.name);
        writer.build(&Edge {
            outputs: vec![begin.clone()],
            rule: PHONY.to_owned(),
            inputs: dependencies_finished,
            ..Edge::default()
        });

        let target_environment = match context.target_environment(build_environment, target) {
            Ok(environment) => environment,
            Err(error) => {
                tracing::error!(
                    name = %target.name,
                    error = %error,
                    "couldn't create target environment",
                );
                return Ok(());
            }
        };

        let phase_context = PhaseContext::new(build_environment, &target_environment);
        let phase_invocations =
            PhaseInvocations::resolve(&phase_context, &target.sources, &target.frameworks)?;
        let invocations = phase_invocations.invocations();

        self.emit_output_directories(writer, &begin, invocations, seen_directories);

        let target_path = target_ninja_path(&target_environment);
        let target_writer =
            self.build_target_invocations(target, &target_environment, invocations)?;
        write_ninja(&target_writer, &target_path)?;
        tracing::info!(name = %target.name, path = %target_path, "wrote target ninja");
        writer.subninja(target_path.as_str());

        // The finish node collects every invocation output, with synthetic
        // phony outputs demoted to order-only so their timestamps never
        // drive rebuilds.
        let mut invocation_outputs = Vec::new();
        let mut order_only_outputs = Vec::new();
        for invocation in invocations {
            invocation_outputs.extend(invocation.outputs.iter().map(ToString::to_string));
            order_only_outputs.extend(
                invocation
                    .phony_outputs
                    .iter()
                    .map(|output| phony_output_path(output.as_str())),
            );
        }
        writer.build(&Edge {
            outputs: vec![finish_node(&target.name)],
            rule: PHONY.to_owned(),
            inputs: invocation_outputs,
            order_dependencies: order_only_outputs,
            ..Edge::default()
        });
        Ok(())
    }

    /// Emit one directory-creation edge into the root graph for each output
    /// directory not yet claimed by an earlier target.
    fn emit_output_directories(
        &self,
        writer: &mut Writer,
        begin: &str,
        invocations: &[Invocation],
        seen_directories: &mut HashSet<Utf8PathBuf>,
    ) {
        for invocation in invocations {
            for output in &invocation.outputs {
                let Some(directory) = output.parent() else {
                    continue;
                };
                if directory.as_str().is_empty()
                    || !seen_directories.insert(directory.to_path_buf())
                {
                    continue;
                }

                let description = first_line(&self.formatter.create_auxiliary_directory(directory));
                let command = format!("/bin/mkdir -p {}", shell::escape(directory.as_str()));
                writer.build(&Edge {
                    outputs: vec![directory.to_string()],
                    rule: RULE_NAME.to_owned(),
                    bindings: vec![
                        ("description".to_owned(), description),
                        (
                            "dir".to_owned(),
                            shell::escape(invocation.working_directory.as_str()),
                        ),
                        ("exec".to_owned(), command),
                    ],
                    order_dependencies: vec![begin.to_owned()],
                    ..Edge::default()
                });
            }
        }
    }

    /// Build the sub-graph for one target and write its auxiliary files.
    fn build_target_invocations(
        &self,
        target: &Target,
        target_environment: &TargetEnvironment,
        invocations: &[Invocation],
    ) -> Result<Writer, EmitError> {
        let begin = begin_node(&target.name);

        let mut writer = Writer::new();
        writer.comment("xcplan ninja");
        writer.comment(&format!("Target: {}", target.name));
        writer.newline();

        self.write_auxiliary_files(invocations)?;

        for invocation in invocations {
            // Coordination stubs carry data for the finish node only.
            if invocation.executable.is_empty() {
                continue;
            }

            let Some(executable) = shell::resolve_executable(
                &invocation.executable,
                &target_environment.sdk.executable_search_paths,
            ) else {
                tracing::error!(
                    executable = %invocation.executable,
                    "unable to find executable",
                );
                continue;
            };

            let mut exec = shell::escape(executable.as_str());
            for argument in &invocation.arguments {
                write!(exec, " {}", shell::escape(argument)).expect("write Ninja command");
            }

            let description =
                first_line(&self.formatter.begin_invocation(invocation, executable.as_str()));

            let mut outputs: Vec<String> =
                invocation.outputs.iter().map(ToString::to_string).collect();
            outputs.extend(
                invocation
                    .phony_outputs
                    .iter()
                    .map(|output| phony_output_path(output.as_str())),
            );

            // Inputs that may not exist, such as custom script inputs, get
            // a phony producer so the executor accepts them.
            for phony_input in &invocation.phony_inputs {
                writer.build(&Edge {
                    outputs: vec![phony_input.to_string()],
                    rule: PHONY.to_owned(),
                    ..Edge::default()
                });
            }

            let inputs: Vec<String> = invocation.inputs.iter().map(ToString::to_string).collect();
            let input_dependencies: Vec<String> = invocation
                .input_dependencies
                .iter()
                .map(ToString::to_string)
                .collect();

            // Output directories are order-only prerequisites: they must
            // exist, but their timestamps are meaningless.
            let mut order_dependencies: Vec<String> = invocation
                .order_dependencies
                .iter()
                .map(ToString::to_string)
                .collect();
            let output_directories: IndexSet<&Utf8Path> = invocation
                .outputs
                .iter()
                .filter_map(|output| output.parent())
                .filter(|directory| !directory.as_str().is_empty())
                .collect();
            order_dependencies.extend(output_directories.iter().map(|d| d.to_string()));
            order_dependencies.push(begin.clone());

            writer.build(&Edge {
                outputs,
                rule: RULE_NAME.to_owned(),
                inputs,
                bindings: vec![
                    ("description".to_owned(), description),
                    (
                        "dir".to_owned(),
                        shell::escape(invocation.working_directory.as_str()),
                    ),
                    ("exec".to_owned(), exec),
                ],
                input_dependencies,
                order_dependencies,
            });
        }

        Ok(writer)
    }

    /// Materialize every auxiliary file, truncating previous contents.
    ///
    /// Dry-run mode skips this entirely even though the executor will want
    /// the files; that mismatch is long-standing behavior.
    fn write_auxiliary_files(&self, invocations: &[Invocation]) -> Result<(), EmitError> {
        if self.dry_run {
            return Ok(());
        }
        for invocation in invocations {
            for auxiliary_file in &invocation.auxiliary_files {
                if let Some(directory) = auxiliary_file.path.parent() {
                    fs::create_dir_all(directory).map_err(|source| EmitError::Write {
                        path: directory.to_path_buf(),
                        source,
                    })?;
                }
                fs::write(&auxiliary_file.path, &auxiliary_file.contents).map_err(|source| {
                    EmitError::Write {
                        path: auxiliary_file.path.clone(),
                        source,
                    }
                })?;
                if auxiliary_file.executable {
                    make_executable(&auxiliary_file.path)?;
                }
            }
        }
        Ok(())
    }
}

/// Phony node marking the start of a target's build.
fn begin_node(target: &str) -> String {
    format!("begin-target-{target}")
}

/// Phony node marking the completion of a target's build.
fn finish_node(target: &str) -> String {
    format!("finish-target-{target}")
}

/// The target's graph file lives in its temp dir, which is target-specific
/// and therefore conflict-free.
fn target_ninja_path(target_environment: &TargetEnvironment) -> Utf8PathBuf {
    Utf8PathBuf::from(target_environment.environment.resolve("TARGET_TEMP_DIR")).join("build.ninja")
}

/// The executor only renders single-line status messages.
fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or("").to_owned()
}

/// Synthetic output path substituted when a later invocation modifies an
/// earlier invocation's output in place.
///
/// The executor allows one producer per path, so the in-place writer gets
/// a stable content-addressed stand-in instead. Equal inputs collide;
/// disambiguating genuine multi-writer cases would need the invocation's
/// command line folded into the key.
#[must_use]
pub fn phony_output_path(phony_output: &str) -> String {
    let hex = encode_hex(&Md5::digest(phony_output.as_bytes()));
    format!(".ninja-phony-output-{hex}")
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Serialize `writer` to `path` in binary mode, creating parents as needed.
fn write_ninja(writer: &Writer, path: &Utf8Path) -> Result<(), EmitError> {
    if let Some(directory) = path.parent() {
        fs::create_dir_all(directory).map_err(|source| EmitError::Write {
            path: directory.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, writer.serialize().as_bytes()).map_err(|source| EmitError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn make_executable(path: &Utf8Path) -> Result<(), EmitError> {
    use std::os::unix::fs::PermissionsExt;

    let write_error = |source| EmitError::Write {
        path: path.to_path_buf(),
        source,
    };
    let metadata = fs::metadata(path).map_err(write_error)?;
    let mut permissions = metadata.permissions();
    if permissions.mode() & 0o111 == 0 {
        permissions.set_mode(0o755);
        fs::set_permissions(path, permissions).map_err(write_error)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Utf8Path) -> Result<(), EmitError> {
    Ok(())
}
