//! Target dependency graph.

use camino::Utf8PathBuf;
use indexmap::IndexMap;

use crate::phase::{FrameworksPhase, SourcesResolver};
use crate::settings::Layer;

/// A buildable target: its settings plus resolved phase definitions.
#[derive(Clone, Debug)]
pub struct Target {
    pub name: String,
    /// Target-level setting layer, stacked over the build request's.
    pub settings: Layer,
    pub working_directory: Utf8PathBuf,
    pub frameworks: FrameworksPhase,
    pub sources: SourcesResolver,
}

/// Directed acyclic graph of targets; an edge reads "depends on".
///
/// Iteration follows insertion order. The downstream executor re-sorts the
/// emitted graph, so no topological ordering happens here; cycles are a
/// caller error.
#[derive(Debug, Default)]
pub struct TargetGraph {
    targets: Vec<Target>,
    dependencies: IndexMap<String, Vec<String>>,
}

impl TargetGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_target(&mut self, target: Target) {
        self.targets.push(target);
    }

    /// Record that `target` depends on `dependency`.
    pub fn add_dependency(&mut self, target: &str, dependency: &str) {
        self.dependencies
            .entry(target.to_owned())
            .or_default()
            .push(dependency.to_owned());
    }

    /// Targets in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    /// Direct predecessors of `target`, in registration order.
    #[must_use]
    pub fn dependencies(&self, target: &str) -> &[String] {
        self.dependencies
            .get(target)
            .map_or(&[], Vec::as_slice)
    }
}
