//! Textual serializer for the Ninja build-file format.
//!
//! The writer appends syntactic elements to an owned buffer: comments,
//! file-scope bindings, rules, build edges, and `subninja` includes. It
//! never touches the filesystem and writes path values literally, without
//! interpreting or escaping them; the same call sequence always yields
//! byte-identical output.

use itertools::Itertools;
use std::fmt::Write as _;

/// Rule name Ninja reserves for edges with no command.
pub const PHONY: &str = "phony";

/// A single build statement.
///
/// `input_dependencies` become implicit (`|`) dependencies and
/// `order_dependencies` order-only (`||`) dependencies. Bindings are
/// emitted indented under the edge.
#[derive(Clone, Debug, Default)]
pub struct Edge {
    pub outputs: Vec<String>,
    pub rule: String,
    pub inputs: Vec<String>,
    pub bindings: Vec<(String, String)>,
    pub input_dependencies: Vec<String>,
    pub order_dependencies: Vec<String>,
}

/// Accumulates build-graph text element by element.
#[derive(Clone, Debug, Default)]
pub struct Writer {
    buffer: String,
}

impl Writer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a `# text` comment line.
    pub fn comment(&mut self, text: &str) {
        writeln!(self.buffer, "# {text}").expect("write Ninja comment");
    }

    /// Append a blank separator line.
    pub fn newline(&mut self) {
        self.buffer.push('\n');
    }

    /// Append a file-scope `name = value` binding.
    pub fn binding(&mut self, name: &str, value: &str) {
        writeln!(self.buffer, "{name} = {value}").expect("write Ninja binding");
    }

    /// Append a rule declaration with its command binding.
    pub fn rule(&mut self, name: &str, command: &str) {
        writeln!(self.buffer, "rule {name}").expect("write Ninja rule");
        writeln!(self.buffer, "  command = {command}").expect("write Ninja rule");
    }

    /// Append a `subninja` include of another graph file.
    pub fn subninja(&mut self, path: &str) {
        writeln!(self.buffer, "subninja {path}").expect("write Ninja subninja");
    }

    /// Append a build edge followed by its indented bindings.
    pub fn build(&mut self, edge: &Edge) {
        write!(
            self.buffer,
            "build {}: {}",
            edge.outputs.iter().join(" "),
            edge.rule,
        )
        .expect("write Ninja edge");
        if !edge.inputs.is_empty() {
            write!(self.buffer, " {}", edge.inputs.iter().join(" ")).expect("write Ninja edge");
        }
        if !edge.input_dependencies.is_empty() {
            write!(self.buffer, " | {}", edge.input_dependencies.iter().join(" "))
                .expect("write Ninja edge");
        }
        if !edge.order_dependencies.is_empty() {
            write!(self.buffer, " || {}", edge.order_dependencies.iter().join(" "))
                .expect("write Ninja edge");
        }
        self.buffer.push('\n');
        for (name, value) in &edge.bindings {
            writeln!(self.buffer, "  {name} = {value}").expect("write Ninja edge binding");
        }
    }

    /// Borrow the serialized text.
    #[must_use]
    pub fn serialize(&self) -> &str {
        &self.buffer
    }
}
