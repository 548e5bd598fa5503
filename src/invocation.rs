//! Tool invocation descriptions.
//!
//! An [`Invocation`] is constructed fully formed by the phase resolvers and
//! then only read; the emitter never mutates one. The model is backend
//! agnostic: nothing here knows about Ninja syntax.

use camino::Utf8PathBuf;

/// A small generated file (response file, script) that must exist on disk
/// before its invocation runs.
#[derive(Clone, Debug)]
pub struct AuxiliaryFile {
    pub path: Utf8PathBuf,
    /// Byte-exact contents; written in binary mode, truncating any
    /// previous file.
    pub contents: Vec<u8>,
    pub executable: bool,
}

/// A single tool execution.
///
/// An invocation with an empty `executable` but non-empty `outputs` is a
/// coordination stub: no command is generated for it, but its outputs still
/// participate in target wiring.
#[derive(Clone, Debug, Default)]
pub struct Invocation {
    /// Tool path, bare name, or `builtin-` token; empty marks a
    /// coordination stub.
    pub executable: String,
    /// Argument strings before shell escaping.
    pub arguments: Vec<String>,
    /// Directory the executor changes into before invoking.
    pub working_directory: Utf8PathBuf,
    /// Paths that must exist and whose timestamps drive rebuilds.
    pub inputs: Vec<Utf8PathBuf>,
    /// Paths this invocation produces; unique across the whole build.
    pub outputs: Vec<Utf8PathBuf>,
    /// Declared inputs that may not exist; each gets a phony producer.
    pub phony_inputs: Vec<Utf8PathBuf>,
    /// Outputs also produced by an earlier invocation; each is replaced by
    /// a synthetic path so every real path keeps a single producer.
    pub phony_outputs: Vec<Utf8PathBuf>,
    /// Ordered build dependencies treated as inputs for change detection.
    pub input_dependencies: Vec<Utf8PathBuf>,
    /// Must-precede relations that do not drive rebuilds.
    pub order_dependencies: Vec<Utf8PathBuf>,
    pub auxiliary_files: Vec<AuxiliaryFile>,
    /// Single-line status message.
    pub description: String,
}
