//! xcplan core library.
//!
//! Lowers fully resolved per-target tool invocations into a coordinated
//! Ninja build description: a root graph wiring per-target begin/finish
//! coordination nodes, output-directory preparation, and `subninja`
//! includes, plus one sub-graph file per target. The crate plans builds; it
//! never executes them.

pub mod context;
pub mod emitter;
pub mod formatter;
pub mod graph;
pub mod invocation;
pub mod ninja;
pub mod phase;
pub mod settings;
pub mod shell;
pub mod specs;
