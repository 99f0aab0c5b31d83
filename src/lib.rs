/*!

A runtime for interaction nets.

Rules are compiled to register-machine bytecode and stored in a table keyed by the pair of agent kinds they
rewrite. Nets are compiled to the same bytecode, executed once to build the initial graph, and then reduced by one
or more interpreter instances until no active pair remains.

The public entry point is [`Engine`](api::engine::Engine). Abstract syntax is built with the constructors in
[`api::ast`].

*/

pub mod api;
pub mod abstractions;
mod config;
mod core;

// We re-export abstractions that are meant to be used publicly.
pub use abstractions::{
  log,
  IString
};

// Configuration
pub use config::{Config, HeapMode, OptimiseFlag, OptimiseFlags};

pub use api::{
  engine::{Engine, EngineError, NetReport},
  value::Value,
};

// Errors of the individual layers, as carried by `EngineError`.
pub use crate::core::{
  compiler::{CompileError, CompileErrorKind},
  heap::{CellKind, HeapError, HeapUsage},
  machine::RuntimeError,
};

/// Number of ports an agent cell has room for.
pub const MAX_PORT: usize = 5;
