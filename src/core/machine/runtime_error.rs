/*!

Errors raised while reducing a net. Terms are pretty printed when the error is built, because the cells they refer
to are reclaimed by the recovery that follows.

*/

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

use crate::core::heap::HeapError;

#[derive(Clone, Eq, PartialEq)]
pub enum RuntimeError {
  /// An active pair with no user rule, no built-in reduction, and no wildcard rule in either orientation.
  NoRule {
    left : String,
    right: String,
  },
  /// Two integers connected to each other.
  IntegerPair {
    left : i64,
    right: i64,
  },
  /// `%f` applied where `f` has no ports.
  NoArity {
    kind : String,
    left : String,
    right: String,
  },
  DivisionByZero,
  /// An integer instruction found an agent or name in its operand.
  NotAnInteger(String),
  /// A port instruction found something other than an agent.
  NotAnAgent(String),
  /// A port that should be connected was never set.
  DanglingPort {
    kind: String,
    port: usize,
  },
  /// Malformed bytecode at the given address.
  InvalidCode {
    pc: usize,
  },
  /// More equations were set aside by the weak head normal form strategy than the buffer holds.
  DeferredOverflow {
    limit: usize,
  },
  Heap(HeapError),
  /// A worker thread could not be started or panicked.
  WorkerFailed(String),
}

impl RuntimeError {
  /// Whether the error leaves the heap in a state that recovery cannot repair.
  pub fn is_fatal(&self) -> bool {
    matches!(self, RuntimeError::Heap(_) | RuntimeError::WorkerFailed(_) | RuntimeError::InvalidCode { .. })
  }
}

impl From<HeapError> for RuntimeError {
  fn from(error: HeapError) -> Self {
    RuntimeError::Heap(error)
  }
}

impl Display for RuntimeError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {

      RuntimeError::NoRule { left, right } => {
        write!(f, "There is no interaction rule for the following pair:\n  {}~{}", left, right)
      }

      RuntimeError::IntegerPair { left, right } => {
        write!(f, "{}~{}\nInteger {} >< {} can not be used as an active pair", left, right, left, right)
      }

      RuntimeError::NoArity { kind, left, right } => {
        write!(f, "`{}' has no arity.\n  {}~{}", kind, left, right)
      }

      RuntimeError::DivisionByZero => write!(f, "Division by zero."),

      RuntimeError::NotAnInteger(term) => write!(f, "`{}' is used as an integer.", term),

      RuntimeError::NotAnAgent(term) => write!(f, "`{}' is used as an agent.", term),

      RuntimeError::DanglingPort { kind, port } => {
        write!(f, "port {} of `{}' is not connected.", port, kind)
      }

      RuntimeError::InvalidCode { pc } => write!(f, "invalid instruction at {}.", pc),

      RuntimeError::DeferredOverflow { limit } => {
        write!(f, "the buffer of {} deferred equations becomes full.", limit)
      }

      RuntimeError::Heap(error) => Display::fmt(error, f),

      RuntimeError::WorkerFailed(reason) => write!(f, "a worker failed: {}", reason),

    } // end match on `RuntimeError`
  }
}

impl Debug for RuntimeError {
  fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
    Display::fmt(self, f)
  }
}

impl Error for RuntimeError {}
