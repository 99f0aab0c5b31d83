/*!

Running out of cells in a fixed-size heap is the only way allocation fails in practice.

*/

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

#[derive(Copy, Clone, Eq, PartialEq)]
pub enum CellKind {
  Agent,
  Name,
}

impl Display for CellKind {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      CellKind::Agent => write!(f, "agent"),
      CellKind::Name  => write!(f, "name"),
    }
  }
}

impl Debug for CellKind {
  fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
    Display::fmt(self, f)
  }
}

#[derive(Clone, Eq, PartialEq)]
pub enum HeapError {
  Exhausted {
    kind    : CellKind,
    capacity: usize,
  },
  TooManyHoops {
    limit: usize,
  },
}

impl Display for HeapError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {

      HeapError::Exhausted { kind: CellKind::Agent, capacity } => {
        write!(
          f,
          "All {} term cells have been consumed. You should have more term cells with -c option.",
          capacity
        )
      }

      HeapError::Exhausted { kind: CellKind::Name, capacity } => {
        write!(
          f,
          "All {} name cells have been consumed. You should have more term cells with -c option.",
          capacity
        )
      }

      HeapError::TooManyHoops { limit } => {
        write!(f, "the heap cannot grow beyond {} hoops.", limit)
      }

    } // end match on `HeapError`
  }
}

impl Debug for HeapError {
  fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
    Display::fmt(self, f)
  }
}

impl Error for HeapError {}
