/*!

The two cell shapes stored in the heap.

Every field is atomic so that cells can be shared between workers through `&`. Only the owning worker allocates
from a heap, which means the transition from free to occupied never races. Any worker may free a cell, and name
ports are bound with a compare-and-swap.

*/

use std::sync::atomic::{
  AtomicU32,
  AtomicU64,
  AtomicU8,
  Ordering::{AcqRel, Acquire, Relaxed, Release},
};

use enumflags2::{bitflags, BitFlags};

use crate::{
  api::value::{Value, EMPTY},
  core::{kind_table::KindId, name_table::GlobalId},
  MAX_PORT,
};

#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CellFlag {
  Occupied = 1 << 0,
  Marked   = 1 << 1,
}

pub type CellFlags = BitFlags<CellFlag, u8>;

/// Behavior shared by agent and name cells: the state byte.
pub trait Cell: Default + Send + Sync {
  fn state(&self) -> &AtomicU8;

  #[inline(always)]
  fn flags(&self) -> CellFlags {
    CellFlags::from_bits_truncate(self.state().load(Acquire))
  }

  #[inline(always)]
  fn is_occupied(&self) -> bool {
    self.flags().contains(CellFlag::Occupied)
  }

  #[inline(always)]
  fn is_marked(&self) -> bool {
    self.flags().contains(CellFlag::Marked)
  }

  /// Claims a free cell. Only the heap's owner calls this.
  #[inline(always)]
  fn occupy(&self) {
    self.state().store(CellFlags::from(CellFlag::Occupied).bits(), Release);
  }

  #[inline(always)]
  fn release(&self) {
    self.state().store(CellFlags::empty().bits(), Release);
  }

  /// Sets the mark flag, returning `true` if the cell was not already marked.
  #[inline(always)]
  fn mark(&self) -> bool {
    let marked = CellFlags::from(CellFlag::Marked).bits();
    self.state().fetch_or(marked, AcqRel) & marked == 0
  }

  #[inline(always)]
  fn unmark(&self) {
    self.state().fetch_and(!CellFlags::from(CellFlag::Marked).bits(), AcqRel);
  }
}

// region AgentCell

/// A kind id and `MAX_PORT` ports. Ports beyond the kind's arity are unused.
pub struct AgentCell {
  state: AtomicU8,
  kind : AtomicU32,
  ports: [AtomicU64; MAX_PORT],
}

impl Default for AgentCell {
  fn default() -> Self {
    AgentCell {
      state: AtomicU8::new(0),
      kind : AtomicU32::new(0),
      ports: Default::default(),
    }
  }
}

impl Cell for AgentCell {
  #[inline(always)]
  fn state(&self) -> &AtomicU8 {
    &self.state
  }
}

impl AgentCell {
  #[inline(always)]
  pub fn kind(&self) -> KindId {
    self.kind.load(Relaxed)
  }

  #[inline(always)]
  pub fn set_kind(&self, kind: KindId) {
    self.kind.store(kind, Relaxed);
  }

  #[inline(always)]
  pub fn port(&self, index: usize) -> Option<Value> {
    Value::decode(self.ports[index].load(Acquire))
  }

  #[inline(always)]
  pub fn set_port(&self, index: usize, value: Option<Value>) {
    self.ports[index].store(Value::encode_port(value), Release);
  }

  /// Replaces `current` by `new` in the port if the port still holds `current`. On failure returns what the port
  /// holds instead.
  #[inline(always)]
  pub fn compare_exchange_port(
    &self,
    index  : usize,
    current: Option<Value>,
    new    : Option<Value>
  ) -> Result<(), Option<Value>>
  {
    self.ports[index]
        .compare_exchange(Value::encode_port(current), Value::encode_port(new), AcqRel, Acquire)
        .map(|_| ())
        .map_err(Value::decode)
  }
}

// endregion

// region NameCell

const NO_GLOBAL: u32 = u32::MAX;

/// A write-once wire end. Global names additionally record their id in the name table.
pub struct NameCell {
  state: AtomicU8,
  gid  : AtomicU32,
  port : AtomicU64,
}

impl Default for NameCell {
  fn default() -> Self {
    NameCell {
      state: AtomicU8::new(0),
      gid  : AtomicU32::new(NO_GLOBAL),
      port : AtomicU64::new(EMPTY),
    }
  }
}

impl Cell for NameCell {
  #[inline(always)]
  fn state(&self) -> &AtomicU8 {
    &self.state
  }
}

impl NameCell {
  /// Resets a freshly claimed cell to an unbound local name.
  #[inline(always)]
  pub fn clear(&self) {
    self.gid.store(NO_GLOBAL, Relaxed);
    self.port.store(EMPTY, Release);
  }

  #[inline(always)]
  pub fn port(&self) -> Option<Value> {
    Value::decode(self.port.load(Acquire))
  }

  /// Unconditionally overwrites the port. Only valid while no other worker can see the name.
  #[inline(always)]
  pub fn set_port(&self, value: Option<Value>) {
    self.port.store(Value::encode_port(value), Release);
  }

  /// Binds an unbound name. If another binding won the race, returns the winner's value.
  #[inline(always)]
  pub fn bind(&self, value: Value) -> Result<(), Value> {
    match self.port.compare_exchange(EMPTY, value.encode(), AcqRel, Acquire) {
      Ok(_) => Ok(()),
      Err(winner) => match Value::decode(winner) {
        Some(winner) => Err(winner),
        // `EMPTY` is the only word that decodes to `None`, and the exchange only fails when the word differs.
        None => Ok(()),
      }
    }
  }

  #[inline(always)]
  pub fn global_id(&self) -> Option<GlobalId> {
    match self.gid.load(Relaxed) {
      NO_GLOBAL => None,
      gid => Some(gid),
    }
  }

  #[inline(always)]
  pub fn set_global_id(&self, gid: Option<GlobalId>) {
    self.gid.store(gid.unwrap_or(NO_GLOBAL), Relaxed);
  }
}

// endregion

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::value::CellRef;

  #[test]
  fn test_flags() {
    let cell = AgentCell::default();
    assert!(!cell.is_occupied());
    cell.occupy();
    assert!(cell.is_occupied());
    assert!(cell.mark());
    assert!(!cell.mark());
    assert!(cell.flags().contains(CellFlag::Occupied | CellFlag::Marked));
    cell.unmark();
    assert!(!cell.is_marked());
    cell.release();
    assert!(cell.flags().is_empty());
  }

  #[test]
  fn test_name_binds_once() {
    let name = NameCell::default();
    assert_eq!(name.port(), None);
    assert_eq!(name.bind(Value::Int(1)), Ok(()));
    assert_eq!(name.bind(Value::Agent(CellRef::new(0, 0, 4))), Err(Value::Int(1)));
    assert_eq!(name.port(), Some(Value::Int(1)));
  }

  #[test]
  fn test_agent_port_exchange() {
    let agent = AgentCell::default();
    assert_eq!(agent.compare_exchange_port(1, None, Some(Value::Int(5))), Ok(()));
    assert_eq!(agent.compare_exchange_port(1, None, Some(Value::Int(6))), Err(Some(Value::Int(5))));
  }
}
