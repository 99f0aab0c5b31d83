/*!

# Heap Manager

Each worker owns one `Heap` holding two arenas, one for agent cells and one for name cells. Cells are handed out by
next-fit search over a ring of hoops (see `hoop`) and returned by clearing their occupied flag. Nothing else in the
crate touches cell occupancy.

The storage (`Heap`) is shared: any worker may read, write, or free any cell. The allocation state (`HeapCursor`)
belongs to the owning worker alone, which is what makes claiming a free cell race-free without a compare-and-swap.

Two modes exist. Flex mode starts with two hoops of `2^init_exponent` cells per arena and links in a larger hoop
whenever a full lap of the ring finds nothing free. Fixed mode allocates a single slab per arena and reports
`HeapError::Exhausted` when it runs out.

Mark-and-sweep is not part of normal operation. It only runs to recover after a runtime error (see
`machine::free`), using the `Marked` flag and `Heap::sweep`.

*/

mod cell;
mod heap_error;
mod hoop;

use std::{
  fmt::{Display, Formatter},
  ops::Add,
  sync::atomic::{AtomicIsize, Ordering::Relaxed},
};

use crate::{
  api::value::CellRef,
  config::HeapMode,
  core::kind_table::KindId,
};

pub use cell::{AgentCell, Cell, CellFlag, CellFlags, NameCell};
pub use heap_error::{CellKind, HeapError};
pub use hoop::{Arena, CursorPolicy, Growth, HoopRing, MAX_HOOPS};

/// Live cell counts.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct HeapUsage {
  pub agents: usize,
  pub names : usize,
}

impl Add for HeapUsage {
  type Output = HeapUsage;

  fn add(self, rhs: HeapUsage) -> HeapUsage {
    HeapUsage {
      agents: self.agents + rhs.agents,
      names : self.names + rhs.names,
    }
  }
}

impl Display for HeapUsage {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "(agent:{}, name:{})", self.agents, self.names)
  }
}

pub struct Heap {
  pub(crate) index : u8,
  pub(crate) agents: Arena<AgentCell>,
  pub(crate) names : Arena<NameCell>,

  // Maintained on every allocation and free, independently of the occupancy flags.
  live_agents: AtomicIsize,
  live_names : AtomicIsize,
}

/// The owning worker's allocation state for one `Heap`.
pub struct HeapCursor {
  agents: HoopRing,
  names : HoopRing,
}

impl Heap {
  /// Creates heap number `index` for one of `workers` workers, together with its cursor.
  pub fn new(index: u8, mode: HeapMode, workers: usize) -> Result<(Heap, HeapCursor), HeapError> {
    let heap = Heap {
      index,
      agents     : Arena::new(),
      names      : Arena::new(),
      live_agents: AtomicIsize::new(0),
      live_names : AtomicIsize::new(0),
    };

    let (initial_hoops, size, growth) = match mode {
      HeapMode::Flex { init_exponent, increment_exponent } => {
        let exponent = init_exponent.min(hoop::MAX_HOOP_EXPONENT);
        (2, 1usize << exponent, Growth::Flex { increment_exponent })
      }
      HeapMode::Fixed { capacity } => {
        (1, (capacity / workers.max(1)).max(1), Growth::Fixed)
      }
    };

    let agents = HoopRing::new(
      &heap.agents, CellKind::Agent, index, initial_hoops, size, CursorPolicy::StayOnFound, growth
    )?;
    let names = HoopRing::new(
      &heap.names, CellKind::Name, index, initial_hoops, size, CursorPolicy::StepBehind, growth
    )?;

    Ok((heap, HeapCursor { agents, names }))
  }

  #[inline(always)]
  pub fn alloc_agent(&self, cursor: &mut HeapCursor, kind: KindId) -> Result<CellRef, HeapError> {
    let cell = cursor.agents.allocate(&self.agents)?;
    self.agents.get(cell).set_kind(kind);
    self.live_agents.fetch_add(1, Relaxed);
    Ok(cell)
  }

  #[inline(always)]
  pub fn alloc_name(&self, cursor: &mut HeapCursor) -> Result<CellRef, HeapError> {
    let cell = cursor.names.allocate(&self.names)?;
    self.names.get(cell).clear();
    self.live_names.fetch_add(1, Relaxed);
    Ok(cell)
  }

  #[inline(always)]
  pub fn free_agent(&self, cell: CellRef) {
    self.agents.get(cell).release();
    self.live_agents.fetch_sub(1, Relaxed);
  }

  /// Frees two agent cells of this heap, the two halves of an interaction, with one counter update.
  #[inline(always)]
  pub fn free2(&self, first: CellRef, second: CellRef) {
    self.agents.get(first).release();
    self.agents.get(second).release();
    self.live_agents.fetch_sub(2, Relaxed);
  }

  #[inline(always)]
  pub fn free_name(&self, cell: CellRef) {
    self.names.get(cell).release();
    self.live_names.fetch_sub(1, Relaxed);
  }

  /// Live cells found by scanning every hoop.
  pub fn usage(&self) -> HeapUsage {
    HeapUsage {
      agents: self.agents.usage(),
      names : self.names.usage(),
    }
  }

  /// Live cells according to the allocation and free counters.
  pub fn counted_usage(&self) -> HeapUsage {
    HeapUsage {
      agents: self.live_agents.load(Relaxed).max(0) as usize,
      names : self.live_names.load(Relaxed).max(0) as usize,
    }
  }

  /// Frees every occupied cell that is not marked and clears all marks. Returns the number of cells reclaimed.
  pub fn sweep(&self, cursor: &mut HeapCursor) -> HeapUsage {
    let reclaimed = HeapUsage {
      agents: sweep_arena(&self.agents),
      names : sweep_arena(&self.names),
    };

    self.live_agents.fetch_sub(reclaimed.agents as isize, Relaxed);
    self.live_names.fetch_sub(reclaimed.names as isize, Relaxed);
    cursor.agents.rewind();
    cursor.names.rewind();

    reclaimed
  }

  #[cfg(feature = "gc_debug")]
  pub fn dump_memory_variables(&self) {
    //                │ Heap 0                 agents        names │
    eprintln!("╭─────────────────────────────────────────────────────────╮");
    eprintln!("│{:<24} {:>15} {:>15}│", format!("Heap {}", self.index), "agents", "names");
    eprintln!("├─────────────────────────────────────────────────────────┤");
    eprintln!("│{:<24} {:>15} {:>15}│", "hoops", self.agents.hoops().count(), self.names.hoops().count());
    eprintln!("│{:<24} {:>15} {:>15}│", "capacity", self.agents.capacity(), self.names.capacity());
    let usage   = self.usage();
    let counted = self.counted_usage();
    eprintln!("│{:<24} {:>15} {:>15}│", "occupied (scan)", usage.agents, usage.names);
    eprintln!("│{:<24} {:>15} {:>15}│", "occupied (counter)", counted.agents, counted.names);
    eprintln!("╰─────────────────────────────────────────────────────────╯");
  }
}

fn sweep_arena<C: Cell>(arena: &Arena<C>) -> usize {
  let mut reclaimed = 0;
  for (_, hoop) in arena.hoops() {
    for cell in hoop {
      let flags = cell.flags();
      if flags.contains(CellFlag::Marked) {
        cell.unmark();
      } else if flags.contains(CellFlag::Occupied) {
        cell.release();
        reclaimed += 1;
      }
    }
  }
  reclaimed
}
