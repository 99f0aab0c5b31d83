/*!

Hoops and the ring allocator that walks them.

An `Arena` owns the storage: a fixed table of set-once hoop slots, so that a hoop, once installed, never moves and
can be read by every worker without locking. A `HoopRing` is the owner's view of that storage: the order in which
hoops are visited and the cursor where the last search stopped. Allocation is next-fit. The search starts at the
cursor, wraps around the ring, and when every cell is occupied a new, larger hoop is linked in right after the
current one.

*/

use once_cell::sync::OnceCell;

use crate::{
  api::value::CellRef,
  core::heap::{
    cell::Cell,
    heap_error::{CellKind, HeapError},
  },
};

/// Upper bound on the number of hoops in one arena.
pub const MAX_HOOPS: usize = 32;
/// Hoops never grow past `2^MAX_HOOP_EXPONENT` cells.
pub const MAX_HOOP_EXPONENT: u32 = 26;

pub struct Arena<C> {
  hoops: Box<[OnceCell<Box<[C]>>]>,
}

impl<C: Cell> Arena<C> {
  pub fn new() -> Self {
    Arena {
      hoops: (0..MAX_HOOPS).map(|_| OnceCell::new()).collect()
    }
  }

  /// Installs hoop `index` with `size` free cells.
  pub(crate) fn install(&self, index: usize, size: usize) -> Result<(), HeapError> {
    let slot = self.hoops.get(index).ok_or(HeapError::TooManyHoops { limit: MAX_HOOPS })?;
    let hoop: Box<[C]> = (0..size).map(|_| C::default()).collect();
    // Installing twice is a bookkeeping bug in the ring, never a race: only the owner installs.
    let _ = slot.set(hoop);
    Ok(())
  }

  #[inline(always)]
  pub fn hoop(&self, index: usize) -> Option<&[C]> {
    self.hoops.get(index).and_then(|hoop| hoop.get()).map(|hoop| &hoop[..])
  }

  /// The cell at `cell`. References are only ever produced by allocation, so the hoop exists.
  #[inline(always)]
  pub fn get(&self, cell: CellRef) -> &C {
    match self.hoop(cell.hoop as usize) {
      Some(hoop) => &hoop[cell.slot as usize],
      None => unreachable!("cell reference {} into a hoop that was never installed", cell),
    }
  }

  /// Installed hoops in index order.
  pub fn hoops(&self) -> impl Iterator<Item = (usize, &[C])> {
    self.hoops
        .iter()
        .enumerate()
        .filter_map(|(index, hoop)| hoop.get().map(|hoop| (index, &hoop[..])))
  }

  /// Position of `cell` when the hoops are laid end to end in index order. Dense, so usable as a bit set index.
  pub fn offset_of(&self, cell: CellRef) -> usize {
    let before: usize = self
        .hoops()
        .take_while(|(index, _)| *index < cell.hoop as usize)
        .map(|(_, hoop)| hoop.len())
        .sum();
    before + cell.slot as usize
  }

  /// Total number of cells in all hoops.
  pub fn capacity(&self) -> usize {
    self.hoops().map(|(_, hoop)| hoop.len()).sum()
  }

  /// Number of occupied cells. Scans every hoop.
  pub fn usage(&self) -> usize {
    self.hoops()
        .map(|(_, hoop)| hoop.iter().filter(|cell| cell.is_occupied()).count())
        .sum()
  }
}

/// Where the cursor goes after a successful search.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CursorPolicy {
  /// Stay on the cell just handed out.
  StayOnFound,
  /// Step one cell back, so that a name freed right after allocation is found again first.
  StepBehind,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Growth {
  /// New hoops are `2^increment_exponent` times the size of the previous one.
  Flex { increment_exponent: u32 },
  /// No growth. Exhaustion is an error.
  Fixed,
}

pub struct HoopRing {
  kind     : CellKind,
  heap     : u8,
  /// Hoop indices in visiting order.
  ring     : Vec<u8>,
  /// Position in `ring` of the hoop holding the cursor.
  position : usize,
  slot     : usize,
  last_size: usize,
  policy   : CursorPolicy,
  growth   : Growth,
}

impl HoopRing {
  /// Creates the ring and installs `initial_hoops` hoops of `size` cells into `arena`.
  pub fn new<C: Cell>(
    arena        : &Arena<C>,
    kind         : CellKind,
    heap         : u8,
    initial_hoops: usize,
    size         : usize,
    policy       : CursorPolicy,
    growth       : Growth,
  ) -> Result<Self, HeapError>
  {
    for index in 0..initial_hoops {
      arena.install(index, size)?;
    }

    Ok(HoopRing {
      kind,
      heap,
      ring     : (0..initial_hoops as u8).collect(),
      position : 0,
      slot     : 0,
      last_size: size,
      policy,
      growth,
    })
  }

  /// Claims a free cell, growing the arena if every hoop is full.
  pub fn allocate<C: Cell>(&mut self, arena: &Arena<C>) -> Result<CellRef, HeapError> {
    if let Some(found) = self.search(arena) {
      return Ok(found);
    }

    match self.growth {
      Growth::Fixed => {
        Err(HeapError::Exhausted { kind: self.kind, capacity: arena.capacity() })
      }

      Growth::Flex { increment_exponent } => {
        let index = self.ring.len();
        let size  = (self.last_size << increment_exponent).min(1 << MAX_HOOP_EXPONENT);
        arena.install(index, size)?;

        crate::info!(4, "heap {}: new {} hoop of {} cells", self.heap, self.kind, size);

        // Linked in right after the current hoop, and searched from its start.
        self.position += 1;
        self.ring.insert(self.position, index as u8);
        self.slot      = 0;
        self.last_size = size;

        self.search(arena).ok_or(HeapError::Exhausted { kind: self.kind, capacity: arena.capacity() })
      }
    }
  }

  /// Next-fit search starting at the cursor. Visits every cell once.
  fn search<C: Cell>(&mut self, arena: &Arena<C>) -> Option<CellRef> {
    let start_slot = self.slot;

    for step in 0..=self.ring.len() {
      let position = (self.position + step) % self.ring.len();
      let index    = self.ring[position];
      let hoop     = arena.hoop(index as usize)?;

      // The first hoop is searched from the cursor on, and its head last, after wrapping around.
      let range = match step {
        0 => start_slot..hoop.len(),
        _ if step == self.ring.len() => 0..start_slot.min(hoop.len()),
        _ => 0..hoop.len(),
      };

      for slot in range {
        let cell = &hoop[slot];
        if !cell.is_occupied() {
          cell.occupy();
          self.position = position;
          self.slot     = match self.policy {
            CursorPolicy::StayOnFound => slot,
            CursorPolicy::StepBehind  => (slot + hoop.len() - 1) % hoop.len(),
          };
          return Some(CellRef::new(self.heap, index, slot as u32));
        }
      }
    }

    None
  }

  /// Returns the cursor to the first hoop. Used after a sweep.
  pub fn rewind(&mut self) {
    self.position = 0;
    self.slot     = 0;
  }
}
