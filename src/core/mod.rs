/*!

The runtime proper: the heap, the tables, the compiler, the interpreter, and the scheduler.

A `Runtime` is everything the machines share while reducing. The tables are filled in by the compiler between runs
and only read while workers are active; the heaps and the shared worklist are safe to use from every worker at
once. Each `Machine` holds what is private to one worker, including the allocation cursor for its own heap.

*/

pub(crate) mod bytecode;
pub(crate) mod compiler;
pub(crate) mod heap;
pub(crate) mod kind_table;
pub(crate) mod machine;
pub(crate) mod name_table;
pub(crate) mod rule_table;
pub(crate) mod scheduler;

use crate::{
  api::value::{CellRef, Value},
  core::{
    heap::{AgentCell, Heap, HeapUsage, NameCell},
    kind_table::{KindId, KindTable},
    name_table::NameTable,
    rule_table::RuleTable,
    scheduler::Scheduler,
  },
};

pub(crate) struct Runtime {
  pub kinds    : KindTable,
  pub names    : NameTable,
  pub rules    : RuleTable,
  /// One heap per worker, indexed by `CellRef::heap`.
  pub heaps    : Vec<Heap>,
  pub scheduler: Scheduler,
}

impl Runtime {
  pub fn new(heaps: Vec<Heap>, worklist_capacity: usize) -> Self {
    Runtime {
      kinds    : KindTable::new(),
      names    : NameTable::new(),
      rules    : RuleTable::new(),
      heaps,
      scheduler: Scheduler::new(worklist_capacity),
    }
  }

  #[inline(always)]
  pub fn is_threaded(&self) -> bool {
    self.heaps.len() > 1
  }

  #[inline(always)]
  pub fn agent(&self, cell: CellRef) -> &AgentCell {
    self.heaps[cell.heap as usize].agents.get(cell)
  }

  #[inline(always)]
  pub fn name(&self, cell: CellRef) -> &NameCell {
    self.heaps[cell.heap as usize].names.get(cell)
  }

  /// Number of ports in use for an agent of `kind`.
  #[inline(always)]
  pub fn arity(&self, kind: KindId) -> usize {
    self.kinds.arity(kind).unwrap_or(0)
  }

  #[inline(always)]
  pub fn free_agent(&self, cell: CellRef) {
    self.heaps[cell.heap as usize].free_agent(cell);
  }

  /// Frees both agents of an interaction.
  #[inline(always)]
  pub fn free2(&self, first: CellRef, second: CellRef) {
    if first.heap == second.heap {
      self.heaps[first.heap as usize].free2(first, second);
    } else {
      self.free_agent(first);
      self.free_agent(second);
    }
  }

  /// Frees a name cell. A global name is also forgotten by the name table.
  #[inline(always)]
  pub fn free_name(&self, cell: CellRef) {
    let name = self.name(cell);
    if let Some(gid) = name.global_id() {
      self.names.erase(gid);
      name.set_global_id(None);
    }
    self.heaps[cell.heap as usize].free_name(cell);
  }

  /// Frees the cell `value` refers to. Integers own no cell.
  #[inline(always)]
  pub fn free_value(&self, value: Value) {
    match value {
      Value::Agent(cell) => self.free_agent(cell),
      Value::Name(cell) => self.free_name(cell),
      Value::Int(_) => {}
    }
  }

  /// A dense index for an agent cell across all heaps.
  pub fn agent_index(&self, cell: CellRef) -> usize {
    let before: usize = self.heaps[..cell.heap as usize].iter().map(|heap| heap.agents.capacity()).sum();
    before + self.heaps[cell.heap as usize].agents.offset_of(cell)
  }

  /// A dense index for a name cell across all heaps.
  pub fn name_index(&self, cell: CellRef) -> usize {
    let before: usize = self.heaps[..cell.heap as usize].iter().map(|heap| heap.names.capacity()).sum();
    before + self.heaps[cell.heap as usize].names.offset_of(cell)
  }

  /// Live cells in every heap, found by scanning.
  pub fn usage(&self) -> HeapUsage {
    self.heaps.iter().map(Heap::usage).fold(HeapUsage::default(), |total, usage| total + usage)
  }

  /// Live cells in every heap, according to the allocation counters.
  pub fn counted_usage(&self) -> HeapUsage {
    self.heaps.iter().map(Heap::counted_usage).fold(HeapUsage::default(), |total, usage| total + usage)
  }
}
