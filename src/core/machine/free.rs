/*!

Operations on whole terms: freeing a term, counting where a name is referenced from, splicing a term in place of a
name, and the mark-and-sweep pass that recovers the heap after a runtime error.

All of them walk the graph iteratively. Terms can be arbitrarily deep (a list of a million elements is a chain of a
million agents), and a shared or cyclic structure must not be visited twice.

*/

use crate::{
  abstractions::BitSet,
  api::value::{CellRef, Value},
  core::{
    heap::{Cell, HeapUsage},
    kind_table::{KindId, MERGER_P},
    machine::Machine,
    name_table::GlobalId,
    Runtime,
  },
  MAX_PORT,
};

/// Ports of an agent of `kind` that may hold a live value.
#[inline(always)]
pub(crate) fn ports_in_use(rt: &Runtime, kind: KindId) -> usize {
  match kind {
    // The locks live in ports 1 and 2.
    MERGER_P => 3,
    _ => rt.arity(kind).min(MAX_PORT),
  }
}

/// A depth-first walk that yields every live agent and name cell reachable from its roots once.
pub(crate) struct Walk<'r> {
  rt    : &'r Runtime,
  agents: BitSet,
  names : BitSet,
  stack : Vec<Value>,
}

impl<'r> Walk<'r> {
  pub fn new(rt: &'r Runtime, root: Value) -> Self {
    Walk {
      rt,
      agents: BitSet::new(),
      names : BitSet::new(),
      stack : vec![root],
    }
  }
}

impl Iterator for Walk<'_> {
  type Item = Value;

  fn next(&mut self) -> Option<Value> {
    while let Some(value) = self.stack.pop() {
      match value {
        Value::Int(_) => {}

        Value::Name(cell) => {
          let name = self.rt.name(cell);
          if !name.is_occupied() || !self.names.insert(self.rt.name_index(cell)) {
            continue;
          }
          if let Some(port) = name.port() {
            self.stack.push(port);
          }
          return Some(value);
        }

        Value::Agent(cell) => {
          let agent = self.rt.agent(cell);
          if !agent.is_occupied() || !self.agents.insert(self.rt.agent_index(cell)) {
            continue;
          }
          for i in (0..ports_in_use(self.rt, agent.kind())).rev() {
            if let Some(port) = agent.port(i) {
              self.stack.push(port);
            }
          }
          return Some(value);
        }
      }
    }
    None
  }
}

/// Number of ports in `value`'s cell that hold `target`.
fn occurrences_in(rt: &Runtime, value: Value, target: Value) -> usize {
  match value {
    Value::Name(cell) => (rt.name(cell).port() == Some(target)) as usize,
    Value::Agent(cell) => {
      let agent = rt.agent(cell);
      (0..ports_in_use(rt, agent.kind())).filter(|i| agent.port(*i) == Some(target)).count()
    }
    Value::Int(_) => 0,
  }
}

/// How many times the terms of the global names refer to `name`, and the first global found doing so. The term of
/// `name`'s own global, if it is one, does not count.
pub(crate) fn references_to(rt: &Runtime, name: CellRef) -> (usize, Option<GlobalId>) {
  let target = Value::Name(name);
  let mut count    = 0;
  let mut referrer = None;

  for (gid, _, global) in rt.names.live() {
    if global == target {
      continue;
    }
    let found: usize = Walk::new(rt, global).map(|value| occurrences_in(rt, value, target)).sum();
    if found > 0 && referrer.is_none() {
      referrer = Some(gid);
    }
    count += found;
  }

  (count, referrer)
}

/// Puts `term` in place of the name `name` inside the terms of the global names.
pub(crate) fn replace_in_globals(rt: &Runtime, name: Value, term: Value) {
  for (_, _, global) in rt.names.live() {
    if global == name {
      continue;
    }
    for value in Walk::new(rt, global) {
      match value {
        Value::Name(cell) => {
          let cell = rt.name(cell);
          if cell.port() == Some(name) {
            cell.set_port(Some(term));
            return;
          }
        }
        Value::Agent(cell) => {
          let agent = rt.agent(cell);
          if let Some(i) = (0..ports_in_use(rt, agent.kind())).find(|i| agent.port(*i) == Some(name)) {
            agent.set_port(i, Some(term));
            return;
          }
        }
        Value::Int(_) => {}
      }
    }
  }
}

/// Frees every cell of `term`. The name `root`, whose term this is, is left to the caller. An unbound name that
/// another global term still refers to is kept.
pub(crate) fn free_term(rt: &Runtime, root: Option<CellRef>, term: Value) {
  let mut names = BitSet::new();
  let mut stack = vec![term];

  while let Some(value) = stack.pop() {
    match value {
      Value::Int(_) => {}

      Value::Name(cell) => {
        if Some(cell) == root || !rt.name(cell).is_occupied() || !names.insert(rt.name_index(cell)) {
          continue;
        }
        match rt.name(cell).port() {
          Some(next) => {
            rt.free_name(cell);
            stack.push(next);
          }
          None => {
            if references_to(rt, cell).0 < 2 {
              rt.free_name(cell);
            }
          }
        }
      }

      Value::Agent(cell) => {
        let agent = rt.agent(cell);
        if !agent.is_occupied() {
          continue;
        }
        for i in (0..ports_in_use(rt, agent.kind())).rev() {
          if let Some(port) = agent.port(i) {
            stack.push(port);
          }
        }
        rt.free_agent(cell);
      }
    } // end match on value
  }
}

/// Sets the mark flag on every cell reachable from `roots`.
fn mark(rt: &Runtime, roots: Vec<Value>) {
  let mut stack = roots;

  while let Some(value) = stack.pop() {
    match value {
      Value::Int(_) => {}

      Value::Name(cell) => {
        let name = rt.name(cell);
        if name.is_occupied() && name.mark() {
          if let Some(port) = name.port() {
            stack.push(port);
          }
        }
      }

      Value::Agent(cell) => {
        let agent = rt.agent(cell);
        if agent.is_occupied() && agent.mark() {
          for i in 0..ports_in_use(rt, agent.kind()) {
            if let Some(port) = agent.port(i) {
              stack.push(port);
            }
          }
        }
      }
    }
  }
}

/// Recovers after a runtime error. Cells reachable from the global names and the deferred equations survive; every
/// other cell is freed, including those only the pending equations refer to. The pending equations are dropped.
pub(crate) fn mark_and_sweep(rt: &Runtime, machines: &mut [Machine]) -> HeapUsage {
  let mut roots: Vec<Value> = rt.names.live().map(|(_, _, name)| name).collect();
  for machine in machines.iter() {
    for (left, right) in machine.deferred.iter() {
      roots.push(*left);
      roots.push(*right);
    }
  }

  mark(rt, roots);

  let mut reclaimed = HeapUsage::default();
  for (heap, machine) in rt.heaps.iter().zip(machines.iter_mut()) {
    reclaimed = reclaimed + heap.sweep(&mut machine.cursor);
    machine.worklist.clear();
    #[cfg(feature = "gc_debug")]
    heap.dump_memory_variables();
  }
  rt.scheduler.with_shared(|shared| shared.clear());

  crate::info!(3, "recovery reclaimed {}", reclaimed);
  reclaimed
}
