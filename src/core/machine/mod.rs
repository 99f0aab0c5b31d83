/*!

# The Interpreter

A `Machine` is one reduction worker: a register file, a worklist of pending equations, the allocation cursor for its
own heap, and an interaction counter. Everything else lives in the shared `Runtime`.

Reduction pops an equation and resolves it (`eval`). Names are followed or bound, integers meet the integer
built-ins or an `(A, Int)` rule, and two agents meet a compiled rule (`vm`), a built-in (`builtins`), or a wildcard
rule. New equations go to the machine's own worklist, or to the scheduler's shared worklist while some worker is
asleep.

The remaining modules act on whole terms: `free` reclaims them, `print` renders them, and `whnf` decides which
equations the weak head normal form strategy sets aside.

*/

mod builtins;
mod eval;
mod free;
mod print;
mod runtime_error;
mod vm;
mod whnf;
#[cfg(test)]
mod tests;

use crate::{
  api::value::{CellRef, Value},
  core::{
    bytecode::VM_REG_SIZE,
    heap::HeapCursor,
    kind_table::KindId,
    scheduler::{Equation, Worklist},
    Runtime,
  },
};

pub(crate) use free::{free_term, mark_and_sweep, references_to};
pub(crate) use print::{print_name, print_term};
pub use runtime_error::RuntimeError;

/// Size of the buffer for equations set aside by the weak head normal form strategy.
pub const DEFERRED_LIMIT: usize = 100;

pub(crate) struct Machine {
  pub(crate) id          : u8,
  reg                    : [Value; VM_REG_SIZE],
  pub(crate) worklist    : Worklist,
  pub(crate) cursor      : HeapCursor,
  pub(crate) interactions: u64,
  /// Equations the weak head normal form strategy did not need. Requeued before the next net.
  pub(crate) deferred    : Vec<Equation>,
  pub(crate) whnf        : bool,
}

impl Machine {
  pub fn new(id: u8, cursor: HeapCursor, worklist_capacity: usize) -> Self {
    Machine {
      id,
      reg         : [Value::default(); VM_REG_SIZE],
      worklist    : Worklist::with_capacity(worklist_capacity),
      cursor,
      interactions: 0,
      deferred    : Vec::new(),
      whnf        : false,
    }
  }

  // region Allocation

  #[inline(always)]
  pub(crate) fn new_agent(&mut self, rt: &Runtime, kind: KindId) -> Result<CellRef, RuntimeError> {
    Ok(rt.heaps[self.id as usize].alloc_agent(&mut self.cursor, kind)?)
  }

  #[inline(always)]
  pub(crate) fn new_name(&mut self, rt: &Runtime) -> Result<Value, RuntimeError> {
    Ok(Value::Name(rt.heaps[self.id as usize].alloc_name(&mut self.cursor)?))
  }

  // endregion

  // region Equations

  /// Queues an equation. While some worker sleeps the equation is handed to it instead.
  #[inline(always)]
  pub(crate) fn push(&mut self, rt: &Runtime, left: Value, right: Value) {
    if rt.is_threaded() && rt.scheduler.has_sleepers() {
      rt.scheduler.push(left, right);
    } else {
      self.worklist.push(left, right);
    }
  }

  /// Like `push`, but an unbound name on either side is connected on the spot. Only valid where no other worker can
  /// see the names, i.e. while building a net on one worker.
  pub(crate) fn my_push(&mut self, rt: &Runtime, left: Value, right: Value) {
    for (name, term) in [(left, right), (right, left)] {
      if let Value::Name(cell) = name {
        let cell = rt.name(cell);
        if cell.port().is_none() {
          cell.set_port(Some(term));
          return;
        }
      }
    }
    self.push(rt, left, right);
  }

  /// Puts the equations set aside by the weak head normal form strategy back on the worklist.
  pub(crate) fn requeue_deferred(&mut self, rt: &Runtime) {
    for (left, right) in std::mem::take(&mut self.deferred) {
      self.my_push(rt, left, right);
    }
  }

  // endregion

  // region Reduction

  /// Reduces until the worklist is empty. Single worker only.
  pub(crate) fn reduce(&mut self, rt: &Runtime) -> Result<(), RuntimeError> {
    while let Some((left, right)) = self.worklist.pop() {
      if self.whnf {
        self.reduce_to_whnf(rt, left, right)?;
      } else {
        self.eval_equation(rt, left, right)?;
      }
    }
    Ok(())
  }

  /// The loop each worker thread runs. Returns when the scheduler declares the run finished, or on the first
  /// error, after telling the other workers to stop.
  pub(crate) fn work(&mut self, rt: &Runtime) -> Result<(), RuntimeError> {
    crate::trace!(5, "worker {} starts with {} equations", self.id, self.worklist.len());

    loop {
      let equation = match self.worklist.pop() {
        Some(equation) => equation,
        None => match rt.scheduler.idle() {
          Some(equation) => equation,
          None => break,
        },
      };
      if rt.scheduler.is_finished() {
        break;
      }

      let (left, right) = equation;
      if let Err(error) = self.eval_equation(rt, left, right) {
        rt.scheduler.abort();
        return Err(error);
      }
    }

    crate::trace!(5, "worker {} stops after {} interactions", self.id, self.interactions);
    Ok(())
  }

  // endregion
}

/// Port `index` of the agent in `cell`. An unset port is an error.
#[inline(always)]
pub(crate) fn port(rt: &Runtime, cell: CellRef, index: usize) -> Result<Value, RuntimeError> {
  let agent = rt.agent(cell);
  agent.port(index).ok_or_else(|| {
    RuntimeError::DanglingPort {
      kind: rt.kinds.name(agent.kind()).to_string(),
      port: index,
    }
  })
}

/// The agent cell `value` refers to.
#[inline(always)]
pub(crate) fn agent_cell(rt: &Runtime, value: Value) -> Result<CellRef, RuntimeError> {
  match value {
    Value::Agent(cell) => Ok(cell),
    other => Err(RuntimeError::NotAnAgent(print_term(rt, other))),
  }
}
