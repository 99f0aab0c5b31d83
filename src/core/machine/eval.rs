/*!

Resolution of one equation.

An equation is turned around, followed through names, or handed to a rule until nothing of it is left. Each step
either finishes the equation or produces the next pair to look at, which keeps long chains of built-in reductions
from growing the native stack.

*/

use crate::{
  api::value::{CellRef, Value},
  core::{
    bytecode::{metavar_l, metavar_r, Word, ANNOTATE_L, ANNOTATE_R, RULE_HEADER},
    kind_table::{DUP, ERASER, WILDCARD},
    machine::{print_term, Machine, RuntimeError},
    Runtime,
  },
};

/// What is left of an equation after one reduction step.
pub(crate) enum Step {
  Done,
  Next(Value, Value),
}

impl Machine {
  pub(crate) fn eval_equation(&mut self, rt: &Runtime, left: Value, right: Value) -> Result<(), RuntimeError> {
    let (mut a1, mut a2) = (left, right);

    if crate::log::get_global_logging_threshold() >= 5 {
      crate::trace!(5, "worker {}: {} ~ {}", self.id, print_term(rt, a1), print_term(rt, a2));
    }

    loop {
      let step = match (a1, a2) {
        (_, Value::Name(name)) => match connect(rt, name, a1) {
          Some(term) => Step::Next(a1, term),
          None => Step::Done,
        },

        (Value::Name(name), _) => match connect(rt, name, a2) {
          Some(term) => Step::Next(term, a2),
          None => Step::Done,
        },

        (Value::Int(left), Value::Int(right)) => {
          return Err(RuntimeError::IntegerPair { left, right });
        }

        (Value::Int(_), Value::Agent(_)) => Step::Next(a2, a1),

        (Value::Agent(agent), Value::Int(n)) => self.interact_with_int(rt, agent, n)?,

        (Value::Agent(left), Value::Agent(right)) => self.interact(rt, left, right)?,
      }; // end match on active pair

      match step {
        Step::Done => return Ok(()),
        Step::Next(left, right) => {
          a1 = left;
          a2 = right;
        }
      }
    }
  }

  fn interact_with_int(&mut self, rt: &Runtime, agent: CellRef, n: i64) -> Result<Step, RuntimeError> {
    let kind = rt.agent(agent).kind();

    if let Some(code) = rt.rules.lookup_against_integer(kind) {
      self.fire(rt, code, Value::Agent(agent), Value::Int(n))?;
      return Ok(Step::Done);
    }

    match self.int_builtin(rt, agent, kind, n)? {
      Some(step) => Ok(step),
      None => {
        Err(RuntimeError::NoRule {
          left : print_term(rt, Value::Agent(agent)),
          right: n.to_string(),
        })
      }
    }
  }

  fn interact(&mut self, rt: &Runtime, left: CellRef, right: CellRef) -> Result<Step, RuntimeError> {
    let (mut left, mut right) = (left, right);
    let mut turned = false;

    loop {
      let id_l = rt.agent(left).kind();
      let id_r = rt.agent(right).kind();

      if let Some(code) = rt.rules.lookup(id_l, id_r) {
        self.fire(rt, code, Value::Agent(left), Value::Agent(right))?;
        return Ok(Step::Done);
      }

      if let Some(step) = self.agent_builtin(rt, left, id_l, right, id_r)? {
        return Ok(step);
      }

      if let Some(code) = rt.rules.lookup(id_l, WILDCARD) {
        self.fire(rt, code, Value::Agent(left), Value::Agent(right))?;
        return Ok(Step::Done);
      }

      // Built-ins and wildcard rules are keyed on the left agent, so give the right one its turn.
      if !turned && (id_l < id_r || id_r == ERASER || id_r == DUP) {
        std::mem::swap(&mut left, &mut right);
        turned = true;
        continue;
      }

      return Err(RuntimeError::NoRule {
        left : print_term(rt, Value::Agent(left)),
        right: print_term(rt, Value::Agent(right)),
      });
    }
  }

  /// Loads the ports of both agents into the metavariable registers and runs the rule body.
  pub(crate) fn fire(&mut self, rt: &Runtime, code: &[Word], left: Value, right: Value) -> Result<(), RuntimeError> {
    if code.len() < RULE_HEADER {
      return Err(RuntimeError::InvalidCode { pc: 0 });
    }

    if let Value::Agent(cell) = left {
      let agent = rt.agent(cell);
      for i in 0..code[0] as usize {
        self.reg[metavar_l(i)] = agent.port(i).unwrap_or_default();
      }
    }
    if let Value::Agent(cell) = right {
      let agent = rt.agent(cell);
      for i in 0..code[1] as usize {
        self.reg[metavar_r(i)] = agent.port(i).unwrap_or_default();
      }
    }
    self.reg[ANNOTATE_L] = left;
    self.reg[ANNOTATE_R] = right;
    self.interactions   += 1;

    self.exec(rt, &code[RULE_HEADER..])
  }
}

/// What the bound name `name` is connected to. The name is used up and freed. An unbound name gives `None`.
pub(crate) fn follow(rt: &Runtime, name: CellRef) -> Option<Value> {
  let value = rt.name(name).port()?;
  rt.free_name(name);
  Some(value)
}

/// Connects `term` to `name`. If `name` is already connected, or another worker connects it first, the name is
/// freed and whatever it was connected to is returned.
fn connect(rt: &Runtime, name: CellRef, term: Value) -> Option<Value> {
  let cell  = rt.name(name);
  let found = match cell.port() {
    Some(value) => value,
    None => match cell.bind(term) {
      Ok(()) => return None,
      Err(winner) => winner,
    },
  };
  rt.free_name(name);
  Some(found)
}

