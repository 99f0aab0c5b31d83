/*!

The bytecode interpreter. `exec` runs one rule body or one net block against the machine's registers. The instruction
set and operand layout are described in `bytecode`.

*/

use rand::Rng;

use crate::{
  api::value::Value,
  core::{
    bytecode::{metavar_r, Opcode, Word, ANNOTATE_L, ANNOTATE_R, REG_CONDITION},
    kind_table::{KindId, CONS},
    machine::{agent_cell, eval::follow, free::replace_in_globals, print_term, Machine, RuntimeError},
    name_table::GlobalId,
    Runtime,
  },
};

impl Machine {
  pub(crate) fn exec(&mut self, rt: &Runtime, code: &[Word]) -> Result<(), RuntimeError> {
    let mut pc: usize = 0;

    loop {
      let at     = pc;
      let opcode = code.get(pc).copied().and_then(Opcode::decode).ok_or(RuntimeError::InvalidCode { pc })?;
      let count  = opcode.operand_count();
      let args   = code.get(pc + 1..pc + 1 + count).ok_or(RuntimeError::InvalidCode { pc })?;
      pc += 1 + count;

      // Register operand `i`.
      let r = |i: usize| args[i] as usize;

      match opcode {
        Opcode::Push => self.push(rt, self.reg[r(0)], self.reg[r(1)]),

        Opcode::PushI => self.push(rt, self.reg[r(0)], Value::int(args[1])),

        Opcode::MyPush => self.my_push(rt, self.reg[r(0)], self.reg[r(1)]),

        Opcode::MkName => self.reg[r(0)] = self.new_name(rt)?,

        Opcode::MkGName => {
          let gid = args[0] as GlobalId;
          self.reg[r(1)] = match rt.names.cell(gid) {
            Some(name) => name,
            None => {
              let name = self.new_name(rt)?;
              if let Value::Name(cell) = name {
                rt.name(cell).set_global_id(Some(gid));
              }
              rt.names.set_cell(gid, Some(name));
              name
            }
          };
        }

        Opcode::MkAgent => {
          let agent = self.new_agent(rt, args[0] as KindId)?;
          self.reg[r(1)] = Value::Agent(agent);
        }

        Opcode::Ret => return Ok(()),

        Opcode::RetFreeLR => {
          match (self.reg[ANNOTATE_L], self.reg[ANNOTATE_R]) {
            (Value::Agent(left), Value::Agent(right)) => rt.free2(left, right),
            (left, right) => {
              rt.free_value(left);
              rt.free_value(right);
            }
          }
          return Ok(());
        }

        Opcode::RetFreeL => {
          rt.free_value(self.reg[ANNOTATE_L]);
          return Ok(());
        }

        Opcode::RetFreeR => {
          rt.free_value(self.reg[ANNOTATE_R]);
          return Ok(());
        }

        Opcode::LoadI => self.reg[r(1)] = Value::int(args[0]),

        Opcode::Load => self.reg[r(1)] = self.reg[r(0)],

        Opcode::LoadP => {
          let agent = agent_cell(rt, self.reg[r(2)])?;
          rt.agent(agent).set_port(r(1), Some(self.reg[r(0)]));
        }

        Opcode::LoadPL | Opcode::LoadPR => {
          let slot  = if opcode == Opcode::LoadPL { ANNOTATE_L } else { ANNOTATE_R };
          let agent = agent_cell(rt, self.reg[slot])?;
          rt.agent(agent).set_port(r(1), Some(self.reg[r(0)]));
        }

        Opcode::ChIdL | Opcode::ChIdR => {
          let slot  = if opcode == Opcode::ChIdL { ANNOTATE_L } else { ANNOTATE_R };
          let agent = agent_cell(rt, self.reg[slot])?;
          rt.agent(agent).set_kind(args[0] as KindId);
        }

        // region Arithmetic

        Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod => {
          let (a, b) = (self.int(rt, r(0))?, self.int(rt, r(1))?);
          let result = match opcode {
            Opcode::Add => a.wrapping_add(b),
            Opcode::Sub => a.wrapping_sub(b),
            Opcode::Mul => a.wrapping_mul(b),
            _ if b == 0 => return Err(RuntimeError::DivisionByZero),
            Opcode::Div => a.wrapping_div(b),
            _ => a.wrapping_rem(b),
          };
          self.reg[r(2)] = Value::int(result);
        }

        Opcode::AddI => self.reg[r(2)] = Value::int(self.int(rt, r(0))?.wrapping_add(args[1])),

        Opcode::SubI => self.reg[r(2)] = Value::int(self.int(rt, r(0))?.wrapping_sub(args[1])),

        Opcode::Lt | Opcode::Le | Opcode::Eq | Opcode::Ne => {
          let (a, b) = (self.int(rt, r(0))?, self.int(rt, r(1))?);
          self.reg[r(2)] = truth(compare(opcode, a, b));
        }

        Opcode::EqI => self.reg[r(2)] = truth(self.int(rt, r(0))? == args[1]),

        Opcode::Unm => self.reg[r(1)] = Value::int(self.int(rt, r(0))?.wrapping_neg()),

        Opcode::Rand => {
          let bound = self.int(rt, r(0))?.unsigned_abs();
          if bound == 0 {
            return Err(RuntimeError::DivisionByZero);
          }
          self.reg[r(1)] = Value::int(rand::thread_rng().gen_range(0..bound) as i64);
        }

        Opcode::Inc => self.reg[r(1)] = Value::int(self.int(rt, r(0))?.wrapping_add(1)),

        Opcode::Dec => self.reg[r(1)] = Value::int(self.int(rt, r(0))?.wrapping_sub(1)),

        Opcode::LtR0 | Opcode::LeR0 | Opcode::EqR0 | Opcode::NeR0 => {
          let (a, b) = (self.int(rt, r(0))?, self.int(rt, r(1))?);
          self.reg[REG_CONDITION] = truth(compare(opcode, a, b));
        }

        Opcode::EqIR0 => self.reg[REG_CONDITION] = truth(self.int(rt, r(0))? == args[1]),

        // endregion

        // region Jumps

        Opcode::JmpEq0 => {
          if self.reg[r(0)] == Value::Int(0) {
            pc = jump(pc, args[1], code.len(), at)?;
          }
        }

        Opcode::JmpEq0R0 => {
          if self.reg[REG_CONDITION] == Value::Int(0) {
            pc = jump(pc, args[0], code.len(), at)?;
          }
        }

        Opcode::Jmp => pc = jump(pc, args[0], code.len(), at)?,

        Opcode::JmpNeq0 => {
          if self.reg[r(0)] != Value::Int(0) {
            pc = jump(pc, args[1], code.len(), at)?;
          }
        }

        Opcode::JmpCnctCons | Opcode::JmpCnct => {
          let (kind, offset) = match opcode {
            Opcode::JmpCnctCons => (CONS, args[1]),
            _ => (args[1] as KindId, args[2]),
          };
          if self.is_connected_to(rt, r(0), kind) {
            pc = jump(pc, offset, code.len(), at)?;
          }
        }

        Opcode::Loop => {
          self.interactions += 1;
          pc = 0;
        }

        Opcode::LoopRrec
        | Opcode::LoopRrec1
        | Opcode::LoopRrec2
        | Opcode::LoopRrecFreeR
        | Opcode::LoopRrec1FreeR
        | Opcode::LoopRrec2FreeR => {
          let arity = match opcode {
            Opcode::LoopRrec | Opcode::LoopRrecFreeR => r(1),
            Opcode::LoopRrec1 | Opcode::LoopRrec1FreeR => 1,
            _ => 2,
          };
          if matches!(opcode, Opcode::LoopRrecFreeR | Opcode::LoopRrec1FreeR | Opcode::LoopRrec2FreeR) {
            rt.free_value(self.reg[ANNOTATE_R]);
          }

          let next  = self.reg[r(0)];
          let agent = rt.agent(agent_cell(rt, next)?);
          for i in 0..arity {
            self.reg[metavar_r(i)] = agent.port(i).unwrap_or_default();
          }
          self.reg[ANNOTATE_R] = next;
          self.interactions   += 1;
          pc = 0;
        }

        // endregion

        // region Global names

        Opcode::CnctGN => {
          let name = self.reg[r(0)];
          let Value::Name(cell) = name else {
            return Err(RuntimeError::InvalidCode { pc: at });
          };
          let connected = rt.name(cell).port().ok_or(RuntimeError::InvalidCode { pc: at })?;
          rt.free_name(cell);
          self.push(rt, self.reg[r(1)], connected);
        }

        Opcode::SubstGN => {
          let name = self.reg[r(0)];
          let Value::Name(cell) = name else {
            return Err(RuntimeError::InvalidCode { pc: at });
          };
          replace_in_globals(rt, name, self.reg[r(1)]);
          rt.free_name(cell);
        }

        // endregion

        Opcode::Nop => {}
      } // end match on opcode
    }
  }

  /// Register `index` as an integer.
  #[inline(always)]
  fn int(&self, rt: &Runtime, index: usize) -> Result<i64, RuntimeError> {
    match self.reg[index] {
      Value::Int(n) => Ok(n),
      other => Err(RuntimeError::NotAnInteger(print_term(rt, other))),
    }
  }

  /// Whether register `index` leads to an agent of `kind`. Bound names on the way are used up, and the register is
  /// left holding what they lead to.
  ///
  /// While another worker waits for work the answer is always no, so that the caller pushes the equation where the
  /// waiting worker can take it instead of looping over it alone.
  fn is_connected_to(&mut self, rt: &Runtime, index: usize, kind: KindId) -> bool {
    if rt.is_threaded() && rt.scheduler.has_sleepers() {
      return false;
    }

    loop {
      match self.reg[index] {
        Value::Agent(cell) => return rt.agent(cell).kind() == kind,
        Value::Name(cell) => match follow(rt, cell) {
          Some(next) => self.reg[index] = next,
          None => return false,
        },
        Value::Int(_) => return false,
      }
    }
  }
}

#[inline(always)]
fn truth(condition: bool) -> Value {
  Value::Int(condition as i64)
}

#[inline(always)]
fn compare(opcode: Opcode, a: i64, b: i64) -> bool {
  match opcode {
    Opcode::Lt | Opcode::LtR0 => a < b,
    Opcode::Le | Opcode::LeR0 => a <= b,
    Opcode::Eq | Opcode::EqR0 => a == b,
    _ => a != b,
  }
}

/// The address `offset` words after `next`. Targets outside the block are malformed code.
#[inline(always)]
fn jump(next: usize, offset: Word, len: usize, at: usize) -> Result<usize, RuntimeError> {
  let target = next as i64 + offset;
  if target < 0 || target as usize > len {
    return Err(RuntimeError::InvalidCode { pc: at });
  }
  Ok(target as usize)
}
