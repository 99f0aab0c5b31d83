/*!

Linear-scan register allocation.

Virtual registers are mapped to machine registers in `FIRST_LOCAL..VM_REG_SIZE`, always taking the lowest free one.
A register is released after the instruction that uses its value for the last time within the current window. The
window is the basic block, except inside the alternatives after a connectivity test: each alternative is its own
window, and both start from the allocation state in force before the first of them.

*/

use std::collections::HashMap;

use crate::{
  abstractions::BitSet,
  core::{
    bytecode::{FIRST_LOCAL, VM_REG_SIZE},
    compiler::{
      compile_error::{CompileError, CompileErrorKind},
      imcode::{is_virtual, Ir, Var},
    },
  },
};

#[derive(Clone, Default)]
struct Allocation {
  map : HashMap<Var, Var>,
  used: BitSet,
}

impl Allocation {
  fn assign(&mut self, var: Var) -> Result<Var, CompileError> {
    if let Some(register) = self.map.get(&var) {
      return Ok(*register);
    }
    let register = (FIRST_LOCAL..VM_REG_SIZE)
        .find(|register| !self.used.contains(*register))
        .ok_or(CompileErrorKind::RegistersExhausted)?;
    self.used.insert(register);
    self.map.insert(var, register);
    Ok(register)
  }

  fn release(&mut self, var: Var) {
    if let Some(register) = self.map.remove(&var) {
      self.used.remove(register);
    }
  }
}

/// Whether `var` is neither read nor written after `index` within the window.
fn is_dead_after(code: &[Ir], index: usize, var: Var, in_alternative: bool) -> bool {
  for instruction in &code[index + 1..] {
    match instruction {
      Ir::BeginBlock => return true,
      Ir::BeginJmpcnctBlock if in_alternative => return true,
      _ => {}
    }
    if instruction.reads_var(var) || instruction.dest() == Some(var) {
      return false;
    }
  }
  true
}

/// Rewrites every virtual register in `code` to a machine register. Without `reuse`, registers are never
/// released within a block.
pub(crate) fn allocate_registers(code: &mut [Ir], reuse: bool) -> Result<(), CompileError> {
  let mut current        = Allocation::default();
  let mut base           = None;
  let mut in_alternative = false;

  for index in 0..code.len() {
    match code[index] {
      Ir::BeginBlock => {
        current        = Allocation::default();
        base           = None;
        in_alternative = false;
        continue;
      }
      Ir::BeginJmpcnctBlock => {
        let snapshot = base.get_or_insert_with(|| current.clone());
        current        = snapshot.clone();
        in_alternative = true;
        continue;
      }
      _ => {}
    }

    let reads: Vec<Var> = code[index].reads().into_iter().filter(|var| is_virtual(*var)).collect();
    let mut mapped = HashMap::with_capacity(reads.len());
    for var in &reads {
      let register = current
          .map
          .get(var)
          .copied()
          .ok_or(CompileErrorKind::UnassignedVariable(*var))?;
      mapped.insert(*var, register);
    }

    let dest = code[index].dest().filter(|var| is_virtual(*var));

    if reuse {
      for var in &reads {
        if Some(*var) != dest && is_dead_after(code, index, *var, in_alternative) {
          current.release(*var);
        }
      }
    }

    let dest_register = match dest {
      Some(var) => {
        let register = current.assign(var)?;
        if reuse && is_dead_after(code, index, var, in_alternative) {
          current.release(var);
        }
        Some(register)
      }
      None => None,
    };

    code[index].for_each_read_mut(|var| {
      if let Some(register) = mapped.get(var) {
        *var = *register;
      }
    });
    if let (Some(slot), Some(register)) = (code[index].dest_mut(), dest_register) {
      *slot = register;
    }
  }

  Ok(())
}
