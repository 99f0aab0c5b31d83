/*!

Peephole optimisations on intermediate code. Both passes work within a basic block, which ends at the next
`BeginBlock`, and only ever remove a definition of a virtual register.

*/

use crate::core::compiler::imcode::{is_virtual, ArithOp, CompareOp, ImmOp, Ir, UnaryIr, Var};

/// The instructions after `start` up to the end of its basic block.
fn block_after(code: &[Ir], start: usize) -> impl Iterator<Item = (usize, &Ir)> {
  code
      .iter()
      .enumerate()
      .skip(start + 1)
      .take_while(|(_, instruction)| **instruction != Ir::BeginBlock)
}

enum Readers {
  None,
  One(usize),
  Unsafe,
}

/// Finds the single reader of `dest`, the copy of `src` defined at `start`.
fn reader_of_copy(code: &[Ir], start: usize, src: Var, dest: Var) -> Readers {
  let mut reader        = None;
  let mut src_clobbered = false;

  for (index, instruction) in block_after(code, start) {
    if instruction.reads_var(dest) {
      if reader.is_some() || src_clobbered || matches!(instruction, Ir::LoadMeta { .. }) {
        return Readers::Unsafe;
      }
      if instruction.reads().iter().filter(|var| **var == dest).count() > 1 {
        return Readers::Unsafe;
      }
      reader = Some(index);
    }
    if instruction.clobbers(dest) {
      return Readers::Unsafe;
    }
    if instruction.clobbers(src) {
      src_clobbered = true;
    }
  }

  match reader {
    Some(index) => Readers::One(index),
    None => Readers::None,
  }
}

/// Forwards `LOAD a b` into the single reader of `b` and drops the load. A load whose target is never read is
/// dropped as well.
pub(crate) fn propagate_copies(code: &mut Vec<Ir>) {
  let mut index = 0;

  while index < code.len() {
    if let Ir::Load { src, dest } = code[index] {
      if is_virtual(dest) && src != dest {
        match reader_of_copy(code, index, src, dest) {
          Readers::None => {
            code.remove(index);
            continue;
          }
          Readers::One(reader) => {
            code[reader].for_each_read_mut(|var| {
              if *var == dest {
                *var = src;
              }
            });
            code.remove(index);
            continue;
          }
          Readers::Unsafe => {}
        }
      }
    }
    index += 1;
  }
}

/// The immediate form of `instruction` with the register `var` replaced by the constant `imm`.
fn with_immediate(instruction: &Ir, var: Var, imm: i64) -> Option<Ir> {
  let other = |left: Var, right: Var| if left == var { right } else { left };

  match *instruction {
    Ir::Push { left, right } => Some(Ir::PushI { var: other(left, right), imm }),

    Ir::Arith { op: ArithOp::Add, left, right, dest } => {
      let src = other(left, right);
      Some(
        if imm == 1 {
          Ir::Unary { op: UnaryIr::Inc, src, dest }
        } else {
          Ir::ArithI { op: ImmOp::AddI, src, imm, dest }
        }
      )
    }

    Ir::Arith { op: ArithOp::Sub, left, right, dest } if right == var => {
      Some(
        if imm == 1 {
          Ir::Unary { op: UnaryIr::Dec, src: left, dest }
        } else {
          Ir::ArithI { op: ImmOp::SubI, src: left, imm, dest }
        }
      )
    }

    Ir::Arith { op: ArithOp::Eq, left, right, dest } => {
      Some(Ir::ArithI { op: ImmOp::EqI, src: other(left, right), imm, dest })
    }

    Ir::CompareR0 { op: CompareOp::Eq, left, right } => Some(Ir::EqIR0 { src: other(left, right), imm }),

    _ => None,
  }
}

/// Folds `LOADI n b` into the single reader of `b` when the reader has an immediate form.
pub(crate) fn propagate_immediates(code: &mut Vec<Ir>) {
  let mut index = 0;

  while index < code.len() {
    if let Ir::LoadI { imm, dest, shared: false } = code[index] {
      if is_virtual(dest) {
        let mut reads      = 0;
        let mut reader     = None;
        let mut label_seen = false;
        let mut unsafe_use = false;

        for (position, instruction) in block_after(code, index) {
          let count = instruction.reads().iter().filter(|var| **var == dest).count();
          if count > 0 {
            reads += count;
            if reader.is_none() && !label_seen {
              reader = Some(position);
            } else {
              unsafe_use = true;
            }
          }
          if instruction.clobbers(dest) {
            unsafe_use = true;
          }
          if matches!(instruction, Ir::Label(_)) {
            label_seen = true;
          }
        }

        if let (1, Some(position), false) = (reads, reader, unsafe_use) {
          if let Some(rewritten) = with_immediate(&code[position], dest, imm) {
            code[position] = rewritten;
            code.remove(index);
            continue;
          }
        }
      }
    }
    index += 1;
  }
}
