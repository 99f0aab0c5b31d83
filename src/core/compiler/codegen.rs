/*!

Lowering of register-allocated intermediate code to bytecode words. Jumps are emitted with a hole for the offset,
recorded against their label, and backpatched once every label has an address.

*/

use std::collections::HashMap;

use crate::{
  api::ast::Side,
  core::{
    bytecode::{Opcode, Word},
    compiler::{
      compile_error::{CompileError, CompileErrorKind},
      imcode::{ImmOp, Ir, Label, RetKind, UnaryIr},
    },
  },
};

/// Most words a compiled block may have.
pub(crate) const MAX_CODE_WORDS: usize = 1 << 16;

struct Emitter {
  words : Vec<Word>,
  labels: HashMap<Label, usize>,
  holes : Vec<(usize, Label)>,
}

impl Emitter {
  fn op(&mut self, opcode: Opcode, operands: &[Word]) {
    debug_assert_eq!(operands.len(), opcode.operand_count());
    self.words.push(opcode.word());
    self.words.extend_from_slice(operands);
  }

  /// An instruction whose last operand is the offset to `label`.
  fn jump(&mut self, opcode: Opcode, operands: &[Word], label: Label) {
    self.words.push(opcode.word());
    self.words.extend_from_slice(operands);
    self.holes.push((self.words.len(), label));
    self.words.push(0);
  }
}

#[inline(always)]
fn w(value: usize) -> Word {
  value as Word
}

pub(crate) fn generate(code: &[Ir], header: &[Word]) -> Result<Box<[Word]>, CompileError> {
  let mut emitter = Emitter {
    words : header.to_vec(),
    labels: HashMap::new(),
    holes : Vec::new(),
  };

  for instruction in code {
    match *instruction {
      Ir::BeginBlock | Ir::BeginJmpcnctBlock => {}
      Ir::Label(label) => {
        emitter.labels.insert(label, emitter.words.len());
      }

      Ir::Push { left, right } => emitter.op(Opcode::Push, &[w(left), w(right)]),
      Ir::PushI { var, imm } => emitter.op(Opcode::PushI, &[w(var), imm]),
      Ir::MyPush { left, right } => emitter.op(Opcode::MyPush, &[w(left), w(right)]),
      Ir::MkName { dest } => emitter.op(Opcode::MkName, &[w(dest)]),
      Ir::MkGName { gid, dest } => emitter.op(Opcode::MkGName, &[gid as Word, w(dest)]),
      Ir::MkAgent { kind, dest } => emitter.op(Opcode::MkAgent, &[kind as Word, w(dest)]),

      Ir::Ret(kind) => {
        let opcode = match kind {
          RetKind::Keep   => Opcode::Ret,
          RetKind::FreeLR => Opcode::RetFreeLR,
          RetKind::FreeL  => Opcode::RetFreeL,
          RetKind::FreeR  => Opcode::RetFreeR,
        };
        emitter.op(opcode, &[]);
      }

      Ir::LoadI { imm, dest, .. } => emitter.op(Opcode::LoadI, &[imm, w(dest)]),
      Ir::Load { src, dest } | Ir::LoadMeta { src, dest } => emitter.op(Opcode::Load, &[w(src), w(dest)]),
      Ir::LoadP { src, port, agent } => emitter.op(Opcode::LoadP, &[w(src), w(port), w(agent)]),
      Ir::LoadPAnnotated { side: Side::Left, src, port } => emitter.op(Opcode::LoadPL, &[w(src), w(port)]),
      Ir::LoadPAnnotated { side: Side::Right, src, port } => emitter.op(Opcode::LoadPR, &[w(src), w(port)]),
      Ir::ChId { side: Side::Left, kind } => emitter.op(Opcode::ChIdL, &[kind as Word]),
      Ir::ChId { side: Side::Right, kind } => emitter.op(Opcode::ChIdR, &[kind as Word]),

      Ir::Arith { op, left, right, dest } => emitter.op(op.opcode(), &[w(left), w(right), w(dest)]),
      Ir::ArithI { op, src, imm, dest } => {
        let opcode = match op {
          ImmOp::AddI => Opcode::AddI,
          ImmOp::SubI => Opcode::SubI,
          ImmOp::EqI  => Opcode::EqI,
        };
        emitter.op(opcode, &[w(src), imm, w(dest)]);
      }
      Ir::Unary { op, src, dest } => {
        let opcode = match op {
          UnaryIr::Unm  => Opcode::Unm,
          UnaryIr::Rand => Opcode::Rand,
          UnaryIr::Inc  => Opcode::Inc,
          UnaryIr::Dec  => Opcode::Dec,
        };
        emitter.op(opcode, &[w(src), w(dest)]);
      }
      Ir::CompareR0 { op, left, right } => emitter.op(op.r0_opcode(), &[w(left), w(right)]),
      Ir::EqIR0 { src, imm } => emitter.op(Opcode::EqIR0, &[w(src), imm]),

      Ir::JmpEq0 { var, label } => emitter.jump(Opcode::JmpEq0, &[w(var)], label),
      Ir::JmpEq0R0 { label } => emitter.jump(Opcode::JmpEq0R0, &[], label),
      Ir::Jmp { label } => emitter.jump(Opcode::Jmp, &[], label),
      Ir::JmpNeq0 { var, label } => emitter.jump(Opcode::JmpNeq0, &[w(var)], label),
      Ir::JmpCnctCons { var, label } => emitter.jump(Opcode::JmpCnctCons, &[w(var)], label),
      Ir::JmpCnct { var, kind, label } => emitter.jump(Opcode::JmpCnct, &[w(var), kind as Word], label),

      Ir::Loop => emitter.op(Opcode::Loop, &[]),
      Ir::LoopRrec { var, arity, free_r } => {
        match (arity, free_r) {
          (1, false) => emitter.op(Opcode::LoopRrec1, &[w(var)]),
          (2, false) => emitter.op(Opcode::LoopRrec2, &[w(var)]),
          (1, true)  => emitter.op(Opcode::LoopRrec1FreeR, &[w(var)]),
          (2, true)  => emitter.op(Opcode::LoopRrec2FreeR, &[w(var)]),
          (_, false) => emitter.op(Opcode::LoopRrec, &[w(var), w(arity)]),
          (_, true)  => emitter.op(Opcode::LoopRrecFreeR, &[w(var), w(arity)]),
        }
      }

      Ir::CnctGN { name, term } => emitter.op(Opcode::CnctGN, &[w(name), w(term)]),
      Ir::SubstGN { name, term } => emitter.op(Opcode::SubstGN, &[w(name), w(term)]),
    } // end match on `instruction`

    if emitter.words.len() > MAX_CODE_WORDS {
      return Err(CompileErrorKind::CodeTooLong.into());
    }
  }

  let Emitter { mut words, labels, holes } = emitter;
  for (hole, label) in holes {
    let target = labels.get(&label).copied().ok_or(CompileErrorKind::CodeTooLong)?;
    words[hole] = target as Word - (hole as Word + 1);
  }

  Ok(words.into_boxed_slice())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_forward_jump_is_backpatched() {
    let code = vec![
      Ir::JmpEq0 { var: 13, label: 0 },
      Ir::Push { left: 13, right: 1 },
      Ir::Label(0),
      Ir::Ret(RetKind::FreeLR),
    ];
    let words = generate(&code, &[1, 0]).unwrap();
    assert_eq!(
      &words[..],
      &[1, 0, Opcode::JmpEq0.word(), 13, 3, Opcode::Push.word(), 13, 1, Opcode::RetFreeLR.word()]
    );
  }

  #[test]
  fn test_loop_over_right_agent_picks_short_form() {
    let words = generate(&[Ir::LoopRrec { var: 7, arity: 2, free_r: true }], &[]).unwrap();
    assert_eq!(&words[..], &[Opcode::LoopRrec2FreeR.word(), 7]);
  }
}
