/*!

Intermediate code.

Rule bodies are first lowered to a list of `Ir` instructions over unbounded virtual registers. Registers below
`FIRST_LOCAL` are the fixed registers of the machine (the condition register, metavariables and annotation slots)
and are never renamed. Everything at or above `FIRST_LOCAL` is virtual until the register allocator maps it.

Three pseudo-instructions carry structure for the optimiser and allocator and emit no code: `BeginBlock` starts
a basic block whose registers are allocated from scratch, `BeginJmpcnctBlock` starts one of the two alternatives
after a `JMPCNCT` test, and `Label` marks a jump target.

*/

use std::fmt::{Display, Formatter};

use crate::{
  api::ast::Side,
  core::{
    bytecode::{FIRST_LOCAL, Opcode},
    kind_table::KindId,
    name_table::GlobalId,
  },
};

/// A register number, virtual or fixed.
pub(crate) type Var = usize;
pub(crate) type Label = usize;

#[inline(always)]
pub(crate) fn is_virtual(var: Var) -> bool {
  var >= FIRST_LOCAL
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum ArithOp {
  Add,
  Sub,
  Mul,
  Div,
  Mod,
  Lt,
  Le,
  Eq,
  Ne,
}

impl ArithOp {
  pub fn opcode(self) -> Opcode {
    match self {
      ArithOp::Add => Opcode::Add,
      ArithOp::Sub => Opcode::Sub,
      ArithOp::Mul => Opcode::Mul,
      ArithOp::Div => Opcode::Div,
      ArithOp::Mod => Opcode::Mod,
      ArithOp::Lt  => Opcode::Lt,
      ArithOp::Le  => Opcode::Le,
      ArithOp::Eq  => Opcode::Eq,
      ArithOp::Ne  => Opcode::Ne,
    }
  }

  /// The comparison this operation performs, if it is one.
  pub fn as_compare(self) -> Option<CompareOp> {
    match self {
      ArithOp::Lt => Some(CompareOp::Lt),
      ArithOp::Le => Some(CompareOp::Le),
      ArithOp::Eq => Some(CompareOp::Eq),
      ArithOp::Ne => Some(CompareOp::Ne),
      _ => None,
    }
  }
}

/// Comparisons that can write register 0 directly.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum CompareOp {
  Lt,
  Le,
  Eq,
  Ne,
}

impl CompareOp {
  pub fn r0_opcode(self) -> Opcode {
    match self {
      CompareOp::Lt => Opcode::LtR0,
      CompareOp::Le => Opcode::LeR0,
      CompareOp::Eq => Opcode::EqR0,
      CompareOp::Ne => Opcode::NeR0,
    }
  }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum ImmOp {
  AddI,
  SubI,
  EqI,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum UnaryIr {
  Unm,
  Rand,
  Inc,
  Dec,
}

/// Which annotated agents a return frees.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum RetKind {
  Keep,
  FreeLR,
  FreeL,
  FreeR,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Ir {
  BeginBlock,
  BeginJmpcnctBlock,
  Label(Label),

  Push { left: Var, right: Var },
  PushI { var: Var, imm: i64 },
  MyPush { left: Var, right: Var },
  MkName { dest: Var },
  MkGName { gid: GlobalId, dest: Var },
  MkAgent { kind: KindId, dest: Var },
  Ret(RetKind),

  /// `shared` loads are read from more than one branch and are never folded into their readers.
  LoadI { imm: i64, dest: Var, shared: bool },
  Load { src: Var, dest: Var },
  /// A load into a fixed register ahead of a loop. Never propagated away.
  LoadMeta { src: Var, dest: Var },
  LoadP { src: Var, port: usize, agent: Var },
  LoadPAnnotated { side: Side, src: Var, port: usize },
  ChId { side: Side, kind: KindId },

  Arith { op: ArithOp, left: Var, right: Var, dest: Var },
  ArithI { op: ImmOp, src: Var, imm: i64, dest: Var },
  Unary { op: UnaryIr, src: Var, dest: Var },
  CompareR0 { op: CompareOp, left: Var, right: Var },
  EqIR0 { src: Var, imm: i64 },

  JmpEq0 { var: Var, label: Label },
  JmpEq0R0 { label: Label },
  Jmp { label: Label },
  JmpNeq0 { var: Var, label: Label },
  JmpCnctCons { var: Var, label: Label },
  JmpCnct { var: Var, kind: KindId, label: Label },

  Loop,
  LoopRrec { var: Var, arity: usize, free_r: bool },

  CnctGN { name: Var, term: Var },
  SubstGN { name: Var, term: Var },
}

impl Ir {
  /// Calls `f` on every register operand the instruction reads.
  pub fn for_each_read_mut(&mut self, mut f: impl FnMut(&mut Var)) {
    match self {
      Ir::Push { left, right }
      | Ir::MyPush { left, right }
      | Ir::Arith { left, right, .. }
      | Ir::CompareR0 { left, right, .. } => {
        f(left);
        f(right);
      }

      Ir::LoadP { src, agent, .. } => {
        f(src);
        f(agent);
      }

      Ir::CnctGN { name, term } | Ir::SubstGN { name, term } => {
        f(name);
        f(term);
      }

      Ir::PushI { var, .. }
      | Ir::JmpEq0 { var, .. }
      | Ir::JmpNeq0 { var, .. }
      | Ir::JmpCnctCons { var, .. }
      | Ir::JmpCnct { var, .. }
      | Ir::LoopRrec { var, .. } => f(var),

      Ir::Load { src, .. }
      | Ir::LoadMeta { src, .. }
      | Ir::LoadPAnnotated { src, .. }
      | Ir::ArithI { src, .. }
      | Ir::Unary { src, .. }
      | Ir::EqIR0 { src, .. } => f(src),

      Ir::BeginBlock
      | Ir::BeginJmpcnctBlock
      | Ir::Label(_)
      | Ir::MkName { .. }
      | Ir::MkGName { .. }
      | Ir::MkAgent { .. }
      | Ir::Ret(_)
      | Ir::LoadI { .. }
      | Ir::ChId { .. }
      | Ir::JmpEq0R0 { .. }
      | Ir::Jmp { .. }
      | Ir::Loop => {}
    }
  }

  pub fn reads(&self) -> Vec<Var> {
    let mut reads = Vec::with_capacity(2);
    self.clone().for_each_read_mut(|var| reads.push(*var));
    reads
  }

  pub fn reads_var(&self, var: Var) -> bool {
    self.reads().contains(&var)
  }

  /// The register the instruction writes as its result.
  pub fn dest_mut(&mut self) -> Option<&mut Var> {
    match self {
      Ir::MkName { dest }
      | Ir::MkGName { dest, .. }
      | Ir::MkAgent { dest, .. }
      | Ir::LoadI { dest, .. }
      | Ir::Load { dest, .. }
      | Ir::LoadMeta { dest, .. }
      | Ir::Arith { dest, .. }
      | Ir::ArithI { dest, .. }
      | Ir::Unary { dest, .. } => Some(dest),
      _ => None,
    }
  }

  pub fn dest(&self) -> Option<Var> {
    self.clone().dest_mut().map(|dest| *dest)
  }

  /// Whether the instruction overwrites `var`. A connectivity test rewrites its register with the dereferenced
  /// value, so it counts.
  pub fn clobbers(&self, var: Var) -> bool {
    match self {
      Ir::JmpCnctCons { var: tested, .. } | Ir::JmpCnct { var: tested, .. } => *tested == var,
      _ => self.dest() == Some(var),
    }
  }

  pub fn is_pseudo(&self) -> bool {
    matches!(self, Ir::BeginBlock | Ir::BeginJmpcnctBlock | Ir::Label(_))
  }
}

fn side_letter(side: Side) -> char {
  match side {
    Side::Left => 'L',
    Side::Right => 'R',
  }
}

impl Display for Ir {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Ir::BeginBlock => write!(f, "BEGIN_BLOCK"),
      Ir::BeginJmpcnctBlock => write!(f, "BEGIN_JMPCNCT_BLOCK"),
      Ir::Label(label) => write!(f, "Label{}:", label),

      Ir::Push { left, right } => write!(f, "PUSH var{} var{}", left, right),
      Ir::PushI { var, imm } => write!(f, "PUSHI var{} ${}", var, imm),
      Ir::MyPush { left, right } => write!(f, "MYPUSH var{} var{}", left, right),
      Ir::MkName { dest } => write!(f, "MKNAME var{}", dest),
      Ir::MkGName { gid, dest } => write!(f, "MKGNAME global{} var{}", gid, dest),
      Ir::MkAgent { kind, dest } => write!(f, "MKAGENT id{} var{}", kind, dest),
      Ir::Ret(RetKind::Keep) => write!(f, "RET"),
      Ir::Ret(RetKind::FreeLR) => write!(f, "RET_FREE_LR"),
      Ir::Ret(RetKind::FreeL) => write!(f, "RET_FREE_L"),
      Ir::Ret(RetKind::FreeR) => write!(f, "RET_FREE_R"),

      Ir::LoadI { imm, dest, .. } => write!(f, "LOADI ${} var{}", imm, dest),
      Ir::Load { src, dest } => write!(f, "LOAD var{} var{}", src, dest),
      Ir::LoadMeta { src, dest } => write!(f, "LOAD_META var{} var{}", src, dest),
      Ir::LoadP { src, port, agent } => write!(f, "LOADP var{} ${} var{}", src, port, agent),
      Ir::LoadPAnnotated { side, src, port } => {
        write!(f, "LOADP_{} var{} ${}", side_letter(*side), src, port)
      }
      Ir::ChId { side, kind } => write!(f, "CHID_{} id{}", side_letter(*side), kind),

      Ir::Arith { op, left, right, dest } => {
        write!(f, "{} var{} var{} var{}", op.opcode(), left, right, dest)
      }
      Ir::ArithI { op, src, imm, dest } => write!(f, "{:?} var{} ${} var{}", op, src, imm, dest),
      Ir::Unary { op, src, dest } => write!(f, "{:?} var{} var{}", op, src, dest),
      Ir::CompareR0 { op, left, right } => write!(f, "{} var{} var{}", op.r0_opcode(), left, right),
      Ir::EqIR0 { src, imm } => write!(f, "EQI_R0 var{} ${}", src, imm),

      Ir::JmpEq0 { var, label } => write!(f, "JMPEQ0 var{} Label{}", var, label),
      Ir::JmpEq0R0 { label } => write!(f, "JMPEQ0_R0 Label{}", label),
      Ir::Jmp { label } => write!(f, "JMP Label{}", label),
      Ir::JmpNeq0 { var, label } => write!(f, "JMPNEQ0 var{} Label{}", var, label),
      Ir::JmpCnctCons { var, label } => write!(f, "JMPCNCT_CONS var{} Label{}", var, label),
      Ir::JmpCnct { var, kind, label } => write!(f, "JMPCNCT var{} id{} Label{}", var, kind, label),

      Ir::Loop => write!(f, "LOOP"),
      Ir::LoopRrec { var, arity, free_r } => {
        write!(f, "LOOP_RREC{} var{} ${}", if *free_r { "_FREE_R" } else { "" }, var, arity)
      }

      Ir::CnctGN { name, term } => write!(f, "CNCTGN var{} var{}", name, term),
      Ir::SubstGN { name, term } => write!(f, "SUBSTGN var{} var{}", name, term),
    }
  }
}

/// One instruction per line, for code listings.
pub(crate) fn ir_listing(code: &[Ir]) -> String {
  let mut out = String::new();
  for (index, instruction) in code.iter().enumerate() {
    out.push_str(&format!("{:>4}: {}\n", index, instruction));
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_reads_and_dest() {
    let load_p = Ir::LoadP { src: 14, port: 1, agent: 13 };
    assert_eq!(load_p.reads(), vec![14, 13]);
    assert_eq!(load_p.dest(), None);

    let add = Ir::Arith { op: ArithOp::Add, left: 13, right: 14, dest: 15 };
    assert!(add.reads_var(14));
    assert!(add.clobbers(15));

    let test = Ir::JmpCnct { var: 7, kind: 40, label: 0 };
    assert!(test.clobbers(7));
    assert!(test.reads_var(7));
  }

  #[test]
  fn test_display() {
    assert_eq!(Ir::LoadI { imm: 3, dest: 13, shared: false }.to_string(), "LOADI $3 var13");
    assert_eq!(Ir::LoopRrec { var: 7, arity: 2, free_r: true }.to_string(), "LOOP_RREC_FREE_R var7 $2");
  }
}
