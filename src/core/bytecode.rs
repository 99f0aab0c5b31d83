/*!

The bytecode format shared by the compiler and the interpreter.

A compiled block is a flat array of `Word`s. Words 0 and 1 of a rule block are the arities of the left and right
agents; the instruction stream starts at word 2. A net block has no header. Each instruction is an opcode word
followed by its operands, which are register indices, immediates, kind ids, or jump offsets. Jump offsets are
relative to the word after the jump instruction.

*/

use std::fmt::{Display, Formatter, Write};

pub type Word = i64;

/// Words before the instruction stream of a rule block.
pub const RULE_HEADER: usize = 2;

/// Number of registers in a machine.
pub const VM_REG_SIZE: usize = 64;

/// Register 0 receives the result of the fused comparisons.
pub const REG_CONDITION: usize = 0;
pub const ANNOTATE_L   : usize = 11;
pub const ANNOTATE_R   : usize = 12;
/// The first register available to the compiler for temporaries.
pub const FIRST_LOCAL  : usize = 13;

#[inline(always)]
pub const fn metavar_l(port: usize) -> usize {
  1 + port
}

#[inline(always)]
pub const fn metavar_r(port: usize) -> usize {
  6 + port
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Opcode {
  Push,
  PushI,
  MyPush,
  MkName,
  MkGName,
  MkAgent,
  Ret,
  RetFreeLR,
  RetFreeL,
  RetFreeR,
  LoadI,
  Load,
  LoadP,
  LoadPL,
  LoadPR,
  ChIdL,
  ChIdR,
  Add,
  Sub,
  AddI,
  SubI,
  Mul,
  Div,
  Mod,
  Lt,
  Le,
  Eq,
  EqI,
  Ne,
  Unm,
  Rand,
  Inc,
  Dec,
  LtR0,
  LeR0,
  EqR0,
  EqIR0,
  NeR0,
  JmpEq0,
  JmpEq0R0,
  Jmp,
  JmpNeq0,
  JmpCnctCons,
  JmpCnct,
  Loop,
  LoopRrec,
  LoopRrec1,
  LoopRrec2,
  LoopRrecFreeR,
  LoopRrec1FreeR,
  LoopRrec2FreeR,
  CnctGN,
  SubstGN,
  Nop,
}

impl Opcode {
  pub const ALL: [Opcode; 54] = [
    Opcode::Push, Opcode::PushI, Opcode::MyPush, Opcode::MkName, Opcode::MkGName, Opcode::MkAgent,
    Opcode::Ret, Opcode::RetFreeLR, Opcode::RetFreeL, Opcode::RetFreeR,
    Opcode::LoadI, Opcode::Load, Opcode::LoadP, Opcode::LoadPL, Opcode::LoadPR, Opcode::ChIdL, Opcode::ChIdR,
    Opcode::Add, Opcode::Sub, Opcode::AddI, Opcode::SubI, Opcode::Mul, Opcode::Div, Opcode::Mod,
    Opcode::Lt, Opcode::Le, Opcode::Eq, Opcode::EqI, Opcode::Ne,
    Opcode::Unm, Opcode::Rand, Opcode::Inc, Opcode::Dec,
    Opcode::LtR0, Opcode::LeR0, Opcode::EqR0, Opcode::EqIR0, Opcode::NeR0,
    Opcode::JmpEq0, Opcode::JmpEq0R0, Opcode::Jmp, Opcode::JmpNeq0, Opcode::JmpCnctCons, Opcode::JmpCnct,
    Opcode::Loop, Opcode::LoopRrec, Opcode::LoopRrec1, Opcode::LoopRrec2,
    Opcode::LoopRrecFreeR, Opcode::LoopRrec1FreeR, Opcode::LoopRrec2FreeR,
    Opcode::CnctGN, Opcode::SubstGN, Opcode::Nop,
  ];

  #[inline(always)]
  pub fn decode(word: Word) -> Option<Opcode> {
    usize::try_from(word).ok().and_then(|index| Opcode::ALL.get(index).copied())
  }

  #[inline(always)]
  pub fn word(self) -> Word {
    self as u8 as Word
  }

  /// Number of operand words after the opcode.
  pub fn operand_count(self) -> usize {
    match self {
      Opcode::Ret
      | Opcode::RetFreeLR
      | Opcode::RetFreeL
      | Opcode::RetFreeR
      | Opcode::Loop
      | Opcode::Nop => 0,

      Opcode::MkName
      | Opcode::ChIdL
      | Opcode::ChIdR
      | Opcode::JmpEq0R0
      | Opcode::Jmp
      | Opcode::LoopRrec1
      | Opcode::LoopRrec2
      | Opcode::LoopRrec1FreeR
      | Opcode::LoopRrec2FreeR => 1,

      Opcode::LoadP
      | Opcode::Add
      | Opcode::Sub
      | Opcode::AddI
      | Opcode::SubI
      | Opcode::Mul
      | Opcode::Div
      | Opcode::Mod
      | Opcode::Lt
      | Opcode::Le
      | Opcode::Eq
      | Opcode::EqI
      | Opcode::Ne
      | Opcode::JmpCnct => 3,

      _ => 2,
    }
  }

  pub fn mnemonic(self) -> &'static str {
    match self {
      Opcode::Push           => "PUSH",
      Opcode::PushI          => "PUSHI",
      Opcode::MyPush         => "MYPUSH",
      Opcode::MkName         => "MKNAME",
      Opcode::MkGName        => "MKGNAME",
      Opcode::MkAgent        => "MKAGENT",
      Opcode::Ret            => "RET",
      Opcode::RetFreeLR      => "RET_FREE_LR",
      Opcode::RetFreeL       => "RET_FREE_L",
      Opcode::RetFreeR       => "RET_FREE_R",
      Opcode::LoadI          => "LOADI",
      Opcode::Load           => "LOAD",
      Opcode::LoadP          => "LOADP",
      Opcode::LoadPL         => "LOADP_L",
      Opcode::LoadPR         => "LOADP_R",
      Opcode::ChIdL          => "CHID_L",
      Opcode::ChIdR          => "CHID_R",
      Opcode::Add            => "ADD",
      Opcode::Sub            => "SUB",
      Opcode::AddI           => "ADDI",
      Opcode::SubI           => "SUBI",
      Opcode::Mul            => "MUL",
      Opcode::Div            => "DIV",
      Opcode::Mod            => "MOD",
      Opcode::Lt             => "LT",
      Opcode::Le             => "LE",
      Opcode::Eq             => "EQ",
      Opcode::EqI            => "EQI",
      Opcode::Ne             => "NE",
      Opcode::Unm            => "UNM",
      Opcode::Rand           => "RAND",
      Opcode::Inc            => "INC",
      Opcode::Dec            => "DEC",
      Opcode::LtR0           => "LT_R0",
      Opcode::LeR0           => "LE_R0",
      Opcode::EqR0           => "EQ_R0",
      Opcode::EqIR0          => "EQI_R0",
      Opcode::NeR0           => "NE_R0",
      Opcode::JmpEq0         => "JMPEQ0",
      Opcode::JmpEq0R0       => "JMPEQ0_R0",
      Opcode::Jmp            => "JMP",
      Opcode::JmpNeq0        => "JMPNEQ0",
      Opcode::JmpCnctCons    => "JMPCNCT_CONS",
      Opcode::JmpCnct        => "JMPCNCT",
      Opcode::Loop           => "LOOP",
      Opcode::LoopRrec       => "LOOP_RREC",
      Opcode::LoopRrec1      => "LOOP_RREC1",
      Opcode::LoopRrec2      => "LOOP_RREC2",
      Opcode::LoopRrecFreeR  => "LOOP_RREC_FREE_R",
      Opcode::LoopRrec1FreeR => "LOOP_RREC1_FREE_R",
      Opcode::LoopRrec2FreeR => "LOOP_RREC2_FREE_R",
      Opcode::CnctGN         => "CNCTGN",
      Opcode::SubstGN        => "SUBSTGN",
      Opcode::Nop            => "NOP",
    }
  }
}

impl Display for Opcode {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.mnemonic())
  }
}

/// A listing of an instruction stream, one instruction per line with its address.
pub fn listing(code: &[Word]) -> String {
  let mut out = String::new();
  let mut pc  = 0;

  while pc < code.len() {
    match Opcode::decode(code[pc]) {
      Some(opcode) => {
        let end      = (pc + 1 + opcode.operand_count()).min(code.len());
        let operands = code[pc + 1..end].iter().map(|word| word.to_string()).collect::<Vec<_>>();
        let _        = writeln!(out, "{:>4}: {} {}", pc, opcode, operands.join(" "));
        pc = end;
      }
      None => {
        let _ = writeln!(out, "{:>4}: ?{}", pc, code[pc]);
        pc += 1;
      }
    }
  }

  out
}
