/*!

Agent kinds.

Every agent cell carries a `KindId`. The low ids are fixed: constructors first, then the built-in destructors the
interpreter reduces natively, then the arithmetic agents. User agents are numbered from `FIRST_USER` in order of
first appearance. The ordering matters: when no rule exists for a pair, the interpreter retries with the sides
swapped if the left id is smaller, so constructors must sort below destructors.

*/

use std::collections::HashMap;

use crate::{abstractions::IString, MAX_PORT};

pub type KindId = u32;

pub const INT      : KindId = 0;
pub const TUPLE0   : KindId = 1;
pub const NIL      : KindId = 7;
pub const CONS     : KindId = 8;
pub const PERCENT  : KindId = 9;
pub const WILDCARD : KindId = 10;

pub const ERASER   : KindId = 11;
pub const DUP      : KindId = 12;
pub const APPEND   : KindId = 13;
pub const ZIP      : KindId = 14;
pub const ZIPC     : KindId = 15;
pub const MAP      : KindId = 16;
pub const MERGER   : KindId = 17;
pub const MERGER_P : KindId = 18;

pub const ADD      : KindId = 19;
pub const ADD2     : KindId = 20;
pub const SUB      : KindId = 21;
pub const SUB2     : KindId = 22;
pub const MUL      : KindId = 23;
pub const MUL2     : KindId = 24;
pub const DIV      : KindId = 25;
pub const DIV2     : KindId = 26;
pub const MOD      : KindId = 27;
pub const MOD2     : KindId = 28;

pub const FIRST_USER: KindId = 29;

/// Largest tuple the runtime supports.
pub const MAX_TUPLE: usize = 5;

#[inline(always)]
pub fn tuple(arity: usize) -> KindId {
  TUPLE0 + arity as KindId
}

#[inline(always)]
pub fn is_tuple(kind: KindId) -> bool {
  (TUPLE0..=tuple(MAX_TUPLE)).contains(&kind)
}

/// The second stage of an arithmetic agent, e.g. `_Add` for `Add`.
#[inline(always)]
pub fn is_arithmetic_second_stage(kind: KindId) -> bool {
  (ADD..=MOD2).contains(&kind) && (kind - ADD) % 2 == 1
}

// Display name, arity, and whether the name resolves to the built-in when written in a program.
const BUILTINS: [(&str, usize, bool); FIRST_USER as usize] = [
  ("Int",      0, false),
  ("Tuple0",   0, false),
  ("Tuple1",   1, false),
  ("Tuple2",   2, false),
  ("Tuple3",   3, false),
  ("Tuple4",   4, false),
  ("Tuple5",   5, false),
  ("[]",       0, false),
  ("Cons",     2, false),
  ("%",        1, false),
  ("Wildcard", 0, false),
  ("Eraser",   0, true),
  ("Dup",      2, true),
  ("Append",   2, true),
  ("Zip",      2, true),
  ("ZipC",     2, false),
  ("Map",      2, true),
  ("Merger",   1, true),
  ("_MergerP", 1, false),
  ("Add",      2, true),
  ("_Add",     2, false),
  ("Sub",      2, true),
  ("_Sub",     2, false),
  ("Mul",      2, true),
  ("_Mul",     2, false),
  ("Div",      2, true),
  ("_Div",     2, false),
  ("Mod",      2, true),
  ("_Mod",     2, false),
];

pub struct KindTable {
  names  : Vec<IString>,
  arities: Vec<Option<usize>>,
  by_name: HashMap<IString, KindId>,
}

impl Default for KindTable {
  fn default() -> Self {
    KindTable::new()
  }
}

impl KindTable {
  pub fn new() -> Self {
    let mut table = KindTable {
      names  : Vec::with_capacity(2 * FIRST_USER as usize),
      arities: Vec::with_capacity(2 * FIRST_USER as usize),
      by_name: HashMap::new(),
    };

    for (id, (name, arity, visible)) in BUILTINS.iter().enumerate() {
      let name = IString::from(*name);
      if *visible {
        table.by_name.insert(name.clone(), id as KindId);
      }
      table.names.push(name);
      table.arities.push(Some(*arity));
    }

    table
  }

  /// The id for `name`, creating a user kind on first sight. Built-in agent names resolve to their fixed ids.
  pub fn intern(&mut self, name: &str) -> KindId {
    if let Some(id) = self.by_name.get(&IString::from(name)) {
      return *id;
    }

    let id   = self.names.len() as KindId;
    let name = IString::from(name);
    self.by_name.insert(name.clone(), id);
    self.names.push(name);
    self.arities.push(None);
    id
  }

  pub fn lookup(&self, name: &str) -> Option<KindId> {
    self.by_name.get(&IString::from(name)).copied()
  }

  pub fn name(&self, kind: KindId) -> &str {
    self.names.get(kind as usize).map_or("?", |name| &**name)
  }

  pub fn arity(&self, kind: KindId) -> Option<usize> {
    self.arities.get(kind as usize).copied().flatten()
  }

  /// Records the arity of a user kind. A later mismatch is reported and the new arity wins. Built-in arities are
  /// fixed and never overwritten.
  pub fn set_arity(&mut self, kind: KindId, arity: usize) {
    debug_assert!(arity <= MAX_PORT);
    if kind < FIRST_USER {
      return;
    }
    let Some(slot) = self.arities.get_mut(kind as usize) else {
      return;
    };

    if let Some(previous) = *slot {
      if previous != arity {
        crate::warning!(
          2,
          "the arity of `{}' was {}, but it is used here with arity {}; the latter is kept",
          self.names[kind as usize],
          previous,
          arity
        );
      }
    }
    *slot = Some(arity);
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}
