/*!

Compiled rules keyed by the pair of agent kinds they rewrite.

Rules are directional: `(left, right)` and `(right, left)` are separate entries, and the compiler records both
directions of a declaration. Each left kind has a short list of `(right, code)` entries. Redefining a pair overwrites
its code in place; a new pair goes to the front of the list.

*/

use crate::core::{
  bytecode::Word,
  kind_table::{KindId, INT},
};

#[derive(Default)]
pub struct RuleTable {
  rules: Vec<Vec<(KindId, Box<[Word]>)>>,
}

impl RuleTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record(&mut self, left: KindId, right: KindId, code: Box<[Word]>) {
    let index = left as usize;
    if self.rules.len() <= index {
      self.rules.resize_with(index + 1, Vec::new);
    }

    let entries = &mut self.rules[index];
    match entries.iter_mut().find(|(kind, _)| *kind == right) {
      Some(entry) => entry.1 = code,
      None => entries.insert(0, (right, code)),
    }
  }

  #[inline(always)]
  pub fn lookup(&self, left: KindId, right: KindId) -> Option<&[Word]> {
    self.rules
        .get(left as usize)?
        .iter()
        .find(|(kind, _)| *kind == right)
        .map(|(_, code)| &code[..])
  }

  /// The rule for an agent of kind `left` against an integer.
  #[inline(always)]
  pub fn lookup_against_integer(&self, left: KindId) -> Option<&[Word]> {
    self.lookup(left, INT)
  }

  pub fn remove(&mut self, left: KindId, right: KindId) -> bool {
    match self.rules.get_mut(left as usize) {
      Some(entries) => {
        let before = entries.len();
        entries.retain(|(kind, _)| *kind != right);
        entries.len() != before
      }
      None => false,
    }
  }

  pub fn clear(&mut self) {
    self.rules.clear();
  }

  /// Number of recorded `(left, right)` entries.
  pub fn len(&self) -> usize {
    self.rules.iter().map(Vec::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
