/*!

Global names.

A name that occurs exactly once in a net outlives the net: it becomes a global name, the handle through which the
caller reads results and connects later nets. The table maps identifiers to `GlobalId`s and each id to the name cell
currently standing for it. Ids are assigned at compile time, with the table borrowed mutably; the cell slots are
atomic because they are filled in by the interpreter while the net runs.

*/

use std::{
  collections::HashMap,
  sync::atomic::{AtomicU64, Ordering::{Acquire, Release}},
};

use crate::{
  abstractions::IString,
  api::value::{Value, EMPTY},
};

pub type GlobalId = u32;

#[derive(Default)]
pub struct NameTable {
  by_name: HashMap<IString, GlobalId>,
  idents : Vec<IString>,
  slots  : Vec<AtomicU64>,
}

impl NameTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn intern(&mut self, ident: &str) -> GlobalId {
    if let Some(gid) = self.by_name.get(&IString::from(ident)) {
      return *gid;
    }

    let gid   = self.idents.len() as GlobalId;
    let ident = IString::from(ident);
    self.by_name.insert(ident.clone(), gid);
    self.idents.push(ident);
    self.slots.push(AtomicU64::new(EMPTY));
    gid
  }

  pub fn lookup(&self, ident: &str) -> Option<GlobalId> {
    self.by_name.get(&IString::from(ident)).copied()
  }

  pub fn ident(&self, gid: GlobalId) -> &str {
    self.idents.get(gid as usize).map_or("?", |ident| &**ident)
  }

  /// The name cell standing for `gid`, if one has been made.
  #[inline(always)]
  pub fn cell(&self, gid: GlobalId) -> Option<Value> {
    self.slots.get(gid as usize).and_then(|slot| Value::decode(slot.load(Acquire)))
  }

  #[inline(always)]
  pub fn set_cell(&self, gid: GlobalId, name: Option<Value>) {
    if let Some(slot) = self.slots.get(gid as usize) {
      slot.store(Value::encode_port(name), Release);
    }
  }

  /// Forgets the cell of `gid`. The id stays reserved for the identifier.
  pub fn erase(&self, gid: GlobalId) {
    self.set_cell(gid, None);
  }

  /// Global names that currently have a cell, in id order.
  pub fn live(&self) -> impl Iterator<Item = (GlobalId, &str, Value)> + '_ {
    self.idents.iter().enumerate().filter_map(|(gid, ident)| {
      let gid = gid as GlobalId;
      self.cell(gid).map(|cell| (gid, &**ident, cell))
    })
  }

  /// Forgets every cell.
  pub fn clear_cells(&self) {
    for slot in &self.slots {
      slot.store(EMPTY, Release);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::value::CellRef;

  #[test]
  fn test_intern_and_cells() {
    let mut names = NameTable::new();
    let r = names.intern("r");
    assert_eq!(names.intern("r"), r);
    assert_eq!(names.lookup("s"), None);
    assert_eq!(names.cell(r), None);

    let cell = Value::Name(CellRef::new(0, 1, 2));
    names.set_cell(r, Some(cell));
    assert_eq!(names.live().collect::<Vec<_>>(), vec![(r, "r", cell)]);

    names.erase(r);
    assert_eq!(names.cell(r), None);
    // The identifier keeps its id.
    assert_eq!(names.lookup("r"), Some(r));
  }
}
