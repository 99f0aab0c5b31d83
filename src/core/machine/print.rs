/*!

Rendering terms as text, for results and for error messages.

```text
Succ(Succ(Z))      agents; a capitalised agent without ports has no parentheses
(1,<a1>)           tuples; unbound local names get short invented names
[1,2,3]            lists
[1,2:xs]           a list whose tail is not a list
[1,2,<a1>...]      a list whose tail is not yet known
%inc               a function reference
```

Lists are printed iteratively and cut off after `MAX_LIST_ELEMENTS` elements. An agent met a second time is
printed as `...`, which cuts cycles.

*/

use std::{collections::HashMap, fmt::Write};

use crate::{
  abstractions::BitSet,
  api::value::{CellRef, Value},
  core::{
    kind_table::{self, CONS, NIL, PERCENT, WILDCARD},
    Runtime,
  },
};

const MAX_LIST_ELEMENTS: usize = 30;

struct Printer<'r> {
  rt     : &'r Runtime,
  /// The name whose term is being printed, if any. Meeting it again means the term contains itself.
  root   : Option<CellRef>,
  locals : HashMap<CellRef, String>,
  letter : u8,
  round  : usize,
  visited: BitSet,
  out    : String,
}

impl<'r> Printer<'r> {
  fn new(rt: &'r Runtime, root: Option<CellRef>) -> Self {
    Printer {
      rt,
      root,
      locals : HashMap::new(),
      letter : 0,
      round  : 1,
      visited: BitSet::new(),
      out    : String::new(),
    }
  }

  /// `a1`, `b1`, ..., `z1`, `a2`, ...
  fn local_name(&mut self, cell: CellRef) -> String {
    if let Some(name) = self.locals.get(&cell) {
      return name.clone();
    }

    let name = format!("{}{}", (b'a' + self.letter) as char, self.round);
    self.letter += 1;
    if self.letter == 26 {
      self.letter = 0;
      self.round += 1;
    }
    self.locals.insert(cell, name.clone());
    name
  }

  fn term(&mut self, value: Option<Value>) {
    let value = match value {
      Some(value) => value,
      None => {
        self.out.push_str("<NULL>");
        return;
      }
    };

    match value {
      Value::Int(n) => {
        let _ = write!(self.out, "{}", n);
      }
      Value::Name(cell) => self.name(cell),
      Value::Agent(cell) => self.agent(cell),
    }
  }

  fn name(&mut self, cell: CellRef) {
    let rt   = self.rt;
    let name = rt.name(cell);

    match name.port() {
      None => match name.global_id() {
        Some(gid) => self.out.push_str(rt.names.ident(gid)),
        None => {
          let local = self.local_name(cell);
          let _ = write!(self.out, "<{}>", local);
        }
      },

      Some(_) if self.root == Some(cell) => {
        let ident = name.global_id().map_or("?", |gid| rt.names.ident(gid));
        let _ = write!(self.out, "<Warning:{} is cyclic>", ident);
      }

      Some(port) => match name.global_id() {
        Some(gid) => self.out.push_str(rt.names.ident(gid)),
        None => self.term(Some(port)),
      },
    }
  }

  fn agent(&mut self, cell: CellRef) {
    let rt = self.rt;
    if !self.visited.insert(rt.agent_index(cell)) {
      self.out.push_str("...");
      return;
    }

    let agent = rt.agent(cell);
    let kind  = agent.kind();

    match kind {
      NIL => self.out.push_str("[]"),

      CONS => self.list(cell),

      PERCENT => {
        let referenced = match agent.port(0) {
          Some(Value::Int(id)) => rt.kinds.name(id as u32),
          _ => "?",
        };
        let _ = write!(self.out, "%{}", referenced);
      }

      WILDCARD => self.out.push_str("Wildcard"),

      _ if kind_table::is_tuple(kind) => {
        self.out.push('(');
        self.ports(cell, rt.arity(kind));
        self.out.push(')');
      }

      _ => {
        let name  = rt.kinds.name(kind);
        let arity = rt.arity(kind);
        self.out.push_str(name);

        let bare = arity == 0 && name.starts_with(|c: char| c.is_ascii_uppercase());
        if !bare {
          self.out.push('(');
          self.ports(cell, arity);
          self.out.push(')');
        }
      }
    } // end match on kind
  }

  fn ports(&mut self, cell: CellRef, arity: usize) {
    for i in 0..arity {
      if i > 0 {
        self.out.push(',');
      }
      let port = self.rt.agent(cell).port(i);
      self.term(port);
    }
  }

  fn list(&mut self, head: CellRef) {
    let rt = self.rt;
    self.out.push('[');

    let mut cell     = head;
    let mut elements = 0;
    loop {
      let agent = rt.agent(cell);
      self.term(agent.port(0));

      // The tail, through any names already connected.
      let mut tail = agent.port(1);
      while let Some(Value::Name(name)) = tail {
        match rt.name(name).port() {
          Some(next) => tail = Some(next),
          None => break,
        }
      }

      match tail {
        Some(Value::Agent(next)) if rt.agent(next).kind() == NIL => {
          self.out.push(']');
          return;
        }

        Some(Value::Agent(next)) if rt.agent(next).kind() == CONS => {
          if !self.visited.insert(rt.agent_index(next)) {
            self.out.push_str(",...]");
            return;
          }
          elements += 1;
          if elements > MAX_LIST_ELEMENTS {
            self.out.push_str(",...]");
            return;
          }
          self.out.push(',');
          cell = next;
        }

        Some(Value::Name(name)) => {
          self.out.push(',');
          self.name(name);
          self.out.push_str("...]");
          return;
        }

        other => {
          self.out.push(':');
          self.term(other);
          self.out.push(']');
          return;
        }
      }
    }
  }
}

/// The text of `value`.
pub(crate) fn print_term(rt: &Runtime, value: Value) -> String {
  let mut printer = Printer::new(rt, None);
  printer.term(Some(value));
  printer.out
}

/// The text of the term connected to the name in `cell`, or `<EMPTY>` if nothing is connected.
pub(crate) fn print_name(rt: &Runtime, cell: CellRef) -> String {
  match rt.name(cell).port() {
    None => "<EMPTY>".to_string(),
    Some(port) => {
      let mut printer = Printer::new(rt, Some(cell));
      printer.term(Some(port));
      printer.out
    }
  }
}
