/*!

Port and register contents.

A `Value` is an integer, a reference to an agent cell, or a reference to a name cell. Ports are read and written
atomically, so values are packed into a single `u64` when stored in a cell:

```text
 63                                       2 1 0
 ┌──────────────────────────────────────────┬───┐
 │ payload                                  │tag│
 └──────────────────────────────────────────┴───┘
 tag 0: unset port (payload 0)
 tag 1: integer, payload is a 62-bit two's complement number
 tag 2: agent, payload is heap << 40 | hoop << 32 | slot
 tag 3: name, same payload layout as agent
```

*/

use std::fmt::{Display, Formatter};

const TAG_MASK : u64 = 0b11;
const TAG_INT  : u64 = 1;
const TAG_AGENT: u64 = 2;
const TAG_NAME : u64 = 3;

/// The encoding of an unset port.
pub const EMPTY: u64 = 0;

/// Location of a cell: which worker heap, which hoop of that heap, which slot of that hoop.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct CellRef {
  pub heap: u8,
  pub hoop: u8,
  pub slot: u32,
}

impl CellRef {
  #[inline(always)]
  pub const fn new(heap: u8, hoop: u8, slot: u32) -> Self {
    CellRef { heap, hoop, slot }
  }

  #[inline(always)]
  fn payload(self) -> u64 {
    ((self.heap as u64) << 40) | ((self.hoop as u64) << 32) | self.slot as u64
  }

  #[inline(always)]
  fn from_payload(payload: u64) -> Self {
    CellRef {
      heap: (payload >> 40) as u8,
      hoop: (payload >> 32) as u8,
      slot: payload as u32,
    }
  }
}

impl Display for CellRef {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}:{}:{}", self.heap, self.hoop, self.slot)
  }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Value {
  Int(i64),
  Agent(CellRef),
  Name(CellRef),
}

impl Default for Value {
  fn default() -> Self {
    Value::Int(0)
  }
}

impl Value {
  /// Smallest and largest representable integers.
  pub const INT_MIN: i64 = -(1 << 61);
  pub const INT_MAX: i64 = (1 << 61) - 1;

  /// An integer value, wrapped to the 62 bits a port can hold.
  #[inline(always)]
  pub fn int(n: i64) -> Value {
    Value::Int((n << 2) >> 2)
  }

  #[inline(always)]
  pub fn encode(self) -> u64 {
    match self {
      Value::Int(n)      => ((n as u64) << 2) | TAG_INT,
      Value::Agent(cell) => (cell.payload() << 2) | TAG_AGENT,
      Value::Name(cell)  => (cell.payload() << 2) | TAG_NAME,
    }
  }

  #[inline(always)]
  pub fn decode(word: u64) -> Option<Value> {
    match word & TAG_MASK {
      TAG_INT   => Some(Value::Int((word as i64) >> 2)),
      TAG_AGENT => Some(Value::Agent(CellRef::from_payload(word >> 2))),
      TAG_NAME  => Some(Value::Name(CellRef::from_payload(word >> 2))),
      _         => None,
    }
  }

  #[inline(always)]
  pub fn encode_port(port: Option<Value>) -> u64 {
    port.map_or(EMPTY, Value::encode)
  }

  #[inline(always)]
  pub fn is_int(&self) -> bool {
    matches!(self, Value::Int(_))
  }

  #[inline(always)]
  pub fn is_name(&self) -> bool {
    matches!(self, Value::Name(_))
  }

  #[inline(always)]
  pub fn as_int(&self) -> Option<i64> {
    match self {
      Value::Int(n) => Some(*n),
      _ => None,
    }
  }

  /// The cell a reference points to, for agents and names alike.
  #[inline(always)]
  pub fn cell(&self) -> Option<CellRef> {
    match self {
      Value::Agent(cell) | Value::Name(cell) => Some(*cell),
      Value::Int(_) => None,
    }
  }
}

impl Display for Value {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Value::Int(n)      => write!(f, "{}", n),
      Value::Agent(cell) => write!(f, "agent@{}", cell),
      Value::Name(cell)  => write!(f, "name@{}", cell),
    }
  }
}
