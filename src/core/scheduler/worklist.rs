/*!

A stack of pending equations. Each machine owns one, and the scheduler keeps a shared one behind a lock for
handing work to idle workers. The stack starts at the configured capacity and doubles when full.

*/

use crate::api::value::Value;

pub type Equation = (Value, Value);

pub struct Worklist {
  equations: Vec<Equation>,
}

impl Worklist {
  pub fn with_capacity(capacity: usize) -> Self {
    Worklist {
      equations: Vec::with_capacity(capacity.max(1)),
    }
  }

  #[inline(always)]
  pub fn push(&mut self, left: Value, right: Value) {
    if self.equations.len() == self.equations.capacity() {
      let capacity = self.equations.capacity();
      crate::info!(4, "equation stack grows from {} to {}", capacity, capacity * 2);
      self.equations.reserve_exact(capacity);
    }
    self.equations.push((left, right));
  }

  #[inline(always)]
  pub fn pop(&mut self) -> Option<Equation> {
    self.equations.pop()
  }

  pub fn len(&self) -> usize {
    self.equations.len()
  }

  pub fn is_empty(&self) -> bool {
    self.equations.is_empty()
  }

  pub fn capacity(&self) -> usize {
    self.equations.capacity()
  }

  pub fn clear(&mut self) {
    self.equations.clear();
  }

  pub fn iter(&self) -> impl Iterator<Item = &Equation> {
    self.equations.iter()
  }

  /// Removes the `count` most recently pushed equations, keeping their order.
  pub fn split_off_top(&mut self, count: usize) -> Vec<Equation> {
    let at = self.equations.len().saturating_sub(count);
    self.equations.split_off(at)
  }

  pub fn extend(&mut self, equations: Vec<Equation>) {
    for (left, right) in equations {
      self.push(left, right);
    }
  }
}
