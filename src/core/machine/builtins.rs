/*!

Reductions the runtime knows without a rule: erasing, duplication, tuples and lists, list operations, the merger, the
`%f` application, and integer arithmetic.

Each built-in returns `None` when it has nothing for the pair, so that the caller can try the wildcard rule and the
other orientation. Otherwise it counts one interaction and says how to continue. Cells are reused in place where the
result has the same shape, e.g. an `Append` agent walks down the list it appends to.

*/

use crossbeam::utils::Backoff;

use crate::{
  api::value::{CellRef, Value},
  core::{
    kind_table::{
      self,
      KindId,
      ADD,
      ADD2,
      APPEND,
      CONS,
      DIV,
      DIV2,
      DUP,
      ERASER,
      MAP,
      MERGER,
      MERGER_P,
      MOD,
      MOD2,
      MUL,
      MUL2,
      NIL,
      PERCENT,
      SUB,
      SUB2,
      TUPLE0,
      ZIP,
      ZIPC,
    },
    machine::{agent_cell, eval::Step, port, print_term, Machine, RuntimeError},
    Runtime,
  },
};

impl Machine {
  // region Integers

  /// `agent ~ n` for the built-in agents. `None` if `agent` has no integer reduction.
  pub(crate) fn int_builtin(
    &mut self,
    rt   : &Runtime,
    agent: CellRef,
    kind : KindId,
    n    : i64,
  ) -> Result<Option<Step>, RuntimeError>
  {
    let cell = rt.agent(agent);

    let step = match kind {
      // The first operand arrives: remember it and wait for the second.
      ADD | SUB | MUL | DIV | MOD => {
        let other = port(rt, agent, 1)?;
        cell.set_kind(kind + 1);
        cell.set_port(1, Some(Value::Int(n)));
        Step::Next(Value::Agent(agent), other)
      }

      ADD2 | SUB2 | MUL2 | DIV2 | MOD2 => {
        let first = match port(rt, agent, 1)? {
          Value::Int(first) => first,
          other => return Err(RuntimeError::NotAnInteger(print_term(rt, other))),
        };
        let result = arithmetic(kind, n, first)?;
        let out    = port(rt, agent, 0)?;
        rt.free_agent(agent);
        Step::Next(out, Value::int(result))
      }

      ERASER => {
        rt.free_agent(agent);
        Step::Done
      }

      DUP => {
        let (p, q) = (port(rt, agent, 0)?, port(rt, agent, 1)?);
        self.push(rt, p, Value::Int(n));
        rt.free_agent(agent);
        Step::Next(q, Value::Int(n))
      }

      _ => return Ok(None),
    }; // end match on kind

    self.interactions += 1;
    Ok(Some(step))
  }

  // endregion

  // region Agents

  /// `left ~ right` for a built-in left agent. `None` if there is no built-in reduction for the pair.
  pub(crate) fn agent_builtin(
    &mut self,
    rt   : &Runtime,
    left : CellRef,
    id_l : KindId,
    right: CellRef,
    id_r : KindId,
  ) -> Result<Option<Step>, RuntimeError>
  {
    let step = match (id_l, id_r) {
      (ERASER, _) => self.erase(rt, left, right, id_r)?,

      (DUP, DUP) => {
        let (a, b) = (port(rt, left, 0)?, port(rt, left, 1)?);
        let (c, d) = (port(rt, right, 0)?, port(rt, right, 1)?);
        self.push(rt, a, c);
        rt.free2(left, right);
        Step::Next(b, d)
      }

      (DUP, _) => self.duplicate(rt, left, right, id_r)?,

      (TUPLE0, TUPLE0) | (NIL, NIL) => {
        rt.free2(left, right);
        Step::Done
      }

      (CONS, CONS) => self.annihilate(rt, left, right, 2)?,

      (l, r) if l == r && kind_table::is_tuple(l) => {
        self.annihilate(rt, left, right, (l - TUPLE0) as usize)?
      }

      (APPEND, NIL) => {
        let (out, tail) = (port(rt, left, 0)?, port(rt, left, 1)?);
        rt.free2(left, right);
        Step::Next(out, tail)
      }

      (APPEND, CONS) => {
        // Append(r, a) ~ x:xs  =>  r ~ x:w, Append(w, a) ~ xs
        let out = port(rt, left, 0)?;
        let xs  = port(rt, right, 1)?;
        let w   = self.new_name(rt)?;
        rt.agent(right).set_port(1, Some(w));
        self.push(rt, out, Value::Agent(right));
        rt.agent(left).set_port(0, Some(w));
        Step::Next(Value::Agent(left), xs)
      }

      (ZIP | ZIPC, NIL) => {
        // Zip(r, ys) ~ []  =>  r ~ [], Eraser ~ ys
        let (out, rest) = (port(rt, left, 0)?, port(rt, left, 1)?);
        rt.agent(left).set_kind(ERASER);
        self.push(rt, rest, Value::Agent(left));
        Step::Next(out, Value::Agent(right))
      }

      (ZIP, CONS) => {
        // Zip(r, ys) ~ x:xs  =>  ZipC(r, x:xs) ~ ys
        let ys = port(rt, left, 1)?;
        rt.agent(left).set_kind(ZIPC);
        rt.agent(left).set_port(1, Some(Value::Agent(right)));
        Step::Next(Value::Agent(left), ys)
      }

      (ZIPC, CONS) => self.zip_step(rt, left, right)?,

      (MAP, NIL) => {
        // Map(r, f) ~ []  =>  r ~ [], Eraser ~ f
        let (out, f) = (port(rt, left, 0)?, port(rt, left, 1)?);
        rt.agent(left).set_kind(ERASER);
        self.push(rt, Value::Agent(left), f);
        Step::Next(out, Value::Agent(right))
      }

      (MAP, CONS) => self.map_step(rt, left, right)?,

      (MERGER, _) if id_r == kind_table::tuple(2) => {
        // Merger(r) ~ (xs, ys)  =>  MergerP(r) ~ xs, MergerP(r) ~ ys
        let (xs, ys) = (port(rt, right, 0)?, port(rt, right, 1)?);
        let merger   = rt.agent(left);
        merger.set_kind(MERGER_P);
        merger.set_port(1, None);
        merger.set_port(2, None);
        self.push(rt, Value::Agent(left), ys);
        self.push(rt, Value::Agent(left), xs);
        rt.free_agent(right);
        Step::Done
      }

      (MERGER_P, NIL | CONS) if rt.is_threaded() => {
        // Counts its own interactions: a lost race is retried without one.
        return self.merge_concurrently(rt, left, right, id_r).map(Some);
      }

      (MERGER_P, NIL) => {
        let merger = rt.agent(left);
        match merger.port(1) {
          None => {
            // The first list to end waits for the other.
            merger.set_port(1, Some(Value::Agent(right)));
            Step::Done
          }
          Some(waiting) => {
            let out = port(rt, left, 0)?;
            rt.free_value(waiting);
            rt.free_agent(left);
            Step::Next(out, Value::Agent(right))
          }
        }
      }

      (MERGER_P, CONS) => {
        // MergerP(r) ~ x:xs  =>  r ~ x:w, MergerP(w) ~ xs
        let out = port(rt, left, 0)?;
        let xs  = port(rt, right, 1)?;
        let w   = self.new_name(rt)?;
        rt.agent(left).set_port(0, Some(w));
        self.push(rt, Value::Agent(left), xs);
        rt.agent(right).set_port(1, Some(w));
        Step::Next(out, Value::Agent(right))
      }

      (PERCENT, _) if id_r == kind_table::tuple(2) => self.apply(rt, left, right)?,

      _ => return Ok(None),
    }; // end match on `(id_l, id_r)`

    self.interactions += 1;
    Ok(Some(step))
  }

  /// `Eraser ~ A(x1, ..., xn)`. Erasers for every port but the first are new; the original goes on to the first.
  fn erase(&mut self, rt: &Runtime, eraser: CellRef, target: CellRef, kind: KindId) -> Result<Step, RuntimeError> {
    let arity = rt.arity(kind);

    if arity == 0 {
      rt.free2(eraser, target);
      return Ok(Step::Done);
    }

    for i in 1..arity {
      let wire  = port(rt, target, i)?;
      let extra = self.new_agent(rt, ERASER)?;
      self.push(rt, Value::Agent(extra), wire);
    }
    let first = port(rt, target, 0)?;
    rt.free_agent(target);
    Ok(Step::Next(Value::Agent(eraser), first))
  }

  /// `Dup(p, q) ~ A(x1, ..., xn)` for any `A` other than `Dup`.
  ///
  /// A copy of `A` is made with a fresh name for every port that is not an integer; integers are copied. Each such
  /// port `xi` is then split by a `Dup` between the original and the copy. The `Dup` at hand is reused for the first
  /// port, and otherwise freed.
  fn duplicate(&mut self, rt: &Runtime, dup: CellRef, target: CellRef, kind: KindId) -> Result<Step, RuntimeError> {
    let (p, q) = (port(rt, dup, 0)?, port(rt, dup, 1)?);
    let arity  = rt.arity(kind);
    let copy   = self.new_agent(rt, kind)?;

    let mut wires = Vec::with_capacity(arity);
    for i in 0..arity {
      let wire = port(rt, target, i)?;
      let copied = match wire {
        Value::Int(_) => wire,
        _ => self.new_name(rt)?,
      };
      rt.agent(copy).set_port(i, Some(copied));
      wires.push(wire);
    }

    for (i, wire) in wires.iter().enumerate().skip(1) {
      if wire.is_int() {
        continue;
      }
      let ww    = self.new_name(rt)?;
      let split = self.new_agent(rt, DUP)?;
      rt.agent(split).set_port(0, rt.agent(copy).port(i));
      rt.agent(split).set_port(1, Some(ww));
      self.push(rt, Value::Agent(split), *wire);
      rt.agent(target).set_port(i, Some(ww));
    }

    match wires.first() {
      Some(first) if !first.is_int() => {
        let ww = self.new_name(rt)?;
        rt.agent(dup).set_port(0, rt.agent(copy).port(0));
        rt.agent(dup).set_port(1, Some(ww));
        self.push(rt, Value::Agent(dup), *first);
        self.push(rt, p, Value::Agent(copy));
        rt.agent(target).set_port(0, Some(ww));
      }
      _ => {
        self.push(rt, p, Value::Agent(copy));
        rt.free_agent(dup);
      }
    }

    Ok(Step::Next(q, Value::Agent(target)))
  }

  /// Two agents of the same constructor: connect their ports pairwise.
  fn annihilate(&mut self, rt: &Runtime, left: CellRef, right: CellRef, arity: usize) -> Result<Step, RuntimeError> {
    if arity == 0 {
      rt.free2(left, right);
      return Ok(Step::Done);
    }

    for i in (1..arity).rev() {
      let (a, b) = (port(rt, left, i)?, port(rt, right, i)?);
      self.push(rt, a, b);
    }
    let (a, b) = (port(rt, left, 0)?, port(rt, right, 0)?);
    rt.free2(left, right);
    Ok(Step::Next(a, b))
  }

  /// `ZipC(r, x:xs) ~ y:ys  =>  r ~ (y, x):ws, Zip(ws, ys) ~ xs`
  fn zip_step(&mut self, rt: &Runtime, zip: CellRef, right: CellRef) -> Result<Step, RuntimeError> {
    let out   = port(rt, zip, 0)?;
    let inner = agent_cell(rt, port(rt, zip, 1)?)?;
    let (y, ys) = (port(rt, right, 0)?, port(rt, right, 1)?);
    let (x, xs) = (port(rt, inner, 0)?, port(rt, inner, 1)?);

    let pair = rt.agent(inner);
    pair.set_kind(kind_table::tuple(2));
    pair.set_port(0, Some(y));
    pair.set_port(1, Some(x));

    let ws = self.new_name(rt)?;
    rt.agent(right).set_port(0, Some(Value::Agent(inner)));
    rt.agent(right).set_port(1, Some(ws));
    self.push(rt, out, Value::Agent(right));

    let cell = rt.agent(zip);
    cell.set_kind(ZIP);
    cell.set_port(0, Some(ws));
    cell.set_port(1, Some(ys));
    Ok(Step::Next(Value::Agent(zip), xs))
  }

  /// `Map(r, f) ~ x:xs  =>  r ~ w:ws, f ~ (w, x), Map(ws, f) ~ xs`, with `f` duplicated unless it is a `%g`.
  fn map_step(&mut self, rt: &Runtime, map: CellRef, right: CellRef) -> Result<Step, RuntimeError> {
    let (out, f) = (port(rt, map, 0)?, port(rt, map, 1)?);
    let (x, xs)  = (port(rt, right, 0)?, port(rt, right, 1)?);

    let w    = self.new_name(rt)?;
    let ws   = self.new_name(rt)?;
    let pair = self.new_agent(rt, kind_table::tuple(2))?;
    rt.agent(pair).set_port(0, Some(w));
    rt.agent(pair).set_port(1, Some(x));

    rt.agent(right).set_port(0, Some(w));
    rt.agent(right).set_port(1, Some(ws));
    self.push(rt, out, Value::Agent(right));

    match f {
      Value::Agent(function) if rt.agent(function).kind() == PERCENT => {
        let copy = self.new_agent(rt, PERCENT)?;
        rt.agent(copy).set_port(0, rt.agent(function).port(0));
        self.push(rt, Value::Agent(copy), Value::Agent(pair));
        rt.agent(map).set_port(0, Some(ws));
      }
      _ => {
        let f1  = self.new_name(rt)?;
        let f2  = self.new_name(rt)?;
        let dup = self.new_agent(rt, DUP)?;
        rt.agent(dup).set_port(0, Some(f1));
        rt.agent(dup).set_port(1, Some(f2));
        self.push(rt, Value::Agent(dup), f);
        self.push(rt, f1, Value::Agent(pair));
        rt.agent(map).set_port(0, Some(ws));
        rt.agent(map).set_port(1, Some(f2));
      }
    }

    Ok(Step::Next(Value::Agent(map), xs))
  }

  /// `MergerP(r) ~ []` and `MergerP(r) ~ x:xs` when both inputs may be served at the same time. Port 1 locks the
  /// agent while a `Cons` is moved to the output; port 2 holds the first `[]` to arrive.
  fn merge_concurrently(
    &mut self,
    rt    : &Runtime,
    merger: CellRef,
    list  : CellRef,
    kind  : KindId,
  ) -> Result<Step, RuntimeError>
  {
    let cell    = rt.agent(merger);
    let backoff = Backoff::new();

    loop {
      if let Some(ended) = cell.port(2) {
        let ended_is_nil = matches!(ended, Value::Agent(nil) if rt.agent(nil).kind() == NIL);
        if kind == CONS || ended_is_nil {
          // The other input has ended, so this one is the rest of the output.
          self.interactions += 1;
          let out = port(rt, merger, 0)?;
          rt.free_value(ended);
          rt.free_agent(merger);
          return Ok(Step::Next(out, Value::Agent(list)));
        }
        backoff.snooze();
        continue;
      }

      if kind == NIL {
        match cell.compare_exchange_port(2, None, Some(Value::Agent(list))) {
          Ok(()) => return Ok(Step::Done),
          Err(_) => {
            backoff.snooze();
            continue;
          }
        }
      }

      if cell.compare_exchange_port(1, None, Some(Value::Agent(list))).is_err() {
        backoff.snooze();
        continue;
      }

      self.interactions += 1;
      let out = port(rt, merger, 0)?;
      let xs  = port(rt, list, 1)?;
      let w   = self.new_name(rt)?;
      cell.set_port(0, Some(w));
      rt.agent(list).set_port(1, Some(w));
      cell.set_port(1, None);
      self.push(rt, Value::Agent(merger), xs);
      return Ok(Step::Next(out, Value::Agent(list)));
    }
  }

  /// `%f ~ (p, q)`: applies `f` to the pair, turning `%f` into an `f` agent.
  fn apply(&mut self, rt: &Runtime, percent: CellRef, pair: CellRef) -> Result<Step, RuntimeError> {
    let kind = match port(rt, percent, 0)? {
      Value::Int(id) if id >= 0 => id as KindId,
      other => return Err(RuntimeError::NotAnInteger(print_term(rt, other))),
    };

    let arity = rt.kinds.arity(kind).unwrap_or(0);
    if arity < 1 {
      return Err(RuntimeError::NoArity {
        kind : rt.kinds.name(kind).to_string(),
        left : print_term(rt, Value::Agent(percent)),
        right: print_term(rt, Value::Agent(pair)),
      });
    }

    let (p, q) = (port(rt, pair, 0)?, port(rt, pair, 1)?);

    // %f ~ (p, q)  =>  f(p) ~ q
    if arity == 1 {
      rt.agent(pair).set_kind(kind);
      rt.free_agent(percent);
      return Ok(Step::Next(Value::Agent(pair), q));
    }

    // %f ~ ((p1, ..., pn), q)  =>  f(p1, ..., pn) ~ q
    if let Value::Agent(args) = p {
      if rt.agent(args).kind() == kind_table::tuple(arity) {
        rt.agent(args).set_kind(kind);
        rt.free2(percent, pair);
        return Ok(Step::Next(p, q));
      }
    }

    // %f ~ (p, q)  =>  f(x1, ..., xn) ~ q, (x1, ..., xn) ~ p
    rt.agent(percent).set_kind(kind);
    rt.agent(pair).set_kind(kind_table::tuple(arity));
    for i in 0..arity {
      let x = self.new_name(rt)?;
      rt.agent(percent).set_port(i, Some(x));
      rt.agent(pair).set_port(i, Some(x));
    }
    self.push(rt, Value::Agent(pair), p);
    Ok(Step::Next(Value::Agent(percent), q))
  }

  // endregion
}

/// `m op n` for the second stage of an arithmetic agent, where `n` arrived first.
fn arithmetic(kind: KindId, m: i64, n: i64) -> Result<i64, RuntimeError> {
  match kind {
    ADD2 => Ok(m.wrapping_add(n)),
    SUB2 => Ok(m.wrapping_sub(n)),
    MUL2 => Ok(m.wrapping_mul(n)),
    DIV2 if n == 0 => Err(RuntimeError::DivisionByZero),
    DIV2 => Ok(m.wrapping_div(n)),
    MOD2 if n == 0 => Err(RuntimeError::DivisionByZero),
    _ => Ok(m.wrapping_rem(n)),
  }
}
