use std::{sync::Barrier, thread};

use crate::{
  api::value::{CellRef, Value},
  config::HeapMode,
  core::{
    heap::{Heap, HeapUsage},
    kind_table::{self, KindId, ADD, APPEND, CONS, DIV, DUP, ERASER, MERGER, NIL, SUB, ZIP},
    machine::{free_term, mark_and_sweep, print_name, print_term, references_to, Machine, RuntimeError},
    scheduler::run_workers,
    Runtime,
  },
};

fn runtime(workers: usize) -> (Runtime, Vec<Machine>) {
  let mut heaps    = Vec::new();
  let mut machines = Vec::new();
  for id in 0..workers {
    let (heap, cursor) = Heap::new(id as u8, HeapMode::default(), workers).unwrap();
    heaps.push(heap);
    machines.push(Machine::new(id as u8, cursor, 16));
  }
  (Runtime::new(heaps, 16), machines)
}

fn agent(rt: &Runtime, machine: &mut Machine, kind: KindId, ports: &[Value]) -> Value {
  let cell = machine.new_agent(rt, kind).unwrap();
  for (i, port) in ports.iter().enumerate() {
    rt.agent(cell).set_port(i, Some(*port));
  }
  Value::Agent(cell)
}

fn list(rt: &Runtime, machine: &mut Machine, items: &[i64]) -> Value {
  let mut tail = agent(rt, machine, NIL, &[]);
  for item in items.iter().rev() {
    tail = agent(rt, machine, CONS, &[Value::Int(*item), tail]);
  }
  tail
}

fn global(rt: &mut Runtime, machine: &mut Machine, ident: &str) -> CellRef {
  let gid  = rt.names.intern(ident);
  let name = machine.new_name(rt).unwrap();
  let cell = name.cell().unwrap();
  rt.name(cell).set_global_id(Some(gid));
  rt.names.set_cell(gid, Some(name));
  cell
}

#[test]
fn test_addition_takes_two_interactions() {
  let (mut rt, mut machines) = runtime(1);
  let machine = &mut machines[0];
  let r       = global(&mut rt, machine, "r");

  let add = agent(&rt, machine, ADD, &[Value::Name(r), Value::Int(4)]);
  machine.push(&rt, add, Value::Int(3));
  machine.reduce(&rt).unwrap();

  assert_eq!(machine.interactions, 2);
  assert_eq!(rt.name(r).port(), Some(Value::Int(7)));
  assert_eq!(rt.usage(), HeapUsage { agents: 0, names: 1 });
}

#[test]
fn test_subtraction_takes_the_later_operand_first() {
  let (mut rt, mut machines) = runtime(1);
  let machine = &mut machines[0];
  let r       = global(&mut rt, machine, "r");

  let sub = agent(&rt, machine, SUB, &[Value::Name(r), Value::Int(4)]);
  machine.push(&rt, sub, Value::Int(10));
  machine.reduce(&rt).unwrap();

  assert_eq!(rt.name(r).port(), Some(Value::Int(-6)));
}

#[test]
fn test_division_by_zero() {
  let (mut rt, mut machines) = runtime(1);
  let machine = &mut machines[0];
  let r       = global(&mut rt, machine, "r");

  let div = agent(&rt, machine, DIV, &[Value::Name(r), Value::Int(3)]);
  machine.push(&rt, div, Value::Int(0));
  assert_eq!(machine.reduce(&rt), Err(RuntimeError::DivisionByZero));
}

#[test]
fn test_eraser_erases_cons() {
  let (mut rt, mut machines) = runtime(1);
  let machine = &mut machines[0];
  let h       = global(&mut rt, machine, "h");
  let t       = global(&mut rt, machine, "t");

  let cons   = agent(&rt, machine, CONS, &[Value::Name(h), Value::Name(t)]);
  let eraser = agent(&rt, machine, ERASER, &[]);
  machine.push(&rt, eraser, cons);
  machine.reduce(&rt).unwrap();

  assert_eq!(machine.interactions, 1);
  for name in [h, t] {
    let connected = rt.name(name).port().and_then(|value| value.cell()).unwrap();
    assert_eq!(rt.agent(connected).kind(), ERASER);
  }
  assert_eq!(rt.usage(), HeapUsage { agents: 2, names: 2 });
  assert_eq!(rt.usage(), rt.counted_usage());
}

#[test]
fn test_dup_copies_an_integer() {
  let (mut rt, mut machines) = runtime(1);
  let machine = &mut machines[0];
  let a       = global(&mut rt, machine, "a");
  let b       = global(&mut rt, machine, "b");

  let dup = agent(&rt, machine, DUP, &[Value::Name(a), Value::Name(b)]);
  machine.push(&rt, Value::Int(5), dup);
  machine.reduce(&rt).unwrap();

  assert_eq!(machine.interactions, 1);
  assert_eq!(rt.name(a).port(), Some(Value::Int(5)));
  assert_eq!(rt.name(b).port(), Some(Value::Int(5)));
}

#[test]
fn test_dup_copies_a_list() {
  let (mut rt, mut machines) = runtime(1);
  let machine = &mut machines[0];
  let a       = global(&mut rt, machine, "a");
  let b       = global(&mut rt, machine, "b");

  let dup    = agent(&rt, machine, DUP, &[Value::Name(a), Value::Name(b)]);
  let source = list(&rt, machine, &[1, 2]);
  machine.push(&rt, dup, source);
  machine.reduce(&rt).unwrap();

  assert_eq!(print_name(&rt, a), "[1,2]");
  assert_eq!(print_name(&rt, b), "[1,2]");
}

#[test]
fn test_integer_pair_is_stuck() {
  let (rt, mut machines) = runtime(1);
  machines[0].push(&rt, Value::Int(3), Value::Int(4));
  machines[0].push(&rt, Value::Int(1), Value::Int(2));

  let error = machines[0].reduce(&rt).unwrap_err();
  assert_eq!(error, RuntimeError::IntegerPair { left: 1, right: 2 });

  mark_and_sweep(&rt, &mut machines);
  assert!(machines[0].worklist.is_empty());
}

#[test]
fn test_recovery_frees_pending_equations() {
  let (rt, mut machines) = runtime(1);
  let machine = &mut machines[0];

  let eraser = agent(&rt, machine, ERASER, &[]);
  let items  = list(&rt, machine, &[1, 2, 3]);
  machine.push(&rt, eraser, items);
  machine.push(&rt, Value::Int(1), Value::Int(2));
  assert!(machine.reduce(&rt).is_err());

  let reclaimed = mark_and_sweep(&rt, &mut machines);
  assert_eq!(reclaimed, HeapUsage { agents: 5, names: 0 });
  assert_eq!(rt.usage(), HeapUsage::default());
  assert_eq!(rt.counted_usage(), HeapUsage::default());
}

#[test]
fn test_interaction_pair_is_freed_across_heaps() {
  let (rt, mut machines) = runtime(2);
  let left  = machines[0].new_agent(&rt, DUP).unwrap();
  let right = machines[1].new_agent(&rt, DUP).unwrap();
  let other = machines[1].new_agent(&rt, DUP).unwrap();

  rt.free2(left, right);
  assert_eq!(rt.usage(), HeapUsage { agents: 1, names: 0 });
  assert_eq!(rt.counted_usage(), rt.usage());

  let again = machines[1].new_agent(&rt, DUP).unwrap();
  rt.free2(other, again);
  assert_eq!(rt.counted_usage(), HeapUsage::default());
}

#[test]
fn test_missing_rule_is_reported_with_both_terms() {
  let (mut rt, mut machines) = runtime(1);
  let foo = rt.kinds.intern("Foo");
  let bar = rt.kinds.intern("Bar");
  rt.kinds.set_arity(foo, 0);
  rt.kinds.set_arity(bar, 0);

  let machine = &mut machines[0];
  let left    = agent(&rt, machine, foo, &[]);
  let right   = agent(&rt, machine, bar, &[]);
  machine.push(&rt, left, right);

  match machine.reduce(&rt) {
    Err(RuntimeError::NoRule { left, right }) => {
      assert_eq!((left.as_str(), right.as_str()), ("Bar", "Foo"));
    }
    other => panic!("expected a missing rule, got {:?}", other),
  }
}

#[test]
fn test_recovery_keeps_global_terms() {
  let (mut rt, mut machines) = runtime(1);
  let r = global(&mut rt, &mut machines[0], "r");

  let kept = list(&rt, &mut machines[0], &[1, 2, 3]);
  rt.name(r).set_port(Some(kept));
  // Garbage left behind by an interrupted reduction.
  list(&rt, &mut machines[0], &[4, 5]);

  let reclaimed = mark_and_sweep(&rt, &mut machines);
  assert_eq!(reclaimed, HeapUsage { agents: 3, names: 0 });
  assert_eq!(print_name(&rt, r), "[1,2,3]");
  assert_eq!(rt.usage(), rt.counted_usage());
}

#[test]
fn test_append() {
  let (mut rt, mut machines) = runtime(1);
  let machine = &mut machines[0];
  let r       = global(&mut rt, machine, "r");

  let back  = list(&rt, machine, &[3]);
  let front = list(&rt, machine, &[1, 2]);
  let app   = agent(&rt, machine, APPEND, &[Value::Name(r), back]);
  machine.push(&rt, app, front);
  machine.reduce(&rt).unwrap();

  assert_eq!(machine.interactions, 3);
  assert_eq!(print_name(&rt, r), "[1,2,3]");
}

#[test]
fn test_zip_pairs_elements() {
  let (mut rt, mut machines) = runtime(1);
  let machine = &mut machines[0];
  let r       = global(&mut rt, machine, "r");

  let ys  = list(&rt, machine, &[10, 20]);
  let xs  = list(&rt, machine, &[1, 2]);
  let zip = agent(&rt, machine, ZIP, &[Value::Name(r), ys]);
  machine.push(&rt, zip, xs);
  machine.reduce(&rt).unwrap();

  assert_eq!(print_name(&rt, r), "[(10,1),(20,2)]");
  // The cells of both lists are reused for the result; one `[]` and the `Zip` are gone.
  assert_eq!(rt.usage().agents, 5);
}

#[test]
fn test_merger_interleaves() {
  let (mut rt, mut machines) = runtime(1);
  let machine = &mut machines[0];
  let r       = global(&mut rt, machine, "r");

  let xs     = list(&rt, machine, &[1]);
  let ys     = list(&rt, machine, &[2]);
  let pair   = agent(&rt, machine, kind_table::tuple(2), &[xs, ys]);
  let merger = agent(&rt, machine, MERGER, &[Value::Name(r)]);
  machine.push(&rt, merger, pair);
  machine.reduce(&rt).unwrap();

  assert_eq!(machine.interactions, 5);
  assert_eq!(print_name(&rt, r), "[1,2]");
}

#[test]
fn test_weak_head_normal_form_defers_unrelated_equations() {
  let (mut rt, mut machines) = runtime(1);
  let machine = &mut machines[0];
  let r       = global(&mut rt, machine, "r");
  machine.whnf = true;

  let eraser = agent(&rt, machine, ERASER, &[]);
  machine.push(&rt, eraser, Value::Int(1));
  machine.push(&rt, Value::Name(r), Value::Int(2));
  machine.reduce(&rt).unwrap();

  assert_eq!(rt.name(r).port(), Some(Value::Int(2)));
  assert_eq!(machine.deferred.len(), 1);

  machine.whnf = false;
  machine.requeue_deferred(&rt);
  machine.reduce(&rt).unwrap();
  assert!(machine.deferred.is_empty());
  assert_eq!(rt.usage().agents, 0);
}

#[test]
fn test_printing() {
  let (mut rt, mut machines) = runtime(1);
  let succ = rt.kinds.intern("Succ");
  let zero = rt.kinds.intern("Z");
  let leaf = rt.kinds.intern("leaf");
  rt.kinds.set_arity(succ, 1);
  rt.kinds.set_arity(zero, 0);
  rt.kinds.set_arity(leaf, 0);

  let machine = &mut machines[0];
  let z       = agent(&rt, machine, zero, &[]);
  let one     = agent(&rt, machine, succ, &[z]);
  assert_eq!(print_term(&rt, one), "Succ(Z)");

  let lower = agent(&rt, machine, leaf, &[]);
  assert_eq!(print_term(&rt, lower), "leaf()");

  let x     = machine.new_name(&rt).unwrap();
  let y     = machine.new_name(&rt).unwrap();
  let tuple = agent(&rt, machine, kind_table::tuple(3), &[x, Value::Int(-1), y]);
  assert_eq!(print_term(&rt, tuple), "(<a1>,-1,<b1>)");

  let open = agent(&rt, machine, CONS, &[Value::Int(1), x]);
  assert_eq!(print_term(&rt, open), "[1,<a1>...]");

  let dotted = agent(&rt, machine, CONS, &[Value::Int(1), Value::Int(2)]);
  assert_eq!(print_term(&rt, dotted), "[1:2]");

  let long = list(&rt, machine, &(0..40).collect::<Vec<_>>());
  assert!(print_term(&rt, long).ends_with("30,...]"));
}

#[test]
fn test_free_term_and_references() {
  let (mut rt, mut machines) = runtime(1);
  let pair_kind = rt.kinds.intern("Pair");
  rt.kinds.set_arity(pair_kind, 2);

  let r = global(&mut rt, &mut machines[0], "r");
  let x = global(&mut rt, &mut machines[0], "x");
  let machine = &mut machines[0];

  let items = list(&rt, machine, &[1, 2]);
  let term  = agent(&rt, machine, pair_kind, &[Value::Name(x), items]);
  rt.name(r).set_port(Some(term));

  let (count, referrer) = references_to(&rt, x);
  assert_eq!(count, 1);
  assert_eq!(referrer, rt.names.lookup("r"));
  assert_eq!(references_to(&rt, r), (0, None));

  free_term(&rt, Some(r), term);
  rt.free_name(r);

  // `x` occurred once, inside the freed term.
  assert_eq!(rt.usage(), HeapUsage::default());
  assert_eq!(rt.names.live().count(), 0);
}

#[test]
fn test_concurrent_binding_has_one_winner() {
  const ROUNDS: u64 = 500;
  let (rt, mut machines) = runtime(2);
  let start = Barrier::new(2);

  for _ in 0..ROUNDS {
    let name = machines[0].new_name(&rt).unwrap();
    let terms: Vec<Value> = machines.iter_mut().map(|machine| agent(&rt, machine, ERASER, &[])).collect();

    // Both workers connect an eraser to the same name at once. The loser meets the winner's eraser.
    thread::scope(|scope| {
      for (machine, term) in machines.iter_mut().zip(terms) {
        let (rt, start) = (&rt, &start);
        scope.spawn(move || {
          start.wait();
          machine.eval_equation(rt, term, name).unwrap();
        });
      }
    });
  }

  let interactions: u64 = machines.iter().map(|machine| machine.interactions).sum();
  assert_eq!(interactions, ROUNDS);
  assert!(machines.iter().all(|machine| machine.worklist.is_empty()));
  assert_eq!(rt.usage(), HeapUsage::default());
  assert_eq!(rt.counted_usage(), HeapUsage::default());
}

#[test]
fn test_parallel_append_matches_single_worker() {
  let (mut rt, mut machines) = runtime(3);
  let r = global(&mut rt, &mut machines[0], "r");
  let s = global(&mut rt, &mut machines[0], "s");

  let items: Vec<i64> = (0..200).collect();
  for name in [r, s] {
    let back  = list(&rt, &mut machines[0], &[-1]);
    let front = list(&rt, &mut machines[0], &items);
    let app   = agent(&rt, &mut machines[0], APPEND, &[Value::Name(name), back]);
    machines[0].push(&rt, app, front);
  }

  run_workers(&rt, &mut machines).unwrap();

  let interactions: u64 = machines.iter().map(|machine| machine.interactions).sum();
  assert_eq!(interactions, 2 * 201);
  assert_eq!(print_name(&rt, r), print_name(&rt, s));
  assert!(print_name(&rt, r).starts_with("[0,1,2,"));
}
