use std::time::Duration;

use crate::{
  abstractions::IString,
  api::{
    ast::*,
    engine::{Engine, EngineError, NetReport},
    value::Value,
  },
  config::{Config, HeapMode},
  core::{
    compiler::CompileErrorKind,
    heap::{CellKind, HeapError, HeapUsage},
    machine::RuntimeError,
  },
};

fn engine() -> Engine {
  Engine::new(Config::default()).unwrap()
}

fn threaded_engine(threads: usize) -> Engine {
  Engine::new(Config { threads, ..Config::default() }).unwrap()
}

/// Peano addition:
///
/// ```text
/// Plus(r, y) >< Z    => r ~ y;
/// Plus(r, y) >< S(x) => r ~ S(w), Plus(w, y) ~ x;
/// ```
fn define_plus(engine: &mut Engine) {
  engine
      .define_rule(&rule(
        agent("Plus", vec![name("r"), name("y")]),
        agent("Z", vec![]),
        body(vec![], vec![eq(name("r"), name("y"))]),
      ))
      .unwrap();
  engine
      .define_rule(&rule(
        agent("Plus", vec![name("r"), name("y")]),
        agent("S", vec![name("x")]),
        body(
          vec![],
          vec![
            eq(name("r"), agent("S", vec![name("w")])),
            eq(agent("Plus", vec![name("w"), name("y")]), name("x")),
          ],
        ),
      ))
      .unwrap();
}

fn peano(n: usize) -> Term {
  (0..n).fold(agent("Z", vec![]), |inner, _| agent("S", vec![inner]))
}

/// `Sum(r, int acc) >< (int n) | n == 0 => r ~ acc | _ => Sum(r, acc + n) ~ n - 1;`
fn define_sum(engine: &mut Engine) {
  engine
      .define_rule(&rule(
        agent("Sum", vec![name("r"), int_var("acc")]),
        int_var("n"),
        guarded(
          binary(BinaryOp::Eq, name("n"), int(0)),
          body(vec![], vec![eq(name("r"), name("acc"))]),
          body(
            vec![],
            vec![eq(agent("Sum", vec![name("r"), add(name("acc"), name("n"))]), sub(name("n"), int(1)))],
          ),
        ),
      ))
      .unwrap();
}

#[test]
fn test_addition_agent() {
  let mut engine = engine();

  // Add(r, 4) ~ 3;
  let report = engine.execute_net(&net(vec![eq(agent("Add", vec![name("r"), int(4)]), int(3))])).unwrap();

  assert_eq!(report.interactions, 2);
  assert_eq!(engine.value_of("r"), Some(Value::Int(7)));
  assert_eq!(engine.usage(), HeapUsage { agents: 0, names: 1 });
}

#[test]
fn test_eraser_meets_cons() {
  let mut engine = engine();

  let before = engine.usage();
  let report = engine.execute_net(&net(vec![eq(agent("Eraser", vec![]), cons(name("h"), name("t")))])).unwrap();

  assert_eq!(before + HeapUsage { agents: 2, names: 2 }, engine.counted_usage());
  assert_eq!(report.interactions, 1);
  assert_eq!(engine.print_name("h").unwrap(), "Eraser");
  assert_eq!(engine.print_name("t").unwrap(), "Eraser");
  assert_eq!(engine.usage(), engine.counted_usage());
}

#[test]
fn test_user_rules_reduce_to_normal_form() {
  let mut engine = engine();
  define_plus(&mut engine);

  // Plus(r, S(Z)) ~ S(S(Z));
  let report = engine.execute_net(&net(vec![eq(agent("Plus", vec![name("r"), peano(1)]), peano(2))])).unwrap();

  assert_eq!(report.interactions, 3);
  assert_eq!(engine.print_name("r").unwrap(), "S(S(S(Z)))");
}

#[test]
fn test_reduction_is_deterministic() {
  let run = || {
    let mut engine = engine();
    define_plus(&mut engine);
    let report = engine.execute_net(&net(vec![eq(agent("Plus", vec![name("r"), peano(7)]), peano(5))])).unwrap();
    (report.interactions, engine.print_name("r").unwrap(), engine.usage())
  };

  let first = run();
  assert_eq!(first.0, 6);
  assert_eq!(first, run());
}

#[test]
fn test_tail_calls_do_not_change_the_result() {
  let mut results = Vec::new();

  for tco in [false, true] {
    let mut engine = Engine::new(Config { tco, ..Config::default() }).unwrap();
    define_sum(&mut engine);
    let report = engine.execute_net(&net(vec![eq(agent("Sum", vec![name("r"), int(0)]), int(100))])).unwrap();
    results.push((report.interactions, engine.value_of("r"), engine.usage()));
  }

  assert_eq!(results[0], (101, Some(Value::Int(5050)), HeapUsage { agents: 0, names: 1 }));
  assert_eq!(results[0], results[1]);
}

#[test]
fn test_map_applies_function_reference() {
  let mut engine = engine();
  // inc(r) >< (int x) => r ~ x + 1;
  engine
      .define_rule(&rule(
        agent("inc", vec![name("r")]),
        int_var("x"),
        body(vec![], vec![eq(name("r"), add(name("x"), int(1)))]),
      ))
      .unwrap();

  // Map(r, %inc) ~ [1,2,3];
  let items = list(vec![int(1), int(2), int(3)]);
  engine.execute_net(&net(vec![eq(agent("Map", vec![name("r"), percent("inc")]), items)])).unwrap();
  assert_eq!(engine.print_name("r").unwrap(), "[2,3,4]");

  engine.free_name("r").unwrap();
  assert_eq!(engine.usage(), HeapUsage::default());
}

#[test]
fn test_integer_pair_is_recovered_from() {
  let mut engine = engine();

  match engine.execute_net(&net(vec![eq(int(3), int(4))])) {
    Err(EngineError::Runtime(RuntimeError::IntegerPair { .. })) => {}
    other => panic!("expected a stuck integer pair, got {:?}", other.map(|report| report.interactions)),
  }
  assert_eq!(engine.usage(), HeapUsage::default());

  // The engine is still usable.
  engine.execute_net(&net(vec![eq(agent("Add", vec![name("r"), int(4)]), int(3))])).unwrap();
  assert_eq!(engine.value_of("r"), Some(Value::Int(7)));
}

#[test]
fn test_recovery_drops_unreduced_equations() {
  let mut engine = engine();
  define_plus(&mut engine);

  let error = engine
      .execute_net(&net(vec![
        eq(agent("Plus", vec![name("r"), peano(3)]), peano(3)),
        eq(int(3), int(4)),
      ]))
      .unwrap_err();
  assert!(matches!(error, EngineError::Runtime(RuntimeError::IntegerPair { .. })));

  // Only the unconnected name `r` is left.
  assert_eq!(engine.print_name("r").unwrap(), "<EMPTY>");
  assert_eq!(engine.usage(), HeapUsage { agents: 0, names: 1 });
  assert_eq!(engine.usage(), engine.counted_usage());
}

#[test]
fn test_missing_rule_keeps_global_terms() {
  let mut engine = engine();
  engine.execute_net(&net(vec![eq(name("r"), list(vec![int(1), int(2)]))])).unwrap();

  let error = engine.execute_net(&net(vec![eq(agent("Foo", vec![]), agent("Bar", vec![]))])).unwrap_err();
  assert!(matches!(error, EngineError::Runtime(RuntimeError::NoRule { .. })));

  assert_eq!(engine.print_name("r").unwrap(), "[1,2]");
  assert_eq!(engine.usage(), HeapUsage { agents: 3, names: 1 });
}

#[test]
fn test_fatal_error_without_recovery() {
  let mut engine = Engine::new(Config { retrieve_on_error: false, ..Config::default() }).unwrap();

  let error = engine.execute_net(&net(vec![eq(int(1), int(2))])).unwrap_err();
  assert!(matches!(error, EngineError::Fatal(RuntimeError::IntegerPair { .. })));
  assert!(matches!(engine.execute_net(&net(vec![])), Err(EngineError::Poisoned)));

  engine.reset().unwrap();
  engine.execute_net(&net(vec![eq(name("r"), int(5))])).unwrap();
  assert_eq!(engine.value_of("r"), Some(Value::Int(5)));
}

#[test]
fn test_fixed_heap_exhaustion_is_fatal() {
  let config     = Config { heap_mode: HeapMode::Fixed { capacity: 4 }, ..Config::default() };
  let mut engine = Engine::new(config).unwrap();

  let items = list((0..10).map(int).collect());
  match engine.execute_net(&net(vec![eq(name("r"), items)])) {
    Err(EngineError::Fatal(RuntimeError::Heap(HeapError::Exhausted { kind: CellKind::Agent, .. }))) => {}
    other => panic!("expected exhaustion, got {:?}", other.map(|report| report.interactions)),
  }
}

#[test]
fn test_compile_errors_are_reported() {
  let mut engine = engine();

  // Foo(x) >< Bar => ;
  let unused = rule(agent("Foo", vec![name("x")]), agent("Bar", vec![]), body(vec![], vec![]));
  match engine.define_rule(&unused) {
    Err(EngineError::Compile(error)) => assert_eq!(error.kind, CompileErrorKind::MetaNotOnce(IString::from("x"))),
    other => panic!("expected a compile error, got {:?}", other),
  }

  // x ~ A(x, x);
  let thrice = net(vec![eq(name("x"), agent("A", vec![name("x"), name("x")]))]);
  match engine.execute_net(&thrice) {
    Err(EngineError::Compile(error)) => {
      assert_eq!(error.kind, CompileErrorKind::NameMoreThanTwice(IString::from("x")))
    }
    other => panic!("expected a compile error, got {:?}", other.map(|report| report.interactions)),
  }
}

#[test]
fn test_long_literal_list_exceeds_the_registers() {
  let mut engine = engine();

  let items = (0..50).map(int).collect();
  match engine.execute_net(&net(vec![eq(name("r"), list(items))])) {
    Err(EngineError::Compile(error)) => assert_eq!(error.kind, CompileErrorKind::RegistersExhausted),
    other => panic!("expected a compile error, got {:?}", other.map(|report| report.interactions)),
  }
  assert_eq!(engine.usage(), HeapUsage::default());

  let items = (0..10).map(int).collect();
  engine.execute_net(&net(vec![eq(name("r"), list(items))])).unwrap();
  assert_eq!(engine.print_name("r").unwrap(), "[0,1,2,3,4,5,6,7,8,9]");
}

#[test]
fn test_free_name_refuses_referenced_names() {
  let mut engine = engine();

  // r ~ Pair(x, [1,2]);
  let pair = agent("Pair", vec![name("x"), list(vec![int(1), int(2)])]);
  engine.execute_net(&net(vec![eq(name("r"), pair)])).unwrap();
  assert_eq!(engine.print_name("r").unwrap(), "Pair(x,[1,2])");
  assert_eq!(engine.print_name("x").unwrap(), "<EMPTY>");

  match engine.free_name("x") {
    Err(EngineError::NameInUse { name, referrer }) => assert_eq!((name.as_str(), referrer.as_str()), ("x", "r")),
    other => panic!("expected the name to be in use, got {:?}", other),
  }

  engine.free_name("r").unwrap();
  assert_eq!(engine.usage(), HeapUsage::default());
  assert!(matches!(engine.print_name("x"), Err(EngineError::UnknownName(_))));
  assert!(matches!(engine.free_name("nope"), Err(EngineError::UnknownName(_))));
}

#[test]
fn test_later_net_connects_to_existing_global() {
  let mut engine = engine();
  engine.execute_net(&net(vec![eq(name("r"), list(vec![int(1), int(2)]))])).unwrap();

  // Append(s, [3]) ~ r;
  let append = agent("Append", vec![name("s"), list(vec![int(3)])]);
  engine.execute_net(&net(vec![eq(append, name("r"))])).unwrap();

  assert_eq!(engine.print_name("s").unwrap(), "[1,2,3]");
  assert!(matches!(engine.print_name("r"), Err(EngineError::UnknownName(_))));
}

#[test]
fn test_removed_rule_no_longer_applies() {
  let mut engine = engine();
  define_plus(&mut engine);

  assert!(engine.remove_rule("Plus", "Z"));
  assert!(!engine.remove_rule("Plus", "Z"));
  assert!(!engine.remove_rule("Plus", "Unknown"));

  let error = engine.execute_net(&net(vec![eq(agent("Plus", vec![name("r"), peano(0)]), peano(0))])).unwrap_err();
  assert!(matches!(error, EngineError::Runtime(RuntimeError::NoRule { .. })));
}

#[test]
fn test_threaded_append() {
  let mut engine = threaded_engine(2);

  let items  = list((0..50).map(int).collect());
  let append = agent("Append", vec![name("r"), list(vec![int(-1)])]);
  let report = engine.execute_net(&net(vec![eq(append, items)])).unwrap();

  assert_eq!(report.interactions, 51);
  assert_eq!(report.workers, 2);
  assert!(engine.print_name("r").unwrap().starts_with("[0,1,2,"));
}

#[test]
fn test_threaded_rules_match_single_worker() {
  let mut single = engine();
  let mut multi  = threaded_engine(4);

  let mut results = Vec::new();
  for engine in [&mut single, &mut multi] {
    define_plus(engine);
    let equations = (0..8)
        .map(|i| eq(agent("Plus", vec![name(&format!("r{}", i)), peano(i)]), peano(3)))
        .collect();
    let report = engine.execute_net(&net(equations)).unwrap();
    let normal = (0..8).map(|i| engine.print_name(&format!("r{}", i)).unwrap()).collect::<Vec<_>>();
    results.push((report.interactions, normal));
  }

  assert_eq!(results[0], results[1]);
}

#[test]
fn test_threaded_runtime_error_poisons_the_engine() {
  let mut engine = threaded_engine(2);

  let error = engine.execute_net(&net(vec![eq(int(3), int(4))])).unwrap_err();
  assert!(matches!(error, EngineError::Fatal(RuntimeError::IntegerPair { .. })));
  assert!(matches!(engine.define_rule(&rule(
    agent("A", vec![]),
    agent("B", vec![]),
    body(vec![], vec![]),
  )), Err(EngineError::Poisoned)));

  engine.reset().unwrap();
  assert!(engine.execute_net(&net(vec![eq(name("r"), int(1))])).is_ok());
}

#[test]
fn test_thread_count_is_clamped() {
  let engine = threaded_engine(0);
  assert_eq!(engine.config().threads, 1);
}

#[test]
fn test_report_format() {
  let report = NetReport { interactions: 10, workers: 1, elapsed: Duration::from_millis(1500) };
  assert_eq!(report.to_string(), "(10 interactions, 1.50 sec)");

  let report = NetReport { workers: 4, ..report };
  assert_eq!(report.to_string(), "(10 interactions by 4 threads, 1.50 sec)");
}
