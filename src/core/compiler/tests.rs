use std::collections::HashMap;

use crate::{
  abstractions::IString,
  api::ast::*,
  config::OptimiseFlags,
  core::{
    bytecode::{Opcode, Word, RULE_HEADER},
    compiler::{CompileErrorKind, Compiler, CompilerOptions, GlobalInfo},
    kind_table::{KindTable, CONS, INT},
    name_table::NameTable,
  },
};

fn options(tco: bool, threaded: bool) -> CompilerOptions {
  CompilerOptions {
    tco,
    optimise  : OptimiseFlags::all(),
    print_code: false,
    threaded,
  }
}

/// The opcodes of `words` from `start`, skipping operands.
fn opcodes(words: &[Word], start: usize) -> Vec<Opcode> {
  let mut out = Vec::new();
  let mut pc  = start;
  while pc < words.len() {
    let opcode = Opcode::decode(words[pc]).expect("valid opcode");
    out.push(opcode);
    pc += 1 + opcode.operand_count();
  }
  out
}

fn append_rule() -> Rule {
  // App(r, a) >< x:xs => r ~ x:w, App(w, a) ~ xs;
  rule(
    agent("App", vec![name("r"), name("a")]),
    cons(name("x"), name("xs")),
    body(
      vec![],
      vec![
        eq(name("r"), cons(name("x"), name("w"))),
        eq(agent("App", vec![name("w"), name("a")]), name("xs")),
      ],
    ),
  )
}

#[test]
fn test_increment_rule_code() {
  let mut kinds    = KindTable::new();
  let mut names    = NameTable::new();
  let mut compiler = Compiler::new(&mut kinds, &mut names, options(false, false));

  // Inc(r) >< (int x) => r ~ x + 1;
  let inc = rule(
    agent("Inc", vec![name("r")]),
    int_var("x"),
    body(vec![], vec![eq(name("r"), add(name("x"), int(1)))]),
  );
  let compiled = compiler.compile_rule(&inc).unwrap();

  assert_eq!(compiled.len(), 1);
  assert_eq!(compiled[0].left, compiler.kinds.lookup("Inc").unwrap());
  assert_eq!(compiled[0].right, INT);
  assert_eq!(
    &compiled[0].code[..],
    &[
      1, 0,
      Opcode::Inc.word(), 12, 13,
      Opcode::Push.word(), 1, 13,
      Opcode::RetFreeL.word(),
    ]
  );
}

#[test]
fn test_both_orientations_are_compiled() {
  let mut kinds    = KindTable::new();
  let mut names    = NameTable::new();
  let mut compiler = Compiler::new(&mut kinds, &mut names, options(false, false));

  let compiled = compiler.compile_rule(&append_rule()).unwrap();
  let app      = compiler.kinds.lookup("App").unwrap();

  assert_eq!(compiled.len(), 2);
  assert_eq!((compiled[0].left, compiled[0].right), (app, CONS));
  assert_eq!((compiled[1].left, compiled[1].right), (CONS, app));
  assert_eq!(&compiled[0].code[..RULE_HEADER], &[2, 2]);
  assert_eq!(&compiled[1].code[..RULE_HEADER], &[2, 2]);
  assert_eq!(*compiled[0].code.last().unwrap(), Opcode::RetFreeLR.word());
}

#[test]
fn test_same_kind_rule_has_one_block() {
  let mut kinds    = KindTable::new();
  let mut names    = NameTable::new();
  let mut compiler = Compiler::new(&mut kinds, &mut names, options(false, false));

  // D(a, b) >< D(c, d) => a ~ c, b ~ d;
  let dup = rule(
    agent("D", vec![name("a"), name("b")]),
    agent("D", vec![name("c"), name("d")]),
    body(vec![], vec![eq(name("a"), name("c")), eq(name("b"), name("d"))]),
  );
  assert_eq!(compiler.compile_rule(&dup).unwrap().len(), 1);
}

#[test]
fn test_unused_metavariable_is_rejected() {
  let mut kinds    = KindTable::new();
  let mut names    = NameTable::new();
  let mut compiler = Compiler::new(&mut kinds, &mut names, options(false, false));

  let bad   = rule(agent("A", vec![name("x")]), agent("B", vec![]), body(vec![], vec![]));
  let error = compiler.compile_rule(&bad).unwrap_err();

  assert_eq!(error.kind, CompileErrorKind::MetaNotOnce(IString::from("x")));
  assert_eq!(error.rule, Some(("A".to_string(), "B".to_string())));
}

#[test]
fn test_dangling_local_name_is_rejected() {
  let mut kinds    = KindTable::new();
  let mut names    = NameTable::new();
  let mut compiler = Compiler::new(&mut kinds, &mut names, options(false, false));

  let bad = rule(
    agent("A", vec![name("r")]),
    agent("B", vec![]),
    body(vec![], vec![eq(name("r"), name("w"))]),
  );
  let error = compiler.compile_rule(&bad).unwrap_err();
  assert_eq!(error.kind, CompileErrorKind::NameNotTwice(IString::from("w")));
}

#[test]
fn test_metavariable_used_twice_is_rejected() {
  let mut kinds    = KindTable::new();
  let mut names    = NameTable::new();
  let mut compiler = Compiler::new(&mut kinds, &mut names, options(false, false));

  // A(r, x) >< B => r ~ C(x, x);
  let bad = rule(
    agent("A", vec![name("r"), name("x")]),
    agent("B", vec![]),
    body(vec![], vec![eq(name("r"), agent("C", vec![name("x"), name("x")]))]),
  );
  let error = compiler.compile_rule(&bad).unwrap_err();
  assert_eq!(error.kind, CompileErrorKind::MetaNotOnce(IString::from("x")));
}

#[test]
fn test_local_name_used_three_times_is_rejected() {
  let mut kinds    = KindTable::new();
  let mut names    = NameTable::new();
  let mut compiler = Compiler::new(&mut kinds, &mut names, options(false, false));

  // A(r) >< B => r ~ C(w, w, w);
  let bad = rule(
    agent("A", vec![name("r")]),
    agent("B", vec![]),
    body(vec![], vec![eq(name("r"), agent("C", vec![name("w"), name("w"), name("w")]))]),
  );
  let error = compiler.compile_rule(&bad).unwrap_err();
  assert_eq!(error.kind, CompileErrorKind::NameNotTwice(IString::from("w")));
}

#[test]
fn test_agent_argument_in_rule_pattern_is_rejected() {
  let mut kinds    = KindTable::new();
  let mut names    = NameTable::new();
  let mut compiler = Compiler::new(&mut kinds, &mut names, options(false, false));

  let bad = rule(
    agent("A", vec![agent("Z", vec![])]),
    agent("B", vec![]),
    body(vec![], vec![]),
  );
  let error = compiler.compile_rule(&bad).unwrap_err();
  assert!(matches!(error.kind, CompileErrorKind::NotAName { side: Side::Left, .. }));
}

#[test]
fn test_guarded_loop_on_integer() {
  let mut kinds    = KindTable::new();
  let mut names    = NameTable::new();
  let mut compiler = Compiler::new(&mut kinds, &mut names, options(true, false));

  // Count(r) >< (int n) | n == 0 => r ~ 0 | _ => Count(r) ~ n - 1;
  let count = rule(
    agent("Count", vec![name("r")]),
    int_var("n"),
    guarded(
      binary(BinaryOp::Eq, name("n"), int(0)),
      body(vec![], vec![eq(name("r"), int(0))]),
      body(vec![], vec![eq(agent("Count", vec![name("r")]), sub(name("n"), int(1)))]),
    ),
  );
  let compiled = compiler.compile_rule(&count).unwrap();

  assert_eq!(
    &compiled[0].code[..],
    &[
      1, 0,
      Opcode::EqIR0.word(), 12, 0,
      Opcode::JmpEq0R0.word(), 4,
      Opcode::PushI.word(), 1, 0,
      Opcode::RetFreeL.word(),
      Opcode::Dec.word(), 12, 13,
      Opcode::Load.word(), 13, 12,
      Opcode::Loop.word(),
    ]
  );
}

#[test]
fn test_loop_over_connected_list() {
  let mut kinds    = KindTable::new();
  let mut names    = NameTable::new();
  let mut compiler = Compiler::new(&mut kinds, &mut names, options(true, false));

  let compiled = compiler.compile_rule(&append_rule()).unwrap();
  let words    = &compiled[0].code;

  assert_eq!(
    opcodes(words, RULE_HEADER),
    vec![
      Opcode::MkName,
      Opcode::MkAgent,
      Opcode::LoadP,
      Opcode::LoadP,
      Opcode::Push,
      Opcode::JmpCnctCons,
      Opcode::MkAgent,
      Opcode::LoadP,
      Opcode::LoadP,
      Opcode::Push,
      Opcode::RetFreeLR,
      Opcode::Load,
      Opcode::LoopRrec2FreeR,
    ]
  );

  // The connection test jumps over the push alternative onto the loop alternative.
  let test   = words.iter().position(|word| *word == Opcode::JmpCnctCons.word()).unwrap();
  let target = test + 3 + words[test + 2] as usize;
  assert_eq!(words[target], Opcode::Load.word());

  // The reversed orientation never loops.
  assert!(!opcodes(&compiled[1].code, RULE_HEADER).contains(&Opcode::LoopRrec2FreeR));
}

#[test]
fn test_without_tail_calls_no_loop() {
  let mut kinds    = KindTable::new();
  let mut names    = NameTable::new();
  let mut compiler = Compiler::new(&mut kinds, &mut names, options(false, false));

  let compiled = compiler.compile_rule(&append_rule()).unwrap();
  let ops      = opcodes(&compiled[0].code, RULE_HEADER);
  assert!(!ops.contains(&Opcode::JmpCnctCons));
  assert_eq!(ops.iter().filter(|op| **op == Opcode::Push).count(), 2);
}

#[test]
fn test_net_makes_global_names() {
  let mut kinds    = KindTable::new();
  let mut names    = NameTable::new();
  let mut compiler = Compiler::new(&mut kinds, &mut names, options(false, false));

  // r ~ A(x), x ~ B;
  let n = net(vec![
    eq(name("r"), agent("A", vec![name("x")])),
    eq(name("x"), agent("B", vec![])),
  ]);
  let words = compiler.compile_net(&n, &HashMap::new()).unwrap();

  assert_eq!(
    opcodes(&words, 0),
    vec![
      Opcode::MkGName,
      Opcode::MkName,
      Opcode::MkAgent,
      Opcode::LoadP,
      Opcode::MyPush,
      Opcode::MkAgent,
      Opcode::MyPush,
      Opcode::Ret,
    ]
  );
  let r = compiler.names.lookup("r").unwrap();
  assert_eq!(words[1], r as Word);
  assert_eq!(compiler.names.lookup("x"), None);
}

#[test]
fn test_threaded_net_drops_name_equations() {
  let mut kinds    = KindTable::new();
  let mut names    = NameTable::new();
  let mut compiler = Compiler::new(&mut kinds, &mut names, options(false, true));

  let n = net(vec![
    eq(name("r"), agent("A", vec![name("x")])),
    eq(name("x"), agent("B", vec![])),
  ]);
  let words = compiler.compile_net(&n, &HashMap::new()).unwrap();

  assert_eq!(
    opcodes(&words, 0),
    vec![Opcode::MkGName, Opcode::MkAgent, Opcode::MkAgent, Opcode::LoadP, Opcode::Push, Opcode::Ret]
  );
}

#[test]
fn test_net_name_occurring_thrice_is_rejected() {
  let mut kinds    = KindTable::new();
  let mut names    = NameTable::new();
  let mut compiler = Compiler::new(&mut kinds, &mut names, options(false, false));

  let n     = net(vec![eq(name("x"), agent("A", vec![name("x"), name("x")]))]);
  let error = compiler.compile_net(&n, &HashMap::new()).unwrap_err();
  assert_eq!(error.kind, CompileErrorKind::NameMoreThanTwice(IString::from("x")));
}

#[test]
fn test_net_joins_existing_globals() {
  let mut kinds    = KindTable::new();
  let mut names    = NameTable::new();
  let mut compiler = Compiler::new(&mut kinds, &mut names, options(false, false));

  let mut globals = HashMap::new();
  globals.insert(IString::from("r"), GlobalInfo { bound: true, occurrences: 0 });
  globals.insert(IString::from("s"), GlobalInfo { bound: false, occurrences: 1 });
  globals.insert(IString::from("t"), GlobalInfo { bound: false, occurrences: 2 });

  let words = compiler.compile_net(&net(vec![eq(name("r"), agent("Eraser", vec![]))]), &globals).unwrap();
  assert!(opcodes(&words, 0).contains(&Opcode::CnctGN));

  let words = compiler.compile_net(&net(vec![eq(int(1), name("s"))]), &globals).unwrap();
  assert!(opcodes(&words, 0).contains(&Opcode::SubstGN));

  let error = compiler.compile_net(&net(vec![eq(name("t"), nil())]), &globals).unwrap_err();
  assert_eq!(error.kind, CompileErrorKind::GlobalOccursTwice(IString::from("t")));
}

#[test]
fn test_annotation_in_net_is_rejected() {
  let mut kinds    = KindTable::new();
  let mut names    = NameTable::new();
  let mut compiler = Compiler::new(&mut kinds, &mut names, options(false, false));

  let n     = net(vec![eq(name("r"), annotate(Side::Left, nil()))]);
  let error = compiler.compile_net(&n, &HashMap::new()).unwrap_err();
  assert_eq!(error.kind, CompileErrorKind::AnnotationInNet(Side::Left));
}
