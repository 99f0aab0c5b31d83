/*!

Compilation of rules.

A rule `L >< R => body` is compiled once for each orientation the interpreter can meet it in. The forward block
serves the pair with `L` in the machine's left slot. When both sides are real agents of different kinds a second,
reversed block is compiled for `(R, L)`, with the metavariables and annotations of each side mapped to the other
slot. A side that is an `int x` pattern or a bare name matches anything and is only ever found in the right slot.

The last equation of a body may become a loop when tail-call transformation is enabled:

  * `A(args) ~ expr` in a rule `A(...) >< (int n)` stores `expr` as the new integer and jumps back to the start;
  * `A(args) ~ y`, where `y` is a port of the right agent, tests whether `y` is connected to another agent of the
    right kind. If so the block loops with that agent in the right slot; otherwise it builds `A(args)` and
    pushes it.

*/

use crate::{
  api::ast::{Body, Equation, Rule, RuleBody, Side, Term},
  core::{
    bytecode::{metavar_l, metavar_r, Word, ANNOTATE_R},
    compiler::{
      compile_error::{CompileError, CompileErrorKind},
      context::BindingKind,
      imcode::{Ir, Var},
      rewrite::eliminate_name_equations,
      term::{agent_args, names_in},
      CompiledRule,
      Compiler,
    },
    kind_table::{self, KindId, CONS, INT, MAX_TUPLE, NIL, WILDCARD},
  },
  config::OptimiseFlag,
  MAX_PORT,
};

fn is_pattern_variable(kind: KindId) -> bool {
  kind == INT || kind == WILDCARD
}

/// Whether `term` can be stored as an integer in the right slot of a looping rule.
fn is_tail_expression(term: &Term, kind: Option<BindingKind>) -> bool {
  use crate::api::ast::{BinaryOp, UnaryOp};
  match term {
    Term::Int(_) => true,
    Term::Binary(BinaryOp::And | BinaryOp::Or, ..) => false,
    Term::Binary(..) => true,
    Term::Unary(UnaryOp::Not, _) => false,
    Term::Unary(..) => true,
    Term::Name(_) => kind == Some(BindingKind::IntVar),
    _ => false,
  }
}

impl Compiler<'_> {
  /// Compiles `rule` into one or two blocks, one per orientation of the pair.
  pub fn compile_rule(&mut self, rule: &Rule) -> Result<Vec<CompiledRule>, CompileError> {
    let left  = rule.left.clone().strip_unary_tuples();
    let right = rule.right.clone().strip_unary_tuples();

    let id_l = self.rule_agent_kind(&left)?;
    let id_r = self.rule_agent_kind(&right)?;
    let names = (self.kinds.name(id_l).to_string(), self.kinds.name(id_r).to_string());

    let result = self.compile_rule_directions(rule, &left, &right, id_l, id_r);
    result.map_err(|error| {
      let error = error.in_rule(&names.0, &names.1);
      crate::error!(0, "{}", error);
      error
    })
  }

  fn compile_rule_directions(
    &mut self,
    rule : &Rule,
    left : &Term,
    right: &Term,
    id_l : KindId,
    id_r : KindId,
  ) -> Result<Vec<CompiledRule>, CompileError>
  {
    for (term, kind) in [(left, id_l), (right, id_r)] {
      let arity = agent_args(term).len();
      if arity > MAX_PORT {
        return Err(CompileErrorKind::TooManyArguments(self.kinds.name(kind).into()).into());
      }
      self.kinds.set_arity(kind, arity);
    }

    let mut compiled = Vec::with_capacity(2);
    let forward  = !is_pattern_variable(id_l);
    let reversed = !is_pattern_variable(id_r) && (!forward || id_l != id_r);

    if !forward && !reversed {
      return Err(CompileErrorKind::InvalidRuleAgent(left.to_string()).into());
    }
    if forward {
      compiled.push(self.compile_direction(rule, left, right, id_l, id_r, false)?);
    }
    if reversed {
      compiled.push(self.compile_direction(rule, left, right, id_l, id_r, true)?);
    }

    Ok(compiled)
  }

  /// The kind a rule side matches.
  fn rule_agent_kind(&mut self, term: &Term) -> Result<KindId, CompileError> {
    match term {
      Term::IntVar(_) => Ok(INT),
      Term::Name(_) => Ok(WILDCARD),
      Term::Agent { name, .. } => Ok(self.kinds.intern(name)),
      Term::Tuple(items) if items.len() <= MAX_TUPLE => Ok(kind_table::tuple(items.len())),
      Term::Tuple(items) => Err(CompileErrorKind::TupleTooLarge(items.len()).into()),
      Term::Nil => Ok(NIL),
      Term::Cons(..) => Ok(CONS),
      other => Err(CompileErrorKind::InvalidRuleAgent(other.to_string()).into()),
    }
  }

  fn compile_direction(
    &mut self,
    rule    : &Rule,
    left    : &Term,
    right   : &Term,
    id_l    : KindId,
    id_r    : KindId,
    reversed: bool,
  ) -> Result<CompiledRule, CompileError>
  {
    self.context.clear();
    self.context.reversed = reversed;
    // Warnings were already given for the forward block.
    self.context.warnings = !reversed || is_pattern_variable(id_l);

    let (slot_l, slot_r) = if reversed { (id_r, id_l) } else { (id_l, id_r) };
    self.context.id_l = slot_l;
    self.context.id_r = slot_r;

    let arity = |term: &Term, kind: KindId| if is_pattern_variable(kind) { 0 } else { agent_args(term).len() };
    let header = if reversed {
      [arity(right, id_r) as Word, arity(left, id_l) as Word]
    } else {
      [arity(left, id_l) as Word, arity(right, id_r) as Word]
    };

    self.bind_rule_side(left, Side::Left)?;
    self.bind_rule_side(right, Side::Right)?;

    let annotated_left = rule.body.contains_annotation(if reversed { Side::Right } else { Side::Left });
    self.compile_rule_body(&rule.body, annotated_left)?;

    let code = self.finish(&header)?;
    Ok(CompiledRule { left: slot_l, right: slot_r, code })
  }

  /// Binds the arguments of one rule side to the metavariable registers of the slot it occupies.
  fn bind_rule_side(&mut self, term: &Term, side: Side) -> Result<(), CompileError> {
    let slot = self.context.physical(side);

    match term {
      Term::IntVar(name) => {
        let register = self.context.annotation_register(side);
        self.context.bind(name.clone(), register, BindingKind::IntVar);
        self.context.keep_agent(slot);
      }

      Term::Name(name) => {
        let register = self.context.annotation_register(side);
        self.context.bind(name.clone(), register, BindingKind::Wildcard);
        self.context.keep_agent(slot);
      }

      _ => {
        let (metavar, kind): (fn(usize) -> usize, _) = match slot {
          Side::Left => (metavar_l, BindingKind::MetaL),
          Side::Right => (metavar_r, BindingKind::MetaR),
        };

        for (port, arg) in agent_args(term).into_iter().enumerate() {
          match arg {
            Term::Name(name) => self.context.bind(name.clone(), metavar(port), kind),
            Term::IntVar(name) => self.context.bind(name.clone(), metavar(port), BindingKind::IntVar),
            other => {
              return Err(CompileErrorKind::NotAName { argument: other.to_string(), side }.into());
            }
          }
        }
      }
    }

    Ok(())
  }

  fn compile_rule_body(&mut self, body: &RuleBody, annotated_left: bool) -> Result<(), CompileError> {
    match body {

      RuleBody::Plain(body) => {
        self.compile_body(body, annotated_left)?;
        self.context.check_linearity()?;
        self.context.emit_ret();
      }

      RuleBody::Guarded { condition, then, otherwise } => {
        let var             = self.compile_expression(condition)?;
        let otherwise_label = self.context.new_label();
        self.emit_guard_jump(var, otherwise_label);

        let state = self.context.save_branch_state();
        self.context.emit(Ir::BeginBlock);
        self.compile_rule_body(then, annotated_left)?;

        self.context.restore_branch_state(state);
        self.context.emit(Ir::Label(otherwise_label));
        self.context.emit(Ir::BeginBlock);
        self.compile_rule_body(otherwise, annotated_left)?;
      }

    } // end match on `body`

    Ok(())
  }

  /// Jumps to `label` when the guard in `var` is false. A comparison that computed the guard is fused with the jump.
  fn emit_guard_jump(&mut self, var: Var, label: usize) {
    if self.options.optimise.contains(OptimiseFlag::CompareFusion) {
      if let Some(Ir::Arith { op, left, right, dest }) = self.context.code.last().cloned() {
        if let (Some(op), true) = (op.as_compare(), dest == var) {
          self.context.code.pop();
          self.context.emit(Ir::CompareR0 { op, left, right });
          self.context.emit(Ir::JmpEq0R0 { label });
          return;
        }
      }
    }
    self.context.emit(Ir::JmpEq0 { var, label });
  }

  /// Statements first, then the equations, the last of which may become a loop.
  fn compile_body(&mut self, body: &Body, annotated_left: bool) -> Result<(), CompileError> {
    for statement in &body.statements {
      self.compile_statement(statement)?;
    }

    let mut equations: Vec<Equation> = body
        .equations
        .iter()
        .map(|equation| Equation {
          left : equation.left.clone().strip_unary_tuples(),
          right: equation.right.clone().strip_unary_tuples(),
        })
        .collect();
    let context = &self.context;
    eliminate_name_equations(&mut equations, |ident| {
      matches!(context.binding_kind(ident), None | Some(BindingKind::Name))
    });

    let last = equations.len().saturating_sub(1);
    for (index, equation) in equations.iter().enumerate() {
      if index == last && self.options.tco && !annotated_left && self.compile_tail_call(equation)? {
        continue;
      }
      let left  = self.compile_term(&equation.left)?;
      let right = self.compile_term(&equation.right)?;
      self.context.emit(Ir::Push { left, right });
    }

    Ok(())
  }

  // region Tail calls

  /// Compiles `equation` as a loop if it re-applies the rule's own left agent. Returns whether it did.
  fn compile_tail_call(&mut self, equation: &Equation) -> Result<bool, CompileError> {
    let Term::Agent { name, args } = &equation.left else {
      return Ok(false);
    };
    if self.kinds.lookup(name) != Some(self.context.id_l) {
      return Ok(false);
    }
    if self.kinds.arity(self.context.id_l) != Some(args.len()) {
      return Ok(false);
    }
    // Every wire the agent mentions must exist already, as both alternatives of a connection test read them.
    let mut names = Vec::new();
    names_in(&equation.left, &mut names);
    if names.iter().any(|ident| !self.context.is_bound(ident)) {
      return Ok(false);
    }

    let right_kind = match &equation.right {
      Term::Name(ident) => self.context.binding_kind(ident),
      _ => None,
    };

    match &equation.right {
      right if self.context.id_r == INT && is_tail_expression(right, right_kind) => {
        self.compile_tail_expression(args, right)?;
        Ok(true)
      }

      Term::Name(ident) if matches!(right_kind, Some(BindingKind::MetaL | BindingKind::MetaR)) => {
        self.compile_tail_connection(&equation.left, args, ident)?;
        Ok(true)
      }

      _ => Ok(false),
    }
  }

  /// Loads `alloc` into the left metavariables in order, saving any metavariable a later argument still reads.
  fn load_left_metavariables(&mut self, alloc: &mut [Var], protect: &mut Option<Var>) {
    for port in 0..alloc.len() {
      let meta = metavar_l(port);
      if alloc[port] == meta {
        continue;
      }

      let displaced = alloc[port + 1..].contains(&meta) || *protect == Some(meta);
      if displaced {
        let saved = self.context.new_var();
        self.context.emit(Ir::Load { src: meta, dest: saved });
        for later in alloc[port + 1..].iter_mut().filter(|var| **var == meta) {
          *later = saved;
        }
        if *protect == Some(meta) {
          *protect = Some(saved);
        }
      }
      self.context.emit(Ir::LoadMeta { src: alloc[port], dest: meta });
    }
  }

  /// `A(args) ~ expr` with an integer in the right slot.
  fn compile_tail_expression(&mut self, args: &[Term], right: &Term) -> Result<(), CompileError> {
    let value = self.compile_expression(right)?;
    let mut alloc = Vec::with_capacity(args.len());
    for arg in args {
      alloc.push(self.compile_term(arg)?);
    }

    if alloc.contains(&ANNOTATE_R) {
      let saved = self.context.new_var();
      self.context.emit(Ir::Load { src: ANNOTATE_R, dest: saved });
      for var in alloc.iter_mut().filter(|var| **var == ANNOTATE_R) {
        *var = saved;
      }
    }
    if value != ANNOTATE_R {
      self.context.emit(Ir::LoadMeta { src: value, dest: ANNOTATE_R });
    }

    self.load_left_metavariables(&mut alloc, &mut None);
    self.context.emit(Ir::Loop);
    self.context.tail_call_emitted = true;
    Ok(())
  }

  /// `A(args) ~ y` where `y` may be connected to the next agent of the right kind.
  fn compile_tail_connection(&mut self, agent: &Term, args: &[Term], ident: &str) -> Result<(), CompileError> {
    let target = self
        .context
        .find_var(ident)
        .ok_or_else(|| CompileErrorKind::UndeclaredPropertyVariable(ident.into()))?;
    let label = self.context.new_label();
    let kind  = self.context.id_r;

    self.context.emit(
      if kind == CONS {
        Ir::JmpCnctCons { var: target, label }
      } else {
        Ir::JmpCnct { var: target, kind, label }
      }
    );

    // Not connected: build the agent and push it.
    self.context.emit(Ir::BeginJmpcnctBlock);
    let built = self.compile_term(agent)?;
    self.context.emit(Ir::Push { left: built, right: target });
    self.context.emit_ret();
    self.context.tail_call_emitted = true;

    // Connected: reuse the left agent and loop over the next right agent.
    self.context.emit(Ir::BeginJmpcnctBlock);
    self.context.emit(Ir::Label(label));
    let mut alloc = Vec::with_capacity(args.len());
    for arg in args {
      alloc.push(self.compile_term(arg)?);
    }

    let mut next = Some(target);
    self.load_left_metavariables(&mut alloc, &mut next);
    let arity = self.kinds.arity(kind).unwrap_or(0);
    self.context.emit(Ir::LoopRrec { var: next.unwrap_or(target), arity, free_r: !self.context.keep[1] });
    Ok(())
  }

  // endregion
}
