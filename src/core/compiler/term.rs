/*!

Lowering of terms, integer expressions and `where` statements to intermediate code. Shared by rule bodies and
nets.

*/

use crate::{
  abstractions::IString,
  api::ast::{BinaryOp, Side, Statement, Term, UnaryOp},
  core::{
    bytecode::{metavar_l, metavar_r},
    compiler::{
      compile_error::{CompileError, CompileErrorKind},
      context::BindingKind,
      imcode::{ArithOp, ImmOp, Ir, UnaryIr, Var},
      Compiler,
    },
    kind_table::{self, KindId, CONS, FIRST_USER, MAX_TUPLE, NIL, PERCENT},
  },
  MAX_PORT,
};

/// The arguments of an agent-like term, with `x:xs` seen as `Cons(x, xs)`.
pub(crate) fn agent_args(term: &Term) -> Vec<&Term> {
  match term {
    Term::Agent { args, .. } | Term::Tuple(args) => args.iter().collect(),
    Term::Cons(head, tail) => vec![&**head, &**tail],
    _ => Vec::new(),
  }
}

/// The machine operation for a binary operator other than `&&` and `||`, and whether its operands are exchanged.
fn arith_op(op: BinaryOp) -> (ArithOp, bool) {
  match op {
    BinaryOp::Add => (ArithOp::Add, false),
    BinaryOp::Sub => (ArithOp::Sub, false),
    BinaryOp::Mul => (ArithOp::Mul, false),
    BinaryOp::Div => (ArithOp::Div, false),
    BinaryOp::Mod => (ArithOp::Mod, false),
    BinaryOp::Lt  => (ArithOp::Lt, false),
    BinaryOp::Le  => (ArithOp::Le, false),
    BinaryOp::Gt  => (ArithOp::Lt, true),
    BinaryOp::Ge  => (ArithOp::Le, true),
    BinaryOp::Eq | BinaryOp::And | BinaryOp::Or => (ArithOp::Eq, false),
    BinaryOp::Ne  => (ArithOp::Ne, false),
  }
}

/// Every name mentioned in `term`, in order, with repetitions.
pub(crate) fn names_in<'t>(term: &'t Term, out: &mut Vec<&'t str>) {
  match term {
    Term::Name(name) => out.push(name),
    Term::Annotated(_, inner) => names_in(inner, out),
    _ => {
      for arg in agent_args(term) {
        names_in(arg, out);
      }
    }
  }
}

pub(crate) fn is_agent_like(term: &Term) -> bool {
  matches!(term, Term::Agent { .. } | Term::Tuple(_) | Term::Nil | Term::Cons(..))
}

impl Compiler<'_> {
  /// Compiles `term` into a register and returns it.
  pub(crate) fn compile_term(&mut self, term: &Term) -> Result<Var, CompileError> {
    self.compile_term_into(term, None)
  }

  /// With a `target`, an agent-like term is built by rewriting the agent in that machine side's annotation slot
  /// instead of allocating a new one.
  fn compile_term_into(&mut self, term: &Term, target: Option<Side>) -> Result<Var, CompileError> {
    match term {

      Term::Name(name) => {
        if let Some(var) = self.context.find_var(name) {
          return Ok(var);
        }
        let var = self.context.bind_new(name.clone(), BindingKind::Name);
        self.context.emit(Ir::MkName { dest: var });
        Ok(var)
      }

      Term::IntVar(name) => Err(CompileErrorKind::MisplacedIntPattern(name.clone()).into()),

      Term::Int(n) => {
        let dest = self.context.new_var();
        self.context.emit(Ir::LoadI { imm: *n, dest, shared: false });
        Ok(dest)
      }

      Term::Agent { name, .. } => {
        let kind = self.kinds.intern(name);
        self.build_agent(kind, term, target, name)
      }

      Term::Tuple(items) => {
        if items.len() > MAX_TUPLE {
          return Err(CompileErrorKind::TupleTooLarge(items.len()).into());
        }
        self.build_agent(kind_table::tuple(items.len()), term, target, "")
      }

      Term::Nil => self.build_agent(NIL, term, target, ""),

      Term::Cons(..) => self.build_agent(CONS, term, target, ""),

      Term::Percent(name) => {
        let kind = match self.kinds.lookup(name) {
          Some(kind) => kind,
          None => {
            if self.context.warnings {
              crate::warning!(2, "`{}' in `%{}' has not been defined yet.", name, name);
            }
            self.kinds.intern(name)
          }
        };
        let id    = self.context.new_var();
        let agent = self.context.new_var();
        self.context.emit(Ir::LoadI { imm: kind as i64, dest: id, shared: false });
        self.context.emit(Ir::MkAgent { kind: PERCENT, dest: agent });
        self.context.emit(Ir::LoadP { src: id, port: 0, agent });
        Ok(agent)
      }

      Term::Annotated(side, inner) => {
        if !is_agent_like(inner) {
          return Err(CompileErrorKind::AnnotatedNonAgent(inner.to_string()).into());
        }
        let physical = self.context.physical(*side);
        self.context.keep_agent(physical);
        self.compile_term_into(inner, Some(physical))
      }

      Term::Binary(..) | Term::Unary(..) => self.compile_expression(term),

    } // end match on `term`
  }

  fn build_agent(
    &mut self,
    kind  : KindId,
    term  : &Term,
    target: Option<Side>,
    name  : &str,
  ) -> Result<Var, CompileError>
  {
    let args = agent_args(term);
    if args.len() > MAX_PORT {
      return Err(CompileErrorKind::TooManyArguments(IString::from(name)).into());
    }
    if kind >= FIRST_USER {
      self.kinds.set_arity(kind, args.len());
    }

    match target {
      None => {
        let mut vars = Vec::with_capacity(args.len());
        for arg in args {
          vars.push(self.compile_term(arg)?);
        }
        let agent = self.context.new_var();
        self.context.emit(Ir::MkAgent { kind, dest: agent });
        for (port, src) in vars.into_iter().enumerate() {
          self.context.emit(Ir::LoadP { src, port, agent });
        }
        Ok(agent)
      }

      Some(side) => {
        if self.context.kind_in_slot(side) != kind {
          self.context.emit(Ir::ChId { side, kind });
        }
        for (port, arg) in args.into_iter().enumerate() {
          let src = self.compile_term(arg)?;
          // The port already holds the value it was loaded from.
          let unchanged = match side {
            Side::Left => src == metavar_l(port),
            Side::Right => src == metavar_r(port),
          };
          if !unchanged {
            self.context.emit(Ir::LoadPAnnotated { side, src, port });
          }
        }
        Ok(self.context.annotation_register_of_slot(side))
      }
    }
  }

  // region Expressions

  pub(crate) fn compile_expression(&mut self, term: &Term) -> Result<Var, CompileError> {
    match term {

      Term::Int(n) => {
        let dest = self.context.new_var();
        self.context.emit(Ir::LoadI { imm: *n, dest, shared: false });
        Ok(dest)
      }

      Term::Name(name) => {
        let kind = self.context.binding_kind(name);
        match self.context.find_var(name) {
          Some(var) => {
            if kind != Some(BindingKind::IntVar) && self.context.warnings {
              crate::warning!(2, "`{}' is used in an expression, but it is not declared as an integer.", name);
            }
            Ok(var)
          }
          None => Err(CompileErrorKind::UndeclaredPropertyVariable(name.clone()).into()),
        }
      }

      Term::Binary(BinaryOp::And, left, right) => self.compile_short_circuit(left, right, true),
      Term::Binary(BinaryOp::Or, left, right) => self.compile_short_circuit(left, right, false),

      Term::Binary(op, left, right) => {
        let (op, swapped) = arith_op(*op);
        let (left, right) = if swapped { (right, left) } else { (left, right) };
        let left  = self.compile_expression(left)?;
        let right = self.compile_expression(right)?;
        let dest  = self.context.new_var();
        self.context.emit(Ir::Arith { op, left, right, dest });
        Ok(dest)
      }

      Term::Unary(op, operand) => {
        let src  = self.compile_expression(operand)?;
        let dest = self.context.new_var();
        let instruction = match op {
          UnaryOp::Neg  => Ir::Unary { op: UnaryIr::Unm, src, dest },
          UnaryOp::Rand => Ir::Unary { op: UnaryIr::Rand, src, dest },
          UnaryOp::Not  => Ir::ArithI { op: ImmOp::EqI, src, imm: 0, dest },
        };
        self.context.emit(instruction);
        Ok(dest)
      }

      other => Err(CompileErrorKind::NotAnExpression(other.to_string()).into()),

    } // end match on `term`
  }

  /// `a && b` and `a || b` evaluate `b` only when `a` does not decide the result.
  fn compile_short_circuit(&mut self, left: &Term, right: &Term, and: bool) -> Result<Var, CompileError> {
    let result  = self.context.new_var();
    let decided = self.context.new_label();
    let end     = self.context.new_label();

    for operand in [left, right] {
      let var = self.compile_expression(operand)?;
      self.context.emit(
        if and {
          Ir::JmpEq0 { var, label: decided }
        } else {
          Ir::JmpNeq0 { var, label: decided }
        }
      );
    }

    let (fallthrough, shortcut) = if and { (1, 0) } else { (0, 1) };
    self.context.emit(Ir::LoadI { imm: fallthrough, dest: result, shared: true });
    self.context.emit(Ir::Jmp { label: end });
    self.context.emit(Ir::Label(decided));
    self.context.emit(Ir::LoadI { imm: shortcut, dest: result, shared: true });
    self.context.emit(Ir::Label(end));
    Ok(result)
  }

  // endregion

  /// `x = value` makes `x` an integer variable for the rest of the body.
  pub(crate) fn compile_statement(&mut self, statement: &Statement) -> Result<(), CompileError> {
    if self.context.is_bound(&statement.name) && self.context.warnings {
      crate::warning!(2, "`{}' has been already defined.", statement.name);
    }

    let dest = self.context.new_var();
    match &statement.value {
      Term::Name(name) => {
        let src = self
            .context
            .find_var(name)
            .ok_or_else(|| CompileErrorKind::UndeclaredPropertyVariable(name.clone()))?;
        self.context.emit(Ir::Load { src, dest });
      }
      Term::Int(n) => {
        self.context.emit(Ir::LoadI { imm: *n, dest, shared: false });
      }
      value => {
        let src = self.compile_expression(value)?;
        self.context.emit(Ir::Load { src, dest });
      }
    }

    self.context.bind(statement.name.clone(), dest, BindingKind::IntVar);
    Ok(())
  }
}
