/*!

Abstract syntax for rules and nets.

Source text is parsed elsewhere; this crate consumes the trees built here. The free functions at the bottom are the
intended way to build them:

```
use inpla::api::ast::*;

// Inc(r) >< (int x) => r ~ x + 1;
let rule = rule(
  agent("Inc", vec![name("r")]),
  int_var("x"),
  body(vec![], vec![eq(name("r"), add(name("x"), int(1)))]),
);
```

*/

use std::fmt::{Display, Formatter};

use crate::{abstractions::{join_string, IString}, MAX_PORT};

/// Which agent of the active pair an annotation refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Side {
  Left,
  Right,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Mod,
  Lt,
  Le,
  Gt,
  Ge,
  Eq,
  Ne,
  And,
  Or,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UnaryOp {
  Neg,
  Not,
  /// A random number in `0..n`.
  Rand,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Term {
  Name(IString),
  /// An integer pattern `int x`. Only meaningful as a rule agent or an argument of one.
  IntVar(IString),
  Int(i64),
  Agent {
    name: IString,
    args: Vec<Term>,
  },
  Tuple(Vec<Term>),
  Nil,
  Cons(Box<Term>, Box<Term>),
  /// `%f`, a reference to the agent kind `f`.
  Percent(IString),
  /// `(*L)t` or `(*R)t`: build `t` by reusing the matched agent of that side.
  Annotated(Side, Box<Term>),
  Binary(BinaryOp, Box<Term>, Box<Term>),
  Unary(UnaryOp, Box<Term>),
}

impl Term {
  /// Whether the term is an integer expression rather than an agent, name, or literal structure.
  pub fn is_expression(&self) -> bool {
    matches!(self, Term::Int(_) | Term::Binary(..) | Term::Unary(..))
  }

  /// Removes one-element tuple wrappers: `(t)` is `t`.
  pub fn strip_unary_tuples(self) -> Term {
    match self {
      Term::Tuple(mut items) if items.len() == 1 => {
        match items.pop() {
          Some(item) => item.strip_unary_tuples(),
          None => Term::Tuple(items),
        }
      }
      Term::Agent { name, args } => Term::Agent {
        name,
        args: args.into_iter().map(Term::strip_unary_tuples).collect(),
      },
      Term::Tuple(items) => Term::Tuple(items.into_iter().map(Term::strip_unary_tuples).collect()),
      Term::Cons(head, tail) => {
        Term::Cons(Box::new(head.strip_unary_tuples()), Box::new(tail.strip_unary_tuples()))
      }
      Term::Annotated(side, term) => Term::Annotated(side, Box::new(term.strip_unary_tuples())),
      other => other,
    }
  }

  /// The immediate subterms that are ports of an agent-like term.
  pub fn ports(&self) -> &[Term] {
    match self {
      Term::Agent { args, .. } => args,
      Term::Tuple(items) => items,
      Term::Annotated(_, term) => term.ports(),
      _ => &[],
    }
  }

  pub(crate) fn contains_annotation(&self, which: Side) -> bool {
    match self {
      Term::Annotated(side, term) => *side == which || term.contains_annotation(which),
      Term::Agent { args, .. } | Term::Tuple(args) => args.iter().any(|arg| arg.contains_annotation(which)),
      Term::Cons(head, tail) => head.contains_annotation(which) || tail.contains_annotation(which),
      _ => false,
    }
  }
}

/// `left ~ right`
#[derive(Clone, Debug, PartialEq)]
pub struct Equation {
  pub left : Term,
  pub right: Term,
}

/// `name = value`, binding an integer for the equations that follow.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
  pub name : IString,
  pub value: Term,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Body {
  pub statements: Vec<Statement>,
  pub equations : Vec<Equation>,
}

impl Body {
  pub(crate) fn contains_annotation(&self, which: Side) -> bool {
    self.equations
        .iter()
        .any(|eq| eq.left.contains_annotation(which) || eq.right.contains_annotation(which))
  }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RuleBody {
  Plain(Body),
  /// `| condition => then | _ => otherwise`
  Guarded {
    condition: Term,
    then     : Box<RuleBody>,
    otherwise: Box<RuleBody>,
  },
}

impl RuleBody {
  pub(crate) fn contains_annotation(&self, which: Side) -> bool {
    match self {
      RuleBody::Plain(body) => body.contains_annotation(which),
      RuleBody::Guarded { then, otherwise, .. } => {
        then.contains_annotation(which) || otherwise.contains_annotation(which)
      }
    }
  }
}

/// `left >< right => body`
#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
  pub left : Term,
  pub right: Term,
  pub body : RuleBody,
}

/// A net is a body executed at the top level.
pub type Net = Body;

// region Display

impl Display for BinaryOp {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let symbol = match self {
      BinaryOp::Add => "+",
      BinaryOp::Sub => "-",
      BinaryOp::Mul => "*",
      BinaryOp::Div => "/",
      BinaryOp::Mod => "%",
      BinaryOp::Lt  => "<",
      BinaryOp::Le  => "<=",
      BinaryOp::Gt  => ">",
      BinaryOp::Ge  => ">=",
      BinaryOp::Eq  => "==",
      BinaryOp::Ne  => "!=",
      BinaryOp::And => "&&",
      BinaryOp::Or  => "||",
    };
    write!(f, "{}", symbol)
  }
}

impl Display for Term {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Term::Name(name) => write!(f, "{}", name),
      Term::IntVar(name) => write!(f, "int {}", name),
      Term::Int(n) => write!(f, "{}", n),
      Term::Agent { name, args } if args.is_empty() => write!(f, "{}", name),
      Term::Agent { name, args } => write!(f, "{}({})", name, join_string(args.iter(), ",")),
      Term::Tuple(items) => write!(f, "({})", join_string(items.iter(), ",")),
      Term::Nil => write!(f, "[]"),
      Term::Cons(head, tail) => write!(f, "{}:{}", head, tail),
      Term::Percent(name) => write!(f, "%{}", name),
      Term::Annotated(Side::Left, term) => write!(f, "(*L){}", term),
      Term::Annotated(Side::Right, term) => write!(f, "(*R){}", term),
      Term::Binary(op, left, right) => write!(f, "({} {} {})", left, op, right),
      Term::Unary(UnaryOp::Neg, term) => write!(f, "-{}", term),
      Term::Unary(UnaryOp::Not, term) => write!(f, "!{}", term),
      Term::Unary(UnaryOp::Rand, term) => write!(f, "rand({})", term),
    }
  }
}

impl Display for Equation {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}~{}", self.left, self.right)
  }
}

impl Display for Rule {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} >< {}", self.left, self.right)
  }
}

// endregion

// region Builders

pub fn name(ident: &str) -> Term {
  Term::Name(IString::from(ident))
}

pub fn int_var(ident: &str) -> Term {
  Term::IntVar(IString::from(ident))
}

pub fn int(n: i64) -> Term {
  Term::Int(n)
}

pub fn agent(kind: &str, args: Vec<Term>) -> Term {
  Term::Agent { name: IString::from(kind), args }
}

pub fn tuple(items: Vec<Term>) -> Term {
  Term::Tuple(items)
}

pub fn nil() -> Term {
  Term::Nil
}

pub fn cons(head: Term, tail: Term) -> Term {
  Term::Cons(Box::new(head), Box::new(tail))
}

/// `[a, b, c]` as nested conses ending in `[]`.
pub fn list(items: Vec<Term>) -> Term {
  items.into_iter().rev().fold(Term::Nil, |tail, head| cons(head, tail))
}

pub fn percent(kind: &str) -> Term {
  Term::Percent(IString::from(kind))
}

pub fn annotate(side: Side, term: Term) -> Term {
  Term::Annotated(side, Box::new(term))
}

pub fn binary(op: BinaryOp, left: Term, right: Term) -> Term {
  Term::Binary(op, Box::new(left), Box::new(right))
}

pub fn add(left: Term, right: Term) -> Term {
  binary(BinaryOp::Add, left, right)
}

pub fn sub(left: Term, right: Term) -> Term {
  binary(BinaryOp::Sub, left, right)
}

pub fn mul(left: Term, right: Term) -> Term {
  binary(BinaryOp::Mul, left, right)
}

pub fn unary(op: UnaryOp, term: Term) -> Term {
  Term::Unary(op, Box::new(term))
}

pub fn eq(left: Term, right: Term) -> Equation {
  Equation { left, right }
}

pub fn stm(ident: &str, value: Term) -> Statement {
  Statement { name: IString::from(ident), value }
}

pub fn body(statements: Vec<Statement>, equations: Vec<Equation>) -> RuleBody {
  RuleBody::Plain(Body { statements, equations })
}

pub fn guarded(condition: Term, then: RuleBody, otherwise: RuleBody) -> RuleBody {
  RuleBody::Guarded { condition, then: Box::new(then), otherwise: Box::new(otherwise) }
}

pub fn rule(left: Term, right: Term, body: RuleBody) -> Rule {
  Rule { left, right, body }
}

pub fn net(equations: Vec<Equation>) -> Net {
  Body { statements: Vec::new(), equations }
}

// endregion

/// Arity of an agent-like pattern, or `None` if it has more ports than a cell holds.
pub(crate) fn pattern_arity(term: &Term) -> Option<usize> {
  let arity = match term {
    Term::Agent { args, .. } => args.len(),
    Term::Tuple(items) => items.len(),
    Term::Cons(..) => 2,
    _ => 0,
  };
  (arity <= MAX_PORT).then_some(arity)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_display() {
    let rule = rule(
      agent("Append", vec![name("r"), name("a")]),
      cons(name("x"), name("xs")),
      body(vec![], vec![]),
    );
    assert_eq!(rule.to_string(), "Append(r,a) >< x:xs");
    assert_eq!(list(vec![int(1), int(2)]).to_string(), "1:2:[]");
    assert_eq!(eq(name("r"), add(name("x"), int(1))).to_string(), "r~(x + 1)");
  }

  #[test]
  fn test_strip_unary_tuples() {
    let term = tuple(vec![tuple(vec![agent("A", vec![tuple(vec![name("x")])])])]);
    assert_eq!(term.strip_unary_tuples(), agent("A", vec![name("x")]));
  }

  #[test]
  fn test_annotation_search() {
    let term = agent("A", vec![annotate(Side::Right, nil())]);
    assert!(term.contains_annotation(Side::Right));
    assert!(!term.contains_annotation(Side::Left));
  }
}
