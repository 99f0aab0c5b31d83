/*!

Errors that abort the compilation of a rule or net. Nothing is recorded or executed when one is returned.

*/

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

use crate::{abstractions::IString, api::ast::Side, MAX_PORT};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CompileErrorKind {
  /// A name used in an integer expression that is not an integer variable.
  UndeclaredPropertyVariable(IString),
  /// A rule agent argument that is not a name or an `int` pattern.
  NotAName {
    argument: String,
    side    : Side,
  },
  TooManyArguments(IString),
  TupleTooLarge(usize),
  /// A metavariable or wildcard not referenced exactly once in the body.
  MetaNotOnce(IString),
  /// A local name of a rule body not referenced exactly twice.
  NameNotTwice(IString),
  /// A name of a net occurring more than twice.
  NameMoreThanTwice(IString),
  /// A global name that is already referenced from two places.
  GlobalOccursTwice(IString),
  AnnotationInNet(Side),
  /// `(*L)` or `(*R)` applied to something that is not an agent.
  AnnotatedNonAgent(String),
  /// An agent or name used where an integer expression is required.
  NotAnExpression(String),
  /// An `int x` pattern outside the arguments of a rule agent.
  MisplacedIntPattern(IString),
  /// A rule agent that cannot be matched, such as an integer literal or an expression.
  InvalidRuleAgent(String),
  RegistersExhausted,
  /// A rule whose bytecode does not fit the instruction format.
  CodeTooLong,
  /// A register read before anything was written to it.
  UnassignedVariable(usize),
}

#[derive(Clone, Eq, PartialEq)]
pub struct CompileError {
  pub kind: CompileErrorKind,
  /// Display names of the rule agents, when the error arose while compiling a rule.
  pub rule: Option<(String, String)>,
}

impl CompileError {
  pub fn new(kind: CompileErrorKind) -> Self {
    CompileError { kind, rule: None }
  }

  pub fn in_rule(mut self, left: &str, right: &str) -> Self {
    if self.rule.is_none() {
      self.rule = Some((left.to_string(), right.to_string()));
    }
    self
  }
}

impl From<CompileErrorKind> for CompileError {
  fn from(kind: CompileErrorKind) -> Self {
    CompileError::new(kind)
  }
}

impl Display for CompileErrorKind {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {

      CompileErrorKind::UndeclaredPropertyVariable(name) => {
        write!(
          f,
          "`{}' is referred to as a property variable in an expression, although it has not yet been declared (as so).",
          name
        )
      }

      CompileErrorKind::NotAName { argument, side } => {
        let side = match side {
          Side::Left => "left",
          Side::Right => "right",
        };
        write!(f, "`{}' isn't a name in the {}-hand side of this rule active pair.", argument, side)
      }

      CompileErrorKind::TooManyArguments(agent) => {
        write!(f, "Too many arguments of `{}'. It should be MAX_PORT(={}) or less.", agent, MAX_PORT)
      }

      CompileErrorKind::TupleTooLarge(arity) => {
        write!(f, "A tuple has too many arguments ({}). It should be {} or less.", arity, MAX_PORT)
      }

      CompileErrorKind::MetaNotOnce(name) => {
        write!(f, "`{}' is referred not once in the right-hand side", name)
      }

      CompileErrorKind::NameNotTwice(name) => {
        write!(f, "`{}' is referred not twice in the right-hand side", name)
      }

      CompileErrorKind::NameMoreThanTwice(name) => {
        write!(f, "The name `{}' occurs more than twice.", name)
      }

      CompileErrorKind::GlobalOccursTwice(name) => {
        write!(f, "`{}' occurs twice already.", name)
      }

      CompileErrorKind::AnnotationInNet(Side::Left) => write!(f, "Given nets contain `(*L)'."),
      CompileErrorKind::AnnotationInNet(Side::Right) => write!(f, "Given nets contain `(*R)'."),

      CompileErrorKind::AnnotatedNonAgent(term) => {
        write!(f, "`{}' is annotated with `(*L)' or `(*R)', but only agents can be reused.", term)
      }

      CompileErrorKind::NotAnExpression(term) => {
        write!(f, "`{}' is used in an arithmetic expression, but it is not an integer.", term)
      }

      CompileErrorKind::MisplacedIntPattern(name) => {
        write!(f, "`int {}' can only be used as an argument of a rule agent.", name)
      }

      CompileErrorKind::InvalidRuleAgent(term) => {
        write!(f, "`{}' cannot be used as an agent of a rule active pair.", term)
      }

      CompileErrorKind::RegistersExhausted => write!(f, "All registers run up."),

      CompileErrorKind::CodeTooLong => write!(f, "The compiled code is too long."),

      CompileErrorKind::UnassignedVariable(var) => {
        write!(f, "No register assigned to var{}.", var)
      }

    } // end match on `CompileErrorKind`
  }
}

impl Display for CompileError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match (&self.kind, &self.rule) {
      (CompileErrorKind::MetaNotOnce(_) | CompileErrorKind::NameNotTwice(_), Some((left, right))) => {
        write!(f, "{} of the rule:\n  {} >< {}.", self.kind, left, right)
      }
      (_, Some((left, right))) => {
        write!(f, "{}\nCompilation failure for {} >< {}.", self.kind, left, right)
      }
      (_, None) => Display::fmt(&self.kind, f),
    }
  }
}

impl Debug for CompileError {
  fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
    Display::fmt(self, f)
  }
}

impl Error for CompileError {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_messages() {
    let error = CompileError::new(CompileErrorKind::MetaNotOnce(IString::from("x"))).in_rule("Foo", "Bar");
    assert_eq!(error.to_string(), "`x' is referred not once in the right-hand side of the rule:\n  Foo >< Bar.");

    let error = CompileError::new(CompileErrorKind::RegistersExhausted).in_rule("A", "B").in_rule("C", "D");
    assert_eq!(error.to_string(), "All registers run up.\nCompilation failure for A >< B.");
  }
}
