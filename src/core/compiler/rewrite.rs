/*!

Equation list rewriting ahead of compilation.

An equation `x ~ t` in which `x` is a local name that occurs in another equation is redundant: substituting `t` for
that occurrence and dropping the equation yields the same net with one fewer wire and one fewer equation to reduce.

*/

use crate::api::ast::{Equation, Term};

/// Replaces the first occurrence of the name `ident` in `target` by `term`. Only agent ports are searched;
/// expressions never contain wires.
fn substitute_in_term(ident: &str, term: &Term, target: &mut Term) -> bool {
  match target {
    Term::Name(name) if &**name == ident => {
      *target = term.clone();
      true
    }

    Term::Agent { args, .. } | Term::Tuple(args) => {
      args.iter_mut().any(|arg| substitute_in_term(ident, term, arg))
    }

    Term::Cons(head, tail) => {
      substitute_in_term(ident, term, head) || substitute_in_term(ident, term, tail)
    }

    Term::Annotated(_, inner) => substitute_in_term(ident, term, inner),

    _ => false,
  }
}

/// Substitutes `term` for `ident` in the first equation other than `skip` that mentions it.
fn substitute_in_equations(skip: usize, ident: &str, term: &Term, equations: &mut [Equation]) -> bool {
  equations
      .iter_mut()
      .enumerate()
      .filter(|(index, _)| *index != skip)
      .any(|(_, equation)| {
        substitute_in_term(ident, term, &mut equation.left) || substitute_in_term(ident, term, &mut equation.right)
      })
}

/// Eliminates every equation `x ~ t` or `t ~ x` whose name `x` is local and occurs elsewhere. `is_local` tells
/// whether a name is a wire of this body rather than a metavariable or integer.
pub(crate) fn eliminate_name_equations(equations: &mut Vec<Equation>, is_local: impl Fn(&str) -> bool) {
  let mut index = 0;

  while index < equations.len() {
    let equation = equations[index].clone();

    let eliminated = [(&equation.left, &equation.right), (&equation.right, &equation.left)]
        .into_iter()
        .any(|(name, term)| match name {
          Term::Name(ident) if is_local(ident) => substitute_in_equations(index, ident, term, equations),
          _ => false,
        });

    if eliminated {
      equations.remove(index);
    } else {
      index += 1;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::ast::*;

  #[test]
  fn test_local_name_is_substituted() {
    // r ~ x:w, w ~ Append(ys, a)  becomes  r ~ x:Append(ys, a)
    let mut equations = vec![
      eq(name("r"), cons(name("x"), name("w"))),
      eq(name("w"), agent("Append", vec![name("ys"), name("a")])),
    ];
    eliminate_name_equations(&mut equations, |ident| ident == "w");

    assert_eq!(
      equations,
      vec![eq(name("r"), cons(name("x"), agent("Append", vec![name("ys"), name("a")])))]
    );
  }

  #[test]
  fn test_non_local_names_stay() {
    let mut equations = vec![eq(name("r"), name("x")), eq(agent("A", vec![name("x")]), name("y"))];
    let before = equations.clone();
    eliminate_name_equations(&mut equations, |_| false);
    assert_eq!(equations, before);
  }

  #[test]
  fn test_self_reference_is_not_substituted() {
    let mut equations = vec![eq(name("x"), agent("A", vec![name("x")]))];
    eliminate_name_equations(&mut equations, |_| true);
    assert_eq!(equations.len(), 1);
  }
}
