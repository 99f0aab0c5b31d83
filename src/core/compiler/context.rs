/*!

The state of one compilation: variable bindings, the intermediate code emitted so far, and what the rule being
compiled looks like. A `CompilerContext` is reset between rules and between the branches of a guarded rule.

*/

use crate::{
  abstractions::IString,
  api::ast::Side,
  core::{
    bytecode::{ANNOTATE_L, ANNOTATE_R, FIRST_LOCAL},
    compiler::{
      compile_error::{CompileError, CompileErrorKind},
      imcode::{Ir, Label, RetKind, Var},
    },
    kind_table::{KindId, INT},
  },
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum BindingKind {
  /// An argument of the left agent of the active pair, as it is laid out in the machine.
  MetaL,
  MetaR,
  /// A rule side that matches anything and is bound as a whole.
  Wildcard,
  IntVar,
  Name,
}

#[derive(Clone, Debug)]
pub(crate) struct Binding {
  pub name: IString,
  pub var : Var,
  pub refs: usize,
  pub kind: BindingKind,
}

pub(crate) struct BranchState {
  bindings: Vec<Binding>,
  keep    : [bool; 2],
}

pub(crate) struct CompilerContext {
  pub bindings  : Vec<Binding>,
  pub code      : Vec<Ir>,
  next_var      : Var,
  next_label    : Label,

  /// Kinds of the agents in the machine's left and right annotation slots.
  pub id_l      : KindId,
  pub id_r      : KindId,
  /// Whether the rule is compiled for the pair with its sides exchanged.
  pub reversed  : bool,

  /// Agents in `ANNOTATE_L`, `ANNOTATE_R` that the body reuses and the return must not free.
  pub keep      : [bool; 2],

  /// Set once a tail call has been emitted. The rest of the body is the loop alternative of the same equation.
  pub tail_call_emitted: bool,
  pub warnings  : bool,
}

impl Default for CompilerContext {
  fn default() -> Self {
    CompilerContext::new()
  }
}

impl CompilerContext {
  pub fn new() -> Self {
    CompilerContext {
      bindings         : Vec::new(),
      code             : Vec::new(),
      next_var         : FIRST_LOCAL,
      next_label       : 0,
      id_l             : INT,
      id_r             : INT,
      reversed         : false,
      keep             : [false; 2],
      tail_call_emitted: false,
      warnings         : true,
    }
  }

  /// Resets everything for a new rule or net.
  pub fn clear(&mut self) {
    *self = CompilerContext::new();
  }

  /// The state a guarded branch starts from.
  pub fn save_branch_state(&self) -> BranchState {
    BranchState {
      bindings: self.bindings.clone(),
      keep    : self.keep,
    }
  }

  /// Drops the bindings and state of a finished branch.
  pub fn restore_branch_state(&mut self, state: BranchState) {
    self.bindings          = state.bindings;
    self.keep              = state.keep;
    self.tail_call_emitted = false;
  }

  // region Sides

  /// The machine side holding the agent a source annotation refers to.
  #[inline(always)]
  pub fn physical(&self, side: Side) -> Side {
    match (self.reversed, side) {
      (false, side) => side,
      (true, Side::Left) => Side::Right,
      (true, Side::Right) => Side::Left,
    }
  }

  /// The register holding the agent a source annotation refers to.
  #[inline(always)]
  pub fn annotation_register(&self, side: Side) -> Var {
    self.annotation_register_of_slot(self.physical(side))
  }

  #[inline(always)]
  pub fn annotation_register_of_slot(&self, side: Side) -> Var {
    match side {
      Side::Left => ANNOTATE_L,
      Side::Right => ANNOTATE_R,
    }
  }

  /// The kind of the agent held in the annotation slot of machine side `side`.
  pub fn kind_in_slot(&self, side: Side) -> KindId {
    match side {
      Side::Left => self.id_l,
      Side::Right => self.id_r,
    }
  }

  pub fn keep_agent(&mut self, side: Side) {
    match side {
      Side::Left => self.keep[0] = true,
      Side::Right => self.keep[1] = true,
    }
  }

  // endregion

  #[inline(always)]
  pub fn new_var(&mut self) -> Var {
    let var = self.next_var;
    self.next_var += 1;
    var
  }

  #[inline(always)]
  pub fn new_label(&mut self) -> Label {
    let label = self.next_label;
    self.next_label += 1;
    label
  }

  #[inline(always)]
  pub fn emit(&mut self, instruction: Ir) {
    self.code.push(instruction);
  }

  // region Bindings

  pub fn bind(&mut self, name: IString, var: Var, kind: BindingKind) {
    self.bindings.push(Binding { name, var, refs: 0, kind });
  }

  /// Binds `name` to a fresh virtual register.
  pub fn bind_new(&mut self, name: IString, kind: BindingKind) -> Var {
    let var = self.new_var();
    self.bind(name, var, kind);
    var
  }

  pub fn lookup(&self, name: &str) -> Option<&Binding> {
    self.bindings.iter().rev().find(|binding| &*binding.name == name)
  }

  pub fn is_bound(&self, name: &str) -> bool {
    self.lookup(name).is_some()
  }

  pub fn binding_kind(&self, name: &str) -> Option<BindingKind> {
    self.lookup(name).map(|binding| binding.kind)
  }

  /// The register bound to `name`, counting the reference.
  pub fn find_var(&mut self, name: &str) -> Option<Var> {
    let counting = !self.tail_call_emitted;
    let binding  = self.bindings.iter_mut().rev().find(|binding| &*binding.name == name)?;
    if counting {
      binding.refs += 1;
    }
    Some(binding.var)
  }

  // endregion

  /// Emits the return that frees whichever annotated agents the body did not reuse.
  pub fn emit_ret(&mut self) {
    if self.tail_call_emitted {
      return;
    }

    let kind = match self.keep {
      [false, false] => RetKind::FreeLR,
      [true, false]  => RetKind::FreeR,
      [false, true]  => RetKind::FreeL,
      [true, true]   => RetKind::Keep,
    };
    self.emit(Ir::Ret(kind));
  }

  /// Every metavariable must be used once and every local name twice: once where it is made and once more.
  pub fn check_linearity(&self) -> Result<(), CompileError> {
    for binding in &self.bindings {
      match binding.kind {
        BindingKind::MetaL | BindingKind::MetaR | BindingKind::Wildcard if binding.refs != 1 => {
          return Err(CompileErrorKind::MetaNotOnce(binding.name.clone()).into());
        }
        BindingKind::Name if binding.refs != 1 => {
          return Err(CompileErrorKind::NameNotTwice(binding.name.clone()).into());
        }
        _ => {}
      }
    }
    Ok(())
  }

  /// In a net a name may occur at most twice. Names that occur once are returned; they become global names.
  pub fn check_net_names(&self) -> Result<Vec<(IString, Var)>, CompileError> {
    let mut globals = Vec::new();
    for binding in self.bindings.iter().filter(|binding| binding.kind == BindingKind::Name) {
      match binding.refs {
        0 => globals.push((binding.name.clone(), binding.var)),
        1 => {}
        _ => return Err(CompileErrorKind::NameMoreThanTwice(binding.name.clone()).into()),
      }
    }
    Ok(globals)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::bytecode::metavar_l;

  #[test]
  fn test_find_var_counts_references() {
    let mut context = CompilerContext::new();
    context.bind(IString::from("x"), metavar_l(0), BindingKind::MetaL);
    let w = context.bind_new(IString::from("w"), BindingKind::Name);
    assert_eq!(w, FIRST_LOCAL);

    assert_eq!(context.find_var("x"), Some(metavar_l(0)));
    assert!(context.check_linearity().is_err());
    assert_eq!(context.find_var("w"), Some(w));
    assert!(context.check_linearity().is_ok());

    context.tail_call_emitted = true;
    context.find_var("x");
    assert!(context.check_linearity().is_ok());
  }

  #[test]
  fn test_branch_reset() {
    let mut context = CompilerContext::new();
    context.bind(IString::from("x"), metavar_l(0), BindingKind::MetaL);
    context.keep[1] = true;

    let state = context.save_branch_state();
    context.find_var("x");
    context.bind_new(IString::from("y"), BindingKind::Name);
    context.keep[0] = true;
    context.tail_call_emitted = true;

    context.restore_branch_state(state);
    assert_eq!(context.bindings.len(), 1);
    assert_eq!(context.bindings[0].refs, 0);
    assert_eq!(context.keep, [false, true]);
    assert!(!context.tail_call_emitted);
  }

  #[test]
  fn test_ret_follows_kept_agents() {
    let mut context = CompilerContext::new();
    context.keep = [true, false];
    context.emit_ret();
    assert_eq!(context.code, vec![Ir::Ret(RetKind::FreeR)]);
  }
}
