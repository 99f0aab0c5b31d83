/*!

Compilation of nets.

A net is a list of equations executed once to build the initial graph. Names that occur twice are wires inside the
net. A name that occurs once is global: it is made with `MKGNAME`, which records the cell in the name table so later
nets and the caller can find it.

A global name that already stands for a live term is joined to the new net instead of being made afresh. If its cell
is connected, `CNCTGN` pushes the connected term against the new one. If it only occurs inside other global terms,
`SUBSTGN` splices the new term in at that occurrence.

*/

use std::collections::HashMap;

use crate::{
  abstractions::IString,
  api::ast::{Equation, Net, Side, Term},
  core::{
    bytecode::Word,
    compiler::{
      compile_error::{CompileError, CompileErrorKind},
      imcode::{Ir, RetKind},
      rewrite::eliminate_name_equations,
      term::names_in,
      Compiler,
      GlobalInfo,
    },
  },
};

impl Compiler<'_> {
  /// Compiles `net` into a block to be run once. `globals` describes the global names that currently have a cell.
  ///
  /// Every agent the net builds lives in a register until the block connects it, so a net is limited by the
  /// `VM_REG_SIZE` registers of a machine. A literal list of a few dozen elements already fails with
  /// `RegistersExhausted`; longer data is built by rules, e.g. by appending shorter lists.
  pub fn compile_net(
    &mut self,
    net    : &Net,
    globals: &HashMap<IString, GlobalInfo>,
  ) -> Result<Box<[Word]>, CompileError>
  {
    self.compile_net_equations(net, globals).map_err(|error| {
      crate::error!(0, "{}", error);
      error
    })
  }

  fn compile_net_equations(
    &mut self,
    net    : &Net,
    globals: &HashMap<IString, GlobalInfo>,
  ) -> Result<Box<[Word]>, CompileError>
  {
    self.context.clear();

    for side in [Side::Left, Side::Right] {
      if net.contains_annotation(side) {
        return Err(CompileErrorKind::AnnotationInNet(side).into());
      }
    }

    for statement in &net.statements {
      self.compile_statement(statement)?;
    }

    let mut equations: Vec<Equation> = net
        .equations
        .iter()
        .map(|equation| Equation {
          left : equation.left.clone().strip_unary_tuples(),
          right: equation.right.clone().strip_unary_tuples(),
        })
        .collect();

    for equation in &equations {
      for term in [&equation.left, &equation.right] {
        if let Term::Name(ident) = term {
          if globals.get(ident).is_some_and(|info| info.occurrences >= 2) {
            return Err(CompileErrorKind::GlobalOccursTwice(ident.clone()).into());
          }
        }
      }
    }

    if self.options.threaded {
      let context = &self.context;
      eliminate_name_equations(&mut equations, |ident| {
        context.binding_kind(ident).is_none() && !globals.contains_key(&IString::from(ident))
      });
    }

    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    for equation in &equations {
      let mut names = Vec::new();
      names_in(&equation.left, &mut names);
      names_in(&equation.right, &mut names);
      for ident in names {
        *occurrences.entry(ident).or_insert(0) += 1;
      }
    }
    // An existing global name mentioned once in this net joins the net to the name's term.
    let joined = |term: &Term| -> Option<GlobalInfo> {
      match term {
        Term::Name(ident) if occurrences.get(&**ident) == Some(&1) => {
          globals.get(ident).copied().filter(|info| info.bound || info.occurrences > 0)
        }
        _ => None,
      }
    };

    for equation in &equations {
      let left  = self.compile_term(&equation.left)?;
      let right = self.compile_term(&equation.right)?;

      let instruction = match (joined(&equation.left), joined(&equation.right)) {
        (Some(info), _) => Self::join_global(info, left, right),
        (None, Some(info)) => Self::join_global(info, right, left),
        (None, None) if self.options.threaded => Ir::Push { left, right },
        (None, None) => Ir::MyPush { left, right },
      };
      self.context.emit(instruction);
    }
    self.context.emit(Ir::Ret(RetKind::Keep));

    for (ident, var) in self.context.check_net_names()? {
      let gid = self.names.intern(&ident);
      for instruction in self.context.code.iter_mut() {
        if *instruction == (Ir::MkName { dest: var }) {
          *instruction = Ir::MkGName { gid, dest: var };
        }
      }
    }

    self.finish(&[])
  }

  fn join_global(info: GlobalInfo, name: usize, term: usize) -> Ir {
    if info.bound {
      Ir::CnctGN { name, term }
    } else {
      Ir::SubstGN { name, term }
    }
  }
}
