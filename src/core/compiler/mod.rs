/*!

The rule and net compiler.

Source terms are lowered to intermediate code over virtual registers (`term`, `rule`, `net`), cleaned up by the
peephole passes in `optimise`, mapped onto machine registers by `regalloc`, and finally flattened to bytecode by
`codegen`. A `Compiler` borrows the engine's kind and name tables for the duration of one rule or net.

*/

mod codegen;
mod compile_error;
mod context;
mod imcode;
mod net;
mod optimise;
mod regalloc;
mod rewrite;
mod rule;
mod term;

#[cfg(test)]
mod tests;

use crate::{
  config::{OptimiseFlag, OptimiseFlags},
  core::{
    bytecode::{listing, Word},
    kind_table::{KindId, KindTable},
    name_table::NameTable,
  },
};
use context::CompilerContext;

pub use compile_error::{CompileError, CompileErrorKind};

#[derive(Copy, Clone, Debug)]
pub(crate) struct CompilerOptions {
  pub tco       : bool,
  pub optimise  : OptimiseFlags,
  pub print_code: bool,
  /// Nets are compiled for more than one worker.
  pub threaded  : bool,
}

/// One orientation of a rule, ready for the rule table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompiledRule {
  pub left : KindId,
  pub right: KindId,
  pub code : Box<[Word]>,
}

/// What the runtime knows about a global name before a net mentioning it is compiled.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct GlobalInfo {
  /// The name's cell is already connected to a term.
  pub bound      : bool,
  /// How many live global terms refer to the name.
  pub occurrences: usize,
}

pub struct Compiler<'a> {
  pub(crate) kinds  : &'a mut KindTable,
  pub(crate) names  : &'a mut NameTable,
  pub(crate) options: CompilerOptions,
  pub(crate) context: CompilerContext,
}

impl<'a> Compiler<'a> {
  pub(crate) fn new(kinds: &'a mut KindTable, names: &'a mut NameTable, options: CompilerOptions) -> Self {
    Compiler {
      kinds,
      names,
      options,
      context: CompilerContext::new(),
    }
  }

  /// Runs the back end over the intermediate code collected in the context.
  fn finish(&mut self, header: &[Word]) -> Result<Box<[Word]>, CompileError> {
    let mut code = std::mem::take(&mut self.context.code);

    if self.options.optimise.contains(OptimiseFlag::CopyPropagation) {
      optimise::propagate_copies(&mut code);
    }
    if self.options.optimise.contains(OptimiseFlag::LoadiPropagation) {
      optimise::propagate_immediates(&mut code);
    }
    if self.options.print_code {
      crate::info!(3, "intermediate code:\n{}", imcode::ir_listing(&code));
    }

    let reuse = self.options.optimise.contains(OptimiseFlag::RegisterAllocation);
    regalloc::allocate_registers(&mut code, reuse)?;
    let words = codegen::generate(&code, header)?;

    if self.options.print_code {
      crate::info!(3, "bytecode:\n{}", listing(&words[header.len()..]));
    }
    Ok(words)
  }
}
