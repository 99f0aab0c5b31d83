/*!

Runtime configuration. Command line parsing belongs to the embedding application; it fills in a `Config` and hands
it to `Engine::new`.

*/

use enumflags2::{bitflags, BitFlags};

/// How the per-worker heaps obtain cells.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HeapMode {
  /// A ring of hoops that grows on demand. The first hoops hold `2^init_exponent` cells, and each new hoop is
  /// `2^increment_exponent` times the size of the last.
  Flex {
    init_exponent     : u32,
    increment_exponent: u32,
  },
  /// A single slab of `capacity` cells, divided evenly between workers. Running out is fatal.
  Fixed {
    capacity: usize,
  },
}

impl Default for HeapMode {
  fn default() -> Self {
    HeapMode::Flex {
      init_exponent     : 12,
      increment_exponent: 3,
    }
  }
}

/// Intermediate code optimisations performed by the rule compiler.
#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OptimiseFlag {
  /// Forward a register copy into its single reader and drop the copy.
  CopyPropagation    = 1 << 0,
  /// Fold an integer load into the immediate form of its reader (`PUSHI`, `ADDI`, `INC`, ...).
  LoadiPropagation   = 1 << 1,
  /// Write a guard's comparison straight into register 0 and branch on it.
  CompareFusion      = 1 << 2,
  /// Reuse registers whose values are dead. Without it every virtual register gets its own slot.
  RegisterAllocation = 1 << 3,
}

pub type OptimiseFlags = BitFlags<OptimiseFlag, u8>;

#[derive(Clone, Debug)]
pub struct Config {
  pub heap_mode        : HeapMode,
  /// Initial capacity of each equation worklist. Worklists double when full.
  pub eqstack_size     : usize,
  /// Number of reduction workers.
  pub threads          : usize,
  /// Tail-call transformation of self-recursive rules.
  pub tco              : bool,
  pub optimise         : OptimiseFlags,
  /// Weak head normal form strategy. Only honoured with one worker.
  pub whnf             : bool,
  /// Log heap usage after every net.
  pub verbose_memory   : bool,
  /// Log compiled code for every rule and net.
  pub print_code       : bool,
  /// Recover from runtime errors with a mark-and-sweep pass instead of refusing further work.
  pub retrieve_on_error: bool,
}

impl Default for Config {
  fn default() -> Self {
    Config {
      heap_mode        : HeapMode::default(),
      eqstack_size     : 1 << 8,
      threads          : 1,
      tco              : false,
      optimise         : OptimiseFlags::all(),
      whnf             : false,
      verbose_memory   : false,
      print_code       : false,
      retrieve_on_error: true,
    }
  }
}

impl Config {
  /// A configuration with one worker per available CPU.
  pub fn with_all_cpus() -> Self {
    let threads = std::thread::available_parallelism().map_or(1, |n| n.get());
    Config {
      threads,
      ..Config::default()
    }
  }

  /// Whether reduction runs on more than one worker.
  #[inline(always)]
  pub fn is_threaded(&self) -> bool {
    self.threads > 1
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.eqstack_size, 256);
    assert_eq!(config.threads, 1);
    assert!(!config.tco);
    assert!(!config.whnf);
    assert!(config.optimise.contains(OptimiseFlag::CopyPropagation | OptimiseFlag::RegisterAllocation));
    assert_eq!(config.heap_mode, HeapMode::Flex { init_exponent: 12, increment_exponent: 3 });
  }

  #[test]
  fn test_all_cpus() {
    assert!(Config::with_all_cpus().threads >= 1);
  }
}
