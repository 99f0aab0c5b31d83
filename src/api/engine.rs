/*!

The engine ties the pieces together. It owns the configuration, the tables, one heap and one machine per worker, and
drives each net through compilation, construction and reduction.

```
use inpla::{api::ast::*, Config, Engine};

let mut engine = Engine::new(Config::default())?;
// Inc(r) >< (int x) => r ~ x + 1;
engine.define_rule(&rule(
  agent("Inc", vec![name("r")]),
  int_var("x"),
  body(vec![], vec![eq(name("r"), add(name("x"), int(1)))]),
))?;
engine.execute_net(&net(vec![eq(agent("Inc", vec![name("r")]), int(41))]))?;
assert_eq!(engine.print_name("r")?, "42");
# Ok::<(), inpla::EngineError>(())
```

A runtime error with one worker is recovered from: the heap is swept, keeping what the global names refer to, and
the engine stays usable. With several workers, or when recovery is switched off, the error is fatal and the engine
refuses further work until `reset`.

*/

use std::{
  collections::HashMap,
  error::Error,
  fmt::{Debug, Display, Formatter},
  time::{Duration, Instant},
};

use crate::{
  abstractions::IString,
  api::{
    ast::{Net, Rule},
    value::{CellRef, Value},
  },
  config::Config,
  core::{
    bytecode::Word,
    compiler::{CompileError, CompiledRule, Compiler, CompilerOptions, GlobalInfo},
    heap::{Heap, HeapError, HeapUsage},
    machine::{free_term, mark_and_sweep, print_name, references_to, Machine, RuntimeError},
    scheduler::run_workers,
    Runtime,
  },
};

/// Workers are numbered by heap, and heaps by a byte.
const MAX_WORKERS: usize = u8::MAX as usize;

// region EngineError

pub enum EngineError {
  Compile(CompileError),
  /// A runtime error the engine recovered from.
  Runtime(RuntimeError),
  Heap(HeapError),
  /// A runtime error the engine could not recover from. Further work is refused until `Engine::reset`.
  Fatal(RuntimeError),
  Poisoned,
  UnknownName(String),
  /// A global name that cannot be freed while another global term refers to it.
  NameInUse {
    name    : String,
    referrer: String,
  },
}

impl From<CompileError> for EngineError {
  fn from(error: CompileError) -> Self {
    EngineError::Compile(error)
  }
}

impl From<RuntimeError> for EngineError {
  fn from(error: RuntimeError) -> Self {
    EngineError::Runtime(error)
  }
}

impl From<HeapError> for EngineError {
  fn from(error: HeapError) -> Self {
    EngineError::Heap(error)
  }
}

impl Display for EngineError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      EngineError::Compile(error) => Display::fmt(error, f),
      EngineError::Runtime(error) => Display::fmt(error, f),
      EngineError::Heap(error) => Display::fmt(error, f),
      EngineError::Fatal(error) => write!(f, "{}\nThe engine must be reset before it is used again.", error),
      EngineError::Poisoned => write!(f, "The engine stopped after a fatal error and must be reset."),
      EngineError::UnknownName(name) => write!(f, "`{}' is not a global name.", name),
      EngineError::NameInUse { name, referrer } => {
        write!(f, "`{}' cannot be freed because it is referred to by `{}'.", name, referrer)
      }
    }
  }
}

impl Debug for EngineError {
  fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
    Display::fmt(self, f)
  }
}

impl Error for EngineError {}

// endregion

/// What running one net took.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NetReport {
  pub interactions: u64,
  pub workers     : usize,
  pub elapsed     : Duration,
}

impl Display for NetReport {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let seconds = self.elapsed.as_secs_f64();
    if self.workers > 1 {
      write!(f, "({} interactions by {} threads, {:.2} sec)", self.interactions, self.workers, seconds)
    } else {
      write!(f, "({} interactions, {:.2} sec)", self.interactions, seconds)
    }
  }
}

pub struct Engine {
  config  : Config,
  runtime : Runtime,
  machines: Vec<Machine>,
  /// Set by a fatal error.
  poisoned: bool,
}

impl Engine {
  pub fn new(config: Config) -> Result<Engine, EngineError> {
    let workers = config.threads.clamp(1, MAX_WORKERS);
    if workers != config.threads {
      crate::warning!(2, "the number of threads is limited to 1..={}; using {}", MAX_WORKERS, workers);
    }
    if config.whnf && workers > 1 {
      crate::warning!(2, "weak head normal form reduction needs a single thread; it is ignored");
    }

    let mut heaps    = Vec::with_capacity(workers);
    let mut machines = Vec::with_capacity(workers);
    for id in 0..workers {
      let (heap, cursor) = Heap::new(id as u8, config.heap_mode, workers)?;
      let mut machine    = Machine::new(id as u8, cursor, config.eqstack_size);
      machine.whnf       = config.whnf && workers == 1;
      heaps.push(heap);
      machines.push(machine);
    }

    Ok(Engine {
      runtime: Runtime::new(heaps, config.eqstack_size),
      config : Config { threads: workers, ..config },
      machines,
      poisoned: false,
    })
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  fn compiler_options(&self) -> CompilerOptions {
    CompilerOptions {
      tco       : self.config.tco,
      optimise  : self.config.optimise,
      print_code: self.config.print_code,
      threaded  : self.runtime.is_threaded(),
    }
  }

  fn check_poisoned(&self) -> Result<(), EngineError> {
    match self.poisoned {
      true => Err(EngineError::Poisoned),
      false => Ok(()),
    }
  }

  // region Rules

  /// Compiles `rule` and records it, replacing any earlier rule for the same pair.
  pub fn define_rule(&mut self, rule: &Rule) -> Result<(), EngineError> {
    self.check_poisoned()?;
    let options  = self.compiler_options();
    let compiled = Compiler::new(&mut self.runtime.kinds, &mut self.runtime.names, options).compile_rule(rule)?;

    for CompiledRule { left, right, code } in compiled {
      crate::info!(4, "rule {} >< {} recorded", self.runtime.kinds.name(left), self.runtime.kinds.name(right));
      self.runtime.rules.record(left, right, code);
    }
    Ok(())
  }

  /// Forgets the rule between the agents named `left` and `right`, in both orientations. Returns whether there was
  /// one.
  pub fn remove_rule(&mut self, left: &str, right: &str) -> bool {
    let kinds = &self.runtime.kinds;
    let (Some(left), Some(right)) = (kinds.lookup(left), kinds.lookup(right)) else {
      return false;
    };
    let removed = self.runtime.rules.remove(left, right);
    self.runtime.rules.remove(right, left) || removed
  }

  // endregion

  // region Nets

  /// Compiles `net`, builds it on the heap, and reduces it.
  ///
  /// A net is compiled into a single block and must fit the machine's registers. See `Compiler::compile_net`.
  pub fn execute_net(&mut self, net: &Net) -> Result<NetReport, EngineError> {
    self.check_poisoned()?;

    let globals = self.global_info();
    let options = self.compiler_options();
    let code    = Compiler::new(&mut self.runtime.kinds, &mut self.runtime.names, options).compile_net(net, &globals)?;
    let started = Instant::now();

    if let Err(error) = self.run(&code) {
      return Err(self.handle_runtime_error(error));
    }

    let report = NetReport {
      interactions: self.machines.iter().map(|machine| machine.interactions).sum(),
      workers     : self.machines.len(),
      elapsed     : started.elapsed(),
    };
    crate::info!(1, "{}", report);
    self.log_memory_usage();

    Ok(report)
  }

  /// What the compiler needs to know about every live global name.
  fn global_info(&self) -> HashMap<IString, GlobalInfo> {
    let runtime = &self.runtime;
    runtime
        .names
        .live()
        .filter_map(|(_, ident, name)| {
          let cell = name.cell()?;
          let info = GlobalInfo {
            bound      : runtime.name(cell).port().is_some(),
            occurrences: references_to(runtime, cell).0,
          };
          Some((IString::from(ident), info))
        })
        .collect()
  }

  fn run(&mut self, code: &[Word]) -> Result<(), RuntimeError> {
    let runtime = &self.runtime;
    for machine in self.machines.iter_mut() {
      machine.interactions = 0;
    }

    self.machines[0].requeue_deferred(runtime);
    self.machines[0].exec(runtime, code)?;

    if runtime.is_threaded() {
      run_workers(runtime, &mut self.machines)
    } else {
      self.machines[0].reduce(runtime)
    }
  }

  fn handle_runtime_error(&mut self, error: RuntimeError) -> EngineError {
    crate::error!(0, "{}", error);

    if self.runtime.is_threaded() || error.is_fatal() || !self.config.retrieve_on_error {
      self.poisoned = true;
      return EngineError::Fatal(error);
    }

    self.recover();
    EngineError::Runtime(error)
  }

  // endregion

  // region Global names

  fn global_cell(&self, ident: &str) -> Result<CellRef, EngineError> {
    self.runtime
        .names
        .lookup(ident)
        .and_then(|gid| self.runtime.names.cell(gid))
        .and_then(|name| name.cell())
        .ok_or_else(|| EngineError::UnknownName(ident.to_string()))
  }

  /// Frees the term connected to the global name `ident` and forgets the name.
  pub fn free_name(&mut self, ident: &str) -> Result<(), EngineError> {
    self.check_poisoned()?;
    let cell = self.global_cell(ident)?;

    let (count, referrer) = references_to(&self.runtime, cell);
    if count > 0 {
      let error = EngineError::NameInUse {
        name    : ident.to_string(),
        referrer: referrer.map_or("?", |gid| self.runtime.names.ident(gid)).to_string(),
      };
      crate::error!(0, "{}", error);
      return Err(error);
    }

    if let Some(term) = self.runtime.name(cell).port() {
      free_term(&self.runtime, Some(cell), term);
    }
    self.runtime.free_name(cell);
    self.log_memory_usage();
    Ok(())
  }

  /// The term connected to the global name `ident`, as text.
  pub fn print_name(&self, ident: &str) -> Result<String, EngineError> {
    let cell = self.global_cell(ident)?;
    Ok(print_name(&self.runtime, cell))
  }

  /// What the global name `ident` is connected to, through any connected local names. `None` if it is unknown or
  /// not connected yet.
  pub fn value_of(&self, ident: &str) -> Option<Value> {
    let cell      = self.global_cell(ident).ok()?;
    let mut value = self.runtime.name(cell).port()?;
    while let Value::Name(next) = value {
      match self.runtime.name(next).port() {
        Some(port) => value = port,
        None => break,
      }
    }
    Some(value)
  }

  // endregion

  // region Memory

  /// Live cells, found by scanning the heaps.
  pub fn usage(&self) -> HeapUsage {
    self.runtime.usage()
  }

  /// Live cells, according to the allocation counters. Agrees with `usage` unless cells were lost.
  pub fn counted_usage(&self) -> HeapUsage {
    self.runtime.counted_usage()
  }

  /// Frees every cell that neither a global name nor a deferred equation can reach, and drops pending equations.
  pub fn recover(&mut self) -> HeapUsage {
    mark_and_sweep(&self.runtime, &mut self.machines)
  }

  /// Starts over with empty tables and heaps and the same configuration.
  pub fn reset(&mut self) -> Result<(), EngineError> {
    *self = Engine::new(self.config.clone())?;
    Ok(())
  }

  fn log_memory_usage(&self) {
    if self.config.verbose_memory {
      crate::info!(1, "(memory usage: {})", self.usage());
    }
  }

  // endregion
}
