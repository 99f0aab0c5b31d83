/*!

Coordination of parallel workers.

Each worker reduces equations from its own worklist. A worker that runs dry goes to sleep on a condition variable
after bumping the sleeper count. While anyone sleeps, machines push new equations to the shared worklist instead of
their own, and each such push wakes one sleeper.

The run is over when every worker sleeps and the shared worklist is empty. A worker only sleeps with an empty
worklist of its own, so that condition means no work is left anywhere. The last worker to fall asleep confirms it
once more after a short delay before declaring the run finished, which rules out a push that raced with its check.

*/

mod pool;
mod worklist;
#[cfg(test)]
mod tests;

use std::{
  sync::atomic::{AtomicBool, AtomicUsize, Ordering::{AcqRel, Acquire, Release}},
  time::Duration,
};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::api::value::Value;

pub(crate) use pool::run_workers;
pub use worklist::{Equation, Worklist};

/// How long the last sleeper waits before confirming that the run is over.
const QUIESCENCE_DELAY: Duration = Duration::from_millis(10);

pub struct Scheduler {
  shared  : Mutex<Worklist>,
  workers : AtomicUsize,
  sleepers: AtomicUsize,
  finished: AtomicBool,
  lock    : Mutex<()>,
  wake    : Condvar,
}

impl Scheduler {
  pub fn new(capacity: usize) -> Self {
    Scheduler {
      shared  : Mutex::new(Worklist::with_capacity(capacity)),
      workers : AtomicUsize::new(1),
      sleepers: AtomicUsize::new(0),
      finished: AtomicBool::new(false),
      lock    : Mutex::new(()),
      wake    : Condvar::new(),
    }
  }

  /// Prepares for a run with `workers` workers.
  pub fn start(&self, workers: usize) {
    self.workers.store(workers.max(1), Release);
    self.sleepers.store(0, Release);
    self.finished.store(false, Release);
  }

  #[inline(always)]
  pub fn has_sleepers(&self) -> bool {
    self.sleepers.load(Acquire) > 0
  }

  #[inline(always)]
  pub fn is_finished(&self) -> bool {
    self.finished.load(Acquire)
  }

  /// Hands an equation to a sleeping worker.
  pub fn push(&self, left: Value, right: Value) {
    self.shared.lock().push(left, right);
    let _guard = self.sleep_lock();
    self.wake.notify_one();
  }

  /// Stops every worker, e.g. after a fatal error.
  pub fn abort(&self) {
    self.finished.store(true, Release);
    let _guard = self.sleep_lock();
    self.wake.notify_all();
  }

  /// Blocks until there is shared work or the run is over. Returns `None` in the latter case.
  pub fn idle(&self) -> Option<Equation> {
    let mut guard = self.sleep_lock();
    self.sleepers.fetch_add(1, AcqRel);
    let mut confirmed_quiet = false;

    loop {
      if self.is_finished() {
        break;
      }
      if let Some(equation) = self.shared.lock().pop() {
        self.sleepers.fetch_sub(1, AcqRel);
        return Some(equation);
      }

      if self.sleepers.load(Acquire) == self.workers.load(Acquire) {
        if confirmed_quiet {
          crate::trace!(5, "all {} workers are idle", self.workers.load(Acquire));
          self.finished.store(true, Release);
          self.wake.notify_all();
          break;
        }
        confirmed_quiet = true;
      } else {
        confirmed_quiet = false;
      }

      self.wake.wait_for(&mut guard, QUIESCENCE_DELAY);
    }

    self.sleepers.fetch_sub(1, AcqRel);
    None
  }

  /// Runs `f` on the shared worklist. Used by recovery, which empties every worklist.
  pub fn with_shared<R>(&self, f: impl FnOnce(&mut Worklist) -> R) -> R {
    f(&mut self.shared.lock())
  }

  fn sleep_lock(&self) -> MutexGuard<'_, ()> {
    self.lock.lock()
  }
}
