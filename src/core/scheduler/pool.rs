/*!

Running a net on several workers. Workers are scoped threads, one per machine, started for each net and joined
before the engine looks at the heap again.

*/

use std::thread;

use crate::core::{
  machine::{Machine, RuntimeError},
  scheduler::Scheduler,
  Runtime,
};

/// Wakes the other workers if this one unwinds, so that they do not wait for it forever.
struct AbortOnPanic<'a>(&'a Scheduler);

impl Drop for AbortOnPanic<'_> {
  fn drop(&mut self) {
    if thread::panicking() {
      self.0.abort();
    }
  }
}

/// Moves contiguous runs of the initial equations from the first machine to the others.
fn distribute(machines: &mut [Machine]) {
  let Some((first, rest)) = machines.split_first_mut() else {
    return;
  };
  let workers = rest.len() + 1;
  let share   = (first.worklist.len() / workers).max(1);

  for machine in rest {
    if first.worklist.is_empty() {
      break;
    }
    machine.worklist.extend(first.worklist.split_off_top(share));
  }
}

/// Reduces until no equation is left on any worker. The first error any worker meets stops all of them.
pub(crate) fn run_workers(runtime: &Runtime, machines: &mut [Machine]) -> Result<(), RuntimeError> {
  runtime.scheduler.start(machines.len());
  distribute(machines);

  let results: Vec<Result<(), RuntimeError>> = thread::scope(|scope| {
    let mut handles = Vec::with_capacity(machines.len());

    for machine in machines.iter_mut() {
      let spawned = thread::Builder::new()
          .name(format!("worker-{}", machine.id))
          .spawn_scoped(scope, move || {
            let _guard = AbortOnPanic(&runtime.scheduler);
            machine.work(runtime)
          });

      match spawned {
        Ok(handle) => handles.push(Ok(handle)),
        Err(error) => {
          // Without this worker the others would wait for it forever.
          runtime.scheduler.abort();
          handles.push(Err(RuntimeError::WorkerFailed(error.to_string())));
        }
      }
    }

    handles
        .into_iter()
        .map(|handle| match handle {
          Ok(handle) => handle
              .join()
              .unwrap_or_else(|_| Err(RuntimeError::WorkerFailed("worker panicked".to_string()))),
          Err(error) => Err(error),
        })
        .collect()
  });

  results.into_iter().collect::<Result<Vec<()>, RuntimeError>>().map(|_| ())
}
