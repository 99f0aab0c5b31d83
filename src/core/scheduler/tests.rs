use std::{sync::Arc, thread};

use crate::{
  api::value::Value,
  core::scheduler::{Scheduler, Worklist},
};

#[test]
fn test_worklist_grows_when_full() {
  let mut worklist = Worklist::with_capacity(2);
  for n in 0..5 {
    worklist.push(Value::Int(n), Value::Int(-n));
  }

  assert_eq!(worklist.len(), 5);
  assert!(worklist.capacity() >= 5);
  assert_eq!(worklist.pop(), Some((Value::Int(4), Value::Int(-4))));
}

#[test]
fn test_split_off_top_keeps_order() {
  let mut worklist = Worklist::with_capacity(4);
  for n in 0..4 {
    worklist.push(Value::Int(n), Value::Int(n));
  }

  let top = worklist.split_off_top(3);
  assert_eq!(top.iter().map(|(left, _)| *left).collect::<Vec<_>>(), vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
  assert_eq!(worklist.len(), 1);

  let mut other = Worklist::with_capacity(1);
  other.extend(top);
  assert_eq!(other.pop(), Some((Value::Int(3), Value::Int(3))));

  // Asking for more than there is takes everything.
  assert_eq!(worklist.split_off_top(10).len(), 1);
  assert!(worklist.is_empty());
}

#[test]
fn test_single_idle_worker_finishes() {
  let scheduler = Scheduler::new(4);
  scheduler.start(1);

  assert_eq!(scheduler.idle(), None);
  assert!(scheduler.is_finished());
  assert!(!scheduler.has_sleepers());
}

#[test]
fn test_idle_worker_receives_shared_work() {
  let scheduler = Arc::new(Scheduler::new(4));
  scheduler.start(2);

  let sleeper = {
    let scheduler = Arc::clone(&scheduler);
    thread::spawn(move || scheduler.idle())
  };

  while !scheduler.has_sleepers() {
    thread::yield_now();
  }
  scheduler.push(Value::Int(1), Value::Int(2));

  assert_eq!(sleeper.join().unwrap(), Some((Value::Int(1), Value::Int(2))));
  assert!(!scheduler.is_finished());
}

#[test]
fn test_abort_releases_sleepers() {
  let scheduler = Arc::new(Scheduler::new(4));
  scheduler.start(3);

  let sleeper = {
    let scheduler = Arc::clone(&scheduler);
    thread::spawn(move || scheduler.idle())
  };

  while !scheduler.has_sleepers() {
    thread::yield_now();
  }
  scheduler.abort();

  assert_eq!(sleeper.join().unwrap(), None);
  assert!(scheduler.is_finished());
}

#[test]
fn test_recovery_can_empty_the_shared_worklist() {
  let scheduler = Scheduler::new(4);
  scheduler.with_shared(|shared| shared.push(Value::Int(7), Value::Int(8)));
  assert_eq!(scheduler.with_shared(|shared| shared.len()), 1);

  scheduler.with_shared(|shared| shared.clear());
  assert!(scheduler.with_shared(|shared| shared.is_empty()));
}

#[test]
fn test_concurrent_pushes_are_all_kept() {
  let scheduler = Scheduler::new(2);

  thread::scope(|scope| {
    for worker in 0..4 {
      let scheduler = &scheduler;
      scope.spawn(move || {
        for n in 0..1000 {
          scheduler.push(Value::Int(worker), Value::Int(n));
        }
      });
    }
  });

  assert_eq!(scheduler.with_shared(|shared| shared.len()), 4000);
  let total: i64 = scheduler.with_shared(|shared| {
    shared.iter().map(|(_, right)| right.as_int().unwrap_or_default()).sum()
  });
  assert_eq!(total, 4 * (0..1000).sum::<i64>());
}
