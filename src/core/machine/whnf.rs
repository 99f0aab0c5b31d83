/*!

The weak head normal form strategy. Only equations that can still affect a global name are reduced; the others are
set aside and put back on the worklist before the next net, when a later net may make them relevant.

*/

use crate::{
  api::value::Value,
  core::{
    machine::{free::Walk, print_term, Machine, RuntimeError, DEFERRED_LIMIT},
    Runtime,
  },
};

/// Whether a global name occurs anywhere in `term`.
pub(crate) fn has_global_name(rt: &Runtime, term: Value) -> bool {
  Walk::new(rt, term).any(|value| match value {
    Value::Name(cell) => rt.name(cell).global_id().is_some(),
    _ => false,
  })
}

impl Machine {
  pub(crate) fn reduce_to_whnf(&mut self, rt: &Runtime, left: Value, right: Value) -> Result<(), RuntimeError> {
    if has_global_name(rt, left) || has_global_name(rt, right) {
      return self.eval_equation(rt, left, right);
    }

    if self.deferred.len() >= DEFERRED_LIMIT {
      return Err(RuntimeError::DeferredOverflow { limit: DEFERRED_LIMIT });
    }
    if crate::log::get_global_logging_threshold() >= 5 {
      crate::trace!(5, "deferred: {} ~ {}", print_term(rt, left), print_term(rt, right));
    }
    self.deferred.push((left, right));
    Ok(())
  }
}
