/*!

# Overview

Leveled, threshold-filtered logging for the runtime. The log level describes what _kind_ of message is emitted; the
numeric threshold describes how _verbose_ the logger must be for the message to appear.

```
use inpla::{error, info, log::set_global_logging_threshold, trace};

// Only messages logged at threshold 1 or lower are emitted from here on.
set_global_logging_threshold(1);

info!(1, "(12 interactions, 0.00 sec)");    // Emitted
info!(4, "new agent hoop of 32768 cells");  // Not emitted
trace!(5, "reduce Add ~ 3");                 // Not emitted
error!("There is no interaction rule for the following pair:"); // Always emitted
```

## Threshold

The global logging threshold is a single number shared by every level. A message logged at threshold `t` is emitted
when `t <= get_global_logging_threshold()`. A message logged without a threshold is logged at 0 and always emitted.
The default global threshold is 3.

The runtime uses the following thresholds:

| Threshold | Messages |
|:----------|:---------|
| 0 | compile errors, stuck terms, fatal heap exhaustion |
| 1 | interaction count and timing, memory usage summaries |
| 2 | arity mismatch warnings, compiler warnings |
| 3 | compiled code listings |
| 4 | heap growth |
| 5 | per-equation reduction trace |

```
use inpla::log::{set_global_logging_threshold, get_global_logging_threshold};

set_global_logging_threshold(5);
assert_eq!(get_global_logging_threshold(), 5);
```

# Macros

`critical!`, `error!`, `warning!`, `info!`, `debug!`, `trace!`, each with the syntax

```ignore
level!(threshold, "format string", args...);
level!("format string", args...); // threshold 0
```

The logger installs itself as the global `tracing` subscriber on first use. Worker threads are named, and the name
is printed with each message so interleaved output from parallel reduction can be told apart.

*/

mod formatter;
mod threshold_filter;
mod macros;

use std::sync::{
  atomic::{AtomicU8, Ordering},
  LazyLock
};

use tracing_subscriber::{
  fmt,
  layer::SubscriberExt,
  Registry
};

use threshold_filter::ThresholdFilterLayer;
use formatter::CustomFieldFormatter;
pub use macros::*;

/// Used for implicit initialization.
static INIT_LOGGER: LazyLock<()> = LazyLock::new(|| {
  let subscriber = Registry::default()
      .with(ThresholdFilterLayer)
      .with(
        fmt::layer()
            .fmt_fields(CustomFieldFormatter)
            .with_target(false)
            .with_thread_names(true)
            .without_time()
            .with_writer(std::io::stdout),
      );

  // An embedding application may have installed its own subscriber already. Its choice wins.
  let _ = tracing::subscriber::set_global_default(subscriber);
});

/// This does not need to be called directly. Initializes the logging system.
pub fn init_logger() {
  LazyLock::force(&INIT_LOGGER);
}

static GLOBAL_LOGGING_THRESHOLD: AtomicU8 = AtomicU8::new(3); // Default threshold

/// Sets the global threshold. May be called before or after the logger is initialized.
pub fn set_global_logging_threshold(new_threshold: u8) {
  GLOBAL_LOGGING_THRESHOLD.store(new_threshold, Ordering::SeqCst);
}

/// Retrieves the global threshold.
pub fn get_global_logging_threshold() -> u8 {
  GLOBAL_LOGGING_THRESHOLD.load(Ordering::SeqCst)
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_logging_thresholds() {
    let interactions = 42;

    set_global_logging_threshold(3);
    info!(1, "({} interactions, 0.00 sec)", interactions);
    debug!(4, "NOT logged: new name hoop");
    warning!("The agent `Foo' has been previously defined of arity 1, but is now used of arity 2.");
    error!(5, "NOT logged: {}", interactions);
    critical!(1, "All {} term cells have been consumed.", 100000);

    set_global_logging_threshold(5);
    trace!(5, "reduce {} ~ {}", "Add(r,4)", 3);

    set_global_logging_threshold(3);
    assert_eq!(get_global_logging_threshold(), 3);
  }
}
