//! Macros for generating log messages.
//!
//! Every public macro funnels into `__log_event!`, which makes sure the logger exists and then emits a `tracing`
//! event carrying the `threshold` field read by `ThresholdFilterLayer`.

#[doc(hidden)]
#[macro_export]
macro_rules! __log_event {
    ($level:expr, $threshold:expr, $($arg:tt)+) => {
        {
            $crate::log::init_logger();
            tracing::event!(
                $level,
                threshold = $threshold,
                message = format_args!($($arg)+)
            );
        }
    };
}

#[macro_export]
macro_rules! critical {
    ($threshold:expr, $($arg:tt)+) => {
        {
            $crate::log::init_logger();
            tracing::event!(
                tracing::Level::ERROR,
                critical = true,
                threshold = $threshold,
                message = format_args!($($arg)+)
            );
        }
    };
    ($($arg:tt)+) => {
        $crate::critical!(0, $($arg)+)
    };
}

#[macro_export]
macro_rules! error {
    ($threshold:expr, $($arg:tt)+) => {
        $crate::__log_event!(tracing::Level::ERROR, $threshold, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__log_event!(tracing::Level::ERROR, 0, $($arg)+)
    };
}

#[macro_export]
macro_rules! warning {
    ($threshold:expr, $($arg:tt)+) => {
        $crate::__log_event!(tracing::Level::WARN, $threshold, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__log_event!(tracing::Level::WARN, 0, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($threshold:expr, $($arg:tt)+) => {
        $crate::__log_event!(tracing::Level::INFO, $threshold, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__log_event!(tracing::Level::INFO, 0, $($arg)+)
    };
}

#[macro_export]
macro_rules! debug {
    ($threshold:expr, $($arg:tt)+) => {
        $crate::__log_event!(tracing::Level::DEBUG, $threshold, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__log_event!(tracing::Level::DEBUG, 0, $($arg)+)
    };
}

#[macro_export]
macro_rules! trace {
    ($threshold:expr, $($arg:tt)+) => {
        $crate::__log_event!(tracing::Level::TRACE, $threshold, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__log_event!(tracing::Level::TRACE, 0, $($arg)+)
    };
}


// The following makes the macros importable directly from the `log` module.
pub use {critical, error, warning, info, debug, trace};
