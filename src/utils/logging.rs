//! Logging macros gated by a module-level `ENABLE_LOGS` flag.
//!
//! Chatty modules (the connection supervisor) define the flag and log through
//! these so their output can be silenced in one place:
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_info, log_warn};
//!
//! log_info!("Reconnecting in {}ms", 3000);
//! ```

/// Logs at `$level` when the calling module's `ENABLE_LOGS` is true.
#[doc(hidden)]
#[macro_export]
macro_rules! log_gated {
    ($level:expr, $($arg:tt)+) => {
        if ENABLE_LOGS {
            ::log::log!($level, $($arg)+);
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => { $crate::log_gated!(::log::Level::Info, $($arg)+) };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)+) => { $crate::log_gated!(::log::Level::Warn, $($arg)+) };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => { $crate::log_gated!(::log::Level::Error, $($arg)+) };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => { $crate::log_gated!(::log::Level::Debug, $($arg)+) };
}
