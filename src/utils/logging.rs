//! Logging macros gated on a module-level `ENABLE_LOGS` flag.
//!
//! The frame pipeline and the stabilizer log on every tick; gating them per
//! module keeps `RUST_LOG=debug` usable while tuning one stage at a time.
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//! use crate::{log_debug, log_warn};
//!
//! log_debug!("frame {} produced {} shapes", frame_id, count);
//! ```

/// Forwards to a `log` macro when the calling module's `ENABLE_LOGS` is set.
#[macro_export]
macro_rules! log_gated {
    ($level:ident, $($arg:tt)*) => {
        if ENABLE_LOGS {
            log::$level!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::log_gated!(debug, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::log_gated!(info, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::log_gated!(warn, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::log_gated!(error, $($arg)*)
    };
}
