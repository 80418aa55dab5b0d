//! Crate-local `tracing` macros.
//!
//! Every event goes to the `bulkload` target, so `RUST_LOG=bulkload=debug`
//! isolates this crate from driver noise. Call sites name the emitting
//! `component` (`runner`, `worker`, `schema`, `store` or `session`) and a
//! snake_case `event`, then add whatever measurements the event has.
//! Installing a subscriber is left to the binary.

/// Target for all bulk-load log events.
pub(crate) const BULKLOAD_TARGET: &str = "bulkload";

/// Macro for info-level log events.
///
/// # Example
/// ```ignore
/// log_info!(
///     component = "worker",
///     event = "shard_written",
///     shard = index,
///     rows = written,
/// );
/// ```
macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::BULKLOAD_TARGET, $($field)*)
    };
}

/// Macro for debug-level log events.
macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::BULKLOAD_TARGET, $($field)*)
    };
}

/// Macro for warn-level log events.
macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::BULKLOAD_TARGET, $($field)*)
    };
}

/// Macro for error-level log events.
macro_rules! log_error {
    ($($field:tt)*) => {
        ::tracing::error!(target: $crate::observability::BULKLOAD_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_error;
pub(crate) use log_info;
pub(crate) use log_warn;
