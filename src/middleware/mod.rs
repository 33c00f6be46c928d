/// Logging of every drain lifecycle hook
#[cfg(feature = "logging")]
pub mod logging;

/// Dispatch-to-resume latency measurement
#[cfg(feature = "timing")]
pub mod timing;

/// Per-event counters and latency statistics
#[cfg(feature = "metrics")]
pub mod metrics;
