//! Ready-made stages, each behind its own cargo feature.
//!
//! Every stage keeps its settings in its constructor arguments, so a fresh
//! instance is built from the same config on every invoke. State that must
//! survive across invokes (timings, metrics) lives in a shared handle inside
//! those arguments.

/// Logging stage built on `tracing`
#[cfg(feature = "logging")]
pub mod logging;

/// Wall-clock timing of the rest of the chain
#[cfg(feature = "timing")]
pub mod timing;

/// Retry stage with backoff strategies
#[cfg(feature = "retry")]
pub mod retry;

/// Metrics collection stage
#[cfg(feature = "metrics")]
pub mod metrics;
