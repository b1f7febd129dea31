//! # Mellanlager Telemetry
//!
//! Structured logging and metrics for the mellanlager core.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
