//! ## mellanlager-telemetry::logging
//! **Structured logging with `tracing`**

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the process-wide tracing subscriber. `RUST_LOG` selects
    /// the filter; defaults to `info`.
    ///
    /// # Panics
    /// If a global subscriber is already installed.
    pub fn init() {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_thread_names(true)
            .with_span_events(FmtSpan::ENTER)
            .init()
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn emits_through_tracing() {
        tracing::info!(subsystem = "scheduler", "dispatch loop started");
        assert!(logs_contain("dispatch loop started"));
    }
}
