//! ## mellanlager-telemetry::metrics
//! **Prometheus counters for the scheduling and allocation core**

use prometheus::{Counter, Histogram, HistogramOpts, Registry};

/// Dispatch and allocation metrics, shareable across worker threads.
#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub dispatched_events: Counter,
    pub dispatch_latency_ns: Histogram,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        let registry = Registry::new();
        let dispatched_events = Counter::new(
            "mellanlager_dispatched_events_total",
            "Total events dispatched by the event processor",
        )
        .expect("valid counter spec");

        let dispatch_latency_ns = Histogram::with_opts(
            HistogramOpts::new(
                "mellanlager_dispatch_latency_ns",
                "Continuation dispatch time",
            )
            .buckets(vec![1_000.0, 10_000.0, 100_000.0, 1_000_000.0, 10_000_000.0]),
        )
        .expect("valid histogram spec");

        registry
            .register(Box::new(dispatched_events.clone()))
            .expect("unique collector");
        registry
            .register(Box::new(dispatch_latency_ns.clone()))
            .expect("unique collector");

        Self {
            registry,
            dispatched_events,
            dispatch_latency_ns,
        }
    }

    /// Records one completed dispatch.
    #[inline]
    pub fn record_dispatch(&self, latency_ns: u64) {
        self.dispatched_events.inc();
        self.dispatch_latency_ns.observe(latency_ns as f64);
    }

    /// Total dispatches recorded so far.
    pub fn dispatched_total(&self) -> u64 {
        self.dispatched_events.get() as u64
    }

    /// Renders the registry in the Prometheus text format.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("text format is utf-8"))
    }
}
