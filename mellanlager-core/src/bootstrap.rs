//! ## mellanlager-core::bootstrap
//! **One-time process-wide initialization**
//!
//! Checks the caller's expected module version against the core's,
//! clamps the buffer size-class table from configuration, builds the
//! per-class allocators, and starts the worker-thread pool. Runs once at
//! process start; everything it produces is handed around explicitly.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use mellanlager_config::MellanlagerConfig;
use mellanlager_telemetry::MetricsRecorder;

use crate::buffer::BufferPool;
use crate::events::EventProcessor;

/// Interface version of the event-system core. Callers compiled against
/// a different major version must not run against this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleVersion {
    pub major: u16,
    pub minor: u16,
}

impl ModuleVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Compatible when majors match and the caller does not expect a
    /// newer minor than this core provides.
    pub fn is_compatible_with(&self, current: ModuleVersion) -> bool {
        self.major == current.major && self.minor <= current.minor
    }
}

impl std::fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Current contract version of the scheduling + allocation core.
pub const EVENT_SYSTEM_MODULE_VERSION: ModuleVersion = ModuleVersion::new(1, 0);

/// The initialized core: buffer pools plus the running event processor.
pub struct EventSystem {
    buffers: Arc<BufferPool>,
    processor: EventProcessor,
}

impl EventSystem {
    pub fn buffers(&self) -> &Arc<BufferPool> {
        &self.buffers
    }

    pub fn processor(&self) -> &EventProcessor {
        &self.processor
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        self.processor.metrics()
    }

    /// Stops the worker pool. Process teardown only.
    pub fn shutdown(&self) {
        self.processor.shutdown();
    }
}

/// Initializes the event system: version check, buffer size-class clamp,
/// per-class allocators, worker threads.
///
/// # Panics
/// If `version` is incompatible with [`EVENT_SYSTEM_MODULE_VERSION`].
/// Continuing with an inconsistent buffer or scheduling model is unsafe,
/// so this is a fatal startup assertion with no recovery path.
pub fn init_event_system(
    version: ModuleVersion,
    config: &MellanlagerConfig,
    metrics: Arc<MetricsRecorder>,
) -> EventSystem {
    assert!(
        version.is_compatible_with(EVENT_SYSTEM_MODULE_VERSION),
        "event system module version mismatch: caller expects {version}, core is {EVENT_SYSTEM_MODULE_VERSION}"
    );

    info!(
        max_buffer_size = config.io.max_buffer_size,
        worker_threads = config.scheduler.worker_threads,
        "initializing event system"
    );

    let buffers = Arc::new(BufferPool::new(config.io.max_buffer_size));
    let processor = EventProcessor::start(
        config.scheduler.worker_threads,
        Duration::from_millis(config.scheduler.idle_wait_ms),
        metrics,
    );

    EventSystem { buffers, processor }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::DEFAULT_LARGE_BUFFER_INDEX;
    use crate::events::{Affinity, EventCode, EventHandle, HandlerStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_config(max_buffer_size: usize) -> MellanlagerConfig {
        let mut config = MellanlagerConfig::default();
        config.io.max_buffer_size = max_buffer_size;
        config.scheduler.worker_threads = 2;
        config.scheduler.idle_wait_ms = 1;
        config
    }

    #[test]
    fn bootstraps_pool_and_processor_from_config() {
        let system = init_event_system(
            EVENT_SYSTEM_MODULE_VERSION,
            &test_config(8192),
            Arc::new(MetricsRecorder::new()),
        );

        // 8192 bytes clamps the table at index 6; the 4 KiB large preset
        // fits below the clamp and survives.
        assert_eq!(system.buffers().max_index(), 6);
        assert_eq!(system.buffers().large_index(), DEFAULT_LARGE_BUFFER_INDEX);
        assert_eq!(system.processor().worker_count(), 2);

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in = fired.clone();
        system
            .processor()
            .schedule_immediate(
                Arc::new(move |_: EventCode, _: &EventHandle| {
                    fired_in.fetch_add(1, Ordering::SeqCst);
                    HandlerStatus::Done
                }),
                Affinity::Any,
            )
            .unwrap();

        let start = std::time::Instant::now();
        while fired.load(Ordering::SeqCst) == 0 && start.elapsed().as_secs() < 2 {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        system.shutdown();
    }

    #[test]
    fn older_minor_callers_are_accepted() {
        let system = init_event_system(
            ModuleVersion::new(EVENT_SYSTEM_MODULE_VERSION.major, 0),
            &test_config(32768),
            Arc::new(MetricsRecorder::new()),
        );
        system.shutdown();
    }

    #[test]
    #[should_panic(expected = "module version mismatch")]
    fn incompatible_module_version_is_fatal() {
        init_event_system(
            ModuleVersion::new(EVENT_SYSTEM_MODULE_VERSION.major + 1, 0),
            &test_config(32768),
            Arc::new(MetricsRecorder::new()),
        );
    }
}
