//! Event processor configuration parameters.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Worker-thread pool sizing and idle-wait behavior.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct SchedulerConfig {
    /// Number of dispatch worker threads. Defaults to the CPU count.
    #[serde(default = "default_worker_threads")]
    #[validate(range(min = 1, max = 1024))]
    pub worker_threads: usize,

    /// Upper bound in milliseconds on how long an idle worker blocks
    /// before re-checking its queues.
    #[serde(default = "default_idle_wait_ms")]
    #[validate(range(min = 1, max = 1000))]
    pub idle_wait_ms: u64,
}

fn default_worker_threads() -> usize {
    num_cpus::get()
}

fn default_idle_wait_ms() -> u64 {
    10
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            idle_wait_ms: default_idle_wait_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        SchedulerConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_workers_is_rejected() {
        let config = SchedulerConfig {
            worker_threads: 0,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
