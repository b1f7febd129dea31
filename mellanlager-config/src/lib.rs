//! # Mellanlager Configuration System
//!
//! Hierarchical configuration for the mellanlager proxy/cache core.
//!
//! ## Features
//! - **Unified Configuration**: one source of truth for the core's knobs
//! - **Validation**: runtime validation of critical parameters
//! - **Environment Awareness**: `MELLANLAGER_*` variables override files
//!
//! Out-of-range buffer sizes are not rejected here beyond basic sanity:
//! the bootstrap clamps them to the nearest size-class boundary, by
//! policy.

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod error;
mod io;
mod scheduler;
mod validation;

pub use error::ConfigError;
pub use io::IoConfig;
pub use scheduler::SchedulerConfig;

/// Top-level configuration container for the mellanlager core.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct MellanlagerConfig {
    /// I/O buffer sizing (`io.max_buffer_size` and friends).
    #[validate(nested)]
    pub io: IoConfig,

    /// Event processor sizing and wait behavior.
    #[validate(nested)]
    pub scheduler: SchedulerConfig,
}

impl MellanlagerConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/mellanlager.yaml`: base settings. Missing file is fine.
    /// 3. `MELLANLAGER_*` environment variables (`__` section separator).
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(MellanlagerConfig::default()));

        if Path::new("config/mellanlager.yaml").exists() {
            figment = figment.merge(Yaml::file("config/mellanlager.yaml"));
        }

        figment
            .merge(Env::prefixed("MELLANLAGER_").split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }

    /// Load configuration from a specific path, for tests and tooling.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Figment::from(Serialized::defaults(MellanlagerConfig::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("MELLANLAGER_").split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = MellanlagerConfig::default();
        config.validate().expect("default config should validate");
    }

    #[test]
    fn yaml_overrides_defaults() {
        let dir = std::env::temp_dir().join("mellanlager-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("override.yaml");
        std::fs::write(
            &path,
            "io:\n  max_buffer_size: 8192\nscheduler:\n  worker_threads: 3\n",
        )
        .unwrap();

        let config = MellanlagerConfig::load_from_path(&path).unwrap();
        assert_eq!(config.io.max_buffer_size, 8192);
        assert_eq!(config.scheduler.worker_threads, 3);
        // Untouched sections keep their defaults.
        assert_eq!(
            config.scheduler.idle_wait_ms,
            SchedulerConfig::default().idle_wait_ms
        );
    }

    #[test]
    fn missing_file_is_reported() {
        let err = MellanlagerConfig::load_from_path("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn non_power_of_two_buffer_size_fails_validation() {
        let dir = std::env::temp_dir().join("mellanlager-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("badsize.yaml");
        std::fs::write(&path, "io:\n  max_buffer_size: 10000\n").unwrap();

        let err = MellanlagerConfig::load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
