//! I/O buffer configuration parameters.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

/// Largest I/O buffer the core will carve pools for when the operator
/// does not say otherwise: 32 KiB.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 32 * 1024;

/// I/O buffer sizing.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct IoConfig {
    /// Maximum I/O buffer size in bytes. The bootstrap clamps the buffer
    /// size-class table to the largest class not exceeding this value.
    #[serde(default = "default_max_buffer_size")]
    #[validate(range(min = 128, max = 2097152))]
    #[validate(custom(function = validation::validate_power_of_two))]
    pub max_buffer_size: usize,
}

fn default_max_buffer_size() -> usize {
    DEFAULT_MAX_BUFFER_SIZE
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: default_max_buffer_size(),
        }
    }
}
