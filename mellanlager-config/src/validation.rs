//! Custom validation functions for configuration.

use validator::ValidationError;

/// Validate that a given value is a power of two.
pub fn validate_power_of_two(value: usize) -> Result<(), ValidationError> {
    if value.is_power_of_two() {
        Ok(())
    } else {
        Err(ValidationError::new("must_be_power_of_two"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_powers_of_two() {
        for v in [128usize, 4096, 32768, 2097152] {
            assert!(validate_power_of_two(v).is_ok());
        }
    }

    #[test]
    fn rejects_other_values() {
        for v in [0usize, 100, 10000] {
            assert!(validate_power_of_two(v).is_err());
        }
    }
}
