//! Error type for configuration loading and validation.

use std::path::PathBuf;
use thiserror::Error;
use validator::ValidationErrors;

/// Everything that can go wrong between a config source and a validated
/// [`MellanlagerConfig`](crate::MellanlagerConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config path does not exist. The default
    /// search path is allowed to be absent; an explicit one is not.
    #[error("config file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The merged configuration parsed but failed validation.
    #[error("invalid configuration:\n{}", render_field_errors(.0))]
    Validation(#[source] ValidationErrors),

    /// A figment source could not be read or deserialized.
    #[error("config parsing error: {0}")]
    Parsing(#[from] figment::Error),
}

/// One line per offending field, so a misconfigured deployment fails
/// with every problem listed at once.
fn render_field_errors(errors: &ValidationErrors) -> String {
    use std::fmt::Write;

    let mut output = String::new();
    for (field, errors) in errors.field_errors() {
        for error in errors {
            let reason = error
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| error.code.to_string());
            let _ = writeln!(output, "  {field}: {reason}");
        }
    }
    output
}

impl From<ValidationErrors> for ConfigError {
    fn from(errors: ValidationErrors) -> Self {
        ConfigError::Validation(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sized {
        #[validate(range(min = 128, message = "too small"))]
        bytes: usize,
    }

    #[test]
    fn validation_errors_list_every_field() {
        let err: ConfigError = Sized { bytes: 1 }.validate().unwrap_err().into();
        let text = err.to_string();
        assert!(text.contains("bytes"));
        assert!(text.contains("too small"));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = ConfigError::FileNotFound(PathBuf::from("config/absent.yaml"));
        assert!(err.to_string().contains("config/absent.yaml"));
    }
}
