//! Error types shared across the workspace.

/// A required setting was absent or unusable.
///
/// Raised by the `from_env` constructors so misconfiguration surfaces at
/// startup instead of on the first request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The variable is not set (or is empty).
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    /// The variable is set but its value cannot be used.
    #[error("Invalid value for {name}: {reason}")]
    Invalid {
        /// Environment variable name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// An input image failed validation before any network call was made.
///
/// Never retried: the same input will always fail the same way.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} {reason}")]
pub struct ValidationError {
    /// Human label of the offending input, e.g. `"Model image"`.
    pub field: String,
    /// What is wrong with it.
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}
