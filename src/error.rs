//! Error types for rule evaluation and cache storage
//!
//! Only genuine failures are errors. A rule that does not match a request and
//! a key that is not in the cache are both reported as `Ok(None)`.

use thiserror::Error;

/// Main error type for the hrc library
#[derive(Error, Debug)]
pub enum HrcError {
    /// Invalid rule or storage configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Callback identifier is not of the form `Owner::operation`
    #[error("Invalid callback '{identifier}': expected format Owner::operation")]
    InvalidCallback { identifier: String },

    /// Callback identifier is well-formed but nothing is registered under it
    #[error("Unknown callback: {0}")]
    UnknownCallback(String),

    /// Key cannot be mapped onto the storage layout
    #[error("Invalid cache key: '{0}'")]
    InvalidKey(String),

    /// Storage I/O failure
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

impl HrcError {
    /// Whether this error signals a misconfiguration rather than a runtime fault.
    ///
    /// Configuration errors are not recoverable locally and should be surfaced
    /// to the operator.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            HrcError::ConfigError(_)
                | HrcError::InvalidCallback { .. }
                | HrcError::UnknownCallback(_)
        )
    }
}

/// Result type alias for hrc operations
pub type Result<T> = std::result::Result<T, HrcError>;

impl From<String> for HrcError {
    fn from(s: String) -> Self {
        HrcError::Other(s)
    }
}

impl From<&str> for HrcError {
    fn from(s: &str) -> Self {
        HrcError::Other(s.to_string())
    }
}
