//! Error types for persistence operations.

use thiserror::Error;

/// Errors that can occur while dumping or loading a forest.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// I/O error (file operations, disk I/O)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Format error (invalid magic bytes, version mismatch, corruption)
    #[error("format error: {0}")]
    Format(String),

    /// The dump was written by a forest with a different configuration.
    #[error("configuration mismatch on {field}: file has {actual}, forest has {expected}")]
    ConfigMismatch {
        field: &'static str,
        expected: u64,
        actual: u64,
    },

    /// Serialization error (postcard)
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

#[cfg(feature = "persistence")]
impl From<postcard::Error> for PersistenceError {
    fn from(e: postcard::Error) -> Self {
        Self::Serialization(format!("postcard error: {}", e))
    }
}

/// Result type for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;
