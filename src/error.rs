//! Error types for lshforest.

use std::time::Duration;

use thiserror::Error;

use crate::persistence::PersistenceError;

/// Errors that can occur during construction, indexing and search.
#[derive(Debug, Error)]
pub enum ForestError {
    /// Invalid construction parameter (signature length, threshold, encoding width).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A signature whose length is neither the configured length nor `rows_per_band * num_bands`.
    #[error("signature length mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Operation not allowed in the forest's current phase.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A deadline-bounded query did not finish in time.
    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    /// The OS refused a query probe thread.
    #[error("failed to spawn query thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// Dump or load failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl ForestError {
    /// True for errors caused by bad construction parameters or signature shape.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ForestError::InvalidParameter(_) | ForestError::DimensionMismatch { .. }
        )
    }
}

impl From<std::io::Error> for ForestError {
    fn from(e: std::io::Error) -> Self {
        Self::Persistence(PersistenceError::Io(e))
    }
}

pub type Result<T> = std::result::Result<T, ForestError>;
