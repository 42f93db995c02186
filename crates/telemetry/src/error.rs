//! Error types for metric sampling.

use std::time::Duration;

/// Errors produced while reading or interpreting host metrics.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    /// The OS facility could not be queried (permission, missing counter,
    /// device absent).
    #[error("metric unavailable: {0}")]
    Unavailable(String),

    /// A temperature reading fell outside the plausibility bound.
    #[error("implausible temperature reading: {celsius}°C")]
    Implausible { celsius: f64 },

    /// A probe did not return within its bound.
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),
}

impl SampleError {
    /// Creates an [`SampleError::Unavailable`] from anything displayable.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    /// Whether the failure is a stall that may clear on the next cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
