//! Error types for the CSI processing core.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Payload outside the `[r0, i0, r1, i1, ...]` grammar.
    #[error("malformed CSI record: {0}")]
    MalformedRecord(String),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("insufficient data: need {required} points, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),

    #[error("subcarrier count mismatch at row {row}: expected {expected}, got {actual}")]
    SubcarrierMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

impl Error {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Whether the error only invalidates a single record.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::MalformedRecord(_) | Error::InsufficientData { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
