//! Validation errors for the key sentinel algebra.
//!
//! These are user errors: recoverable, surfaced to the caller rather than
//! panicking.

use thiserror::Error;

/// Errors raised when a [`crate::Key`] is used somewhere its sentinel form
/// is not permitted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// A point-lock API (`readLock`/`writeLock`) was given a sentinel key.
    /// Point locks only operate on concrete keys.
    #[error("point lock operations reject sentinel keys, got {0:?}")]
    SentinelNotAllowedAsPointKey(crate::Key),

    /// A range-lock API was given `NULL` or `ANY` as an endpoint. Only
    /// concrete keys, `FIRST`, and `LAST` are valid range endpoints.
    #[error("range endpoints cannot be NULL or ANY, got {0:?}")]
    SentinelNotAllowedAsRangeEndpoint(crate::Key),

    /// A range's start sorts after its end under the key ordering.
    #[error("range start {start:?} does not precede end {end:?}")]
    InvertedRange {
        /// The offending start bound.
        start: crate::Key,
        /// The offending end bound.
        end: crate::Key,
    },
}

impl KeyError {
    /// Stable reason code for callers that want to match without the
    /// `Debug` payload (mirrors the teacher's `KeyError::reason_code`).
    pub fn reason_code(&self) -> &'static str {
        match self {
            KeyError::SentinelNotAllowedAsPointKey(_) => "sentinel_as_point_key",
            KeyError::SentinelNotAllowedAsRangeEndpoint(_) => "sentinel_as_range_endpoint",
            KeyError::InvertedRange { .. } => "inverted_range",
        }
    }
}
