//! Error types for qauth-core.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for qauth-core operations.
pub type Result<T> = std::result::Result<T, QauthError>;

/// Every failure the core can report.
///
/// A rejected one-time code is not an error: verification returns `false`.
#[derive(Error, Debug)]
pub enum QauthError {
    /// No secret stored for this identity.
    #[error("no secret found for {0}")]
    NotFound(String),

    /// Malformed identity, code, guess or secret text.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The fallback seed queue has no entries left.
    #[error("seed queue exhausted: {}", .0.display())]
    QueueExhausted(PathBuf),

    /// The acquisition window closed before enough bits were extracted.
    #[error("acquisition yielded {got} of {needed} bits in {elapsed:.2?}")]
    AcquisitionTimeout {
        /// Bits the caller asked for.
        needed: usize,
        /// Bits actually extracted.
        got: usize,
        /// Instrument-reported measurement time.
        elapsed: Duration,
    },

    /// The instrument stayed locked past the preparation timeout.
    #[error("instrument still busy after {0:.1?}")]
    InstrumentBusy(Duration),

    /// Acquisition aborted through a cancel token.
    #[error("acquisition cancelled")]
    Cancelled,

    /// Failure reported by an instrument adapter.
    #[error("instrument error: {0}")]
    Instrument(String),

    /// Missing or inconsistent configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage I/O error.
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl QauthError {
    /// Whether retrying the same request can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AcquisitionTimeout { .. } | Self::InstrumentBusy(_)
        )
    }
}
