//! Error types for the log engine.

use sealog_chain::ChainError;

/// Failures surfaced by the log manager.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// A time-stamping round failed. The backlog entries of the round are
    /// restored for retry.
    #[error("time-stamping failed: {message}")]
    Timestamping {
        /// Responder the round was sent to, when known.
        url: Option<String>,
        message: String,
    },

    /// Periodic time-stamping has been failing longer than the acceptable
    /// period; new messages are refused until a round succeeds.
    #[error("time-stamping failing for {for_secs} s, refusing new messages")]
    TimestampingStalled { for_secs: u64 },

    /// No signature record is known for the manifest.
    #[error("unknown time-stamp manifest {manifest_id}")]
    UnknownManifest { manifest_id: String },
}

impl EngineError {
    /// Wrap a time-stamping failure with no responder attribution.
    pub fn timestamping(err: impl std::fmt::Display) -> Self {
        EngineError::Timestamping {
            url: None,
            message: err.to_string(),
        }
    }

    /// Wrap a time-stamping failure of a specific responder.
    pub fn timestamping_at(url: impl Into<String>, err: impl std::fmt::Display) -> Self {
        EngineError::Timestamping {
            url: Some(url.into()),
            message: err.to_string(),
        }
    }
}
