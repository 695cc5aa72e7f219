//! Error types for batch signing.

/// Errors surfaced to callers waiting on a signature.
///
/// Clonable because one batch failure fans out to every caller waiting on
/// the same batch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SignError {
    /// The signing round exceeded the time bound. All callers of the batch
    /// receive this and the worker reverts to idle.
    #[error("signature creation timed out")]
    Timeout,

    /// The signing backend reported a failure. Not retried automatically.
    #[error("signing backend failure: {message}")]
    Backend {
        /// Backend-provided failure description.
        message: String,
    },

    /// The per-certificate worker is gone (shutdown in progress).
    #[error("signing worker stopped")]
    WorkerStopped,

    /// A request carried no message parts to sign.
    #[error("signing request has no message parts")]
    EmptyRequest,
}

impl SignError {
    /// Wrap a backend failure.
    pub fn backend(err: impl std::fmt::Display) -> Self {
        SignError::Backend {
            message: err.to_string(),
        }
    }
}
