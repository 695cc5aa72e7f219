//! Time-stamping authority seam.

use sealog_chain::TodoEntry;

use crate::error::EngineError;

/// A successfully obtained time-stamp for one batch of manifests.
#[derive(Debug, Clone)]
pub struct TimestampToken {
    /// Responder URL the token came from; keys the diagnostics status map.
    pub url: String,
    /// Lowercase-hex digest of the token, absent when the responder
    /// returned no token material.
    pub token_digest: Option<String>,
}

/// Obtains time-stamp tokens from a time-stamping authority.
#[async_trait::async_trait]
pub trait Timestamper: Send + Sync {
    /// Stamp one batch of backlog entries. All-or-nothing: on an error the
    /// whole batch is retried later.
    async fn timestamp(&self, entries: &[TodoEntry]) -> Result<TimestampToken, EngineError>;
}
