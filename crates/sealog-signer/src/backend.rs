//! Contract of the signing backend (hardware token or software key store).

use crate::error::SignError;

/// Opaque signing service invoked by key id and digest.
#[async_trait::async_trait]
pub trait SignerBackend: Send + Sync {
    /// Whether the token holding `key_id` supports batch signing.
    ///
    /// Queried once per worker; a failed probe makes the worker fall back
    /// to non-batched signing.
    async fn batch_signing_enabled(&self, key_id: &str) -> Result<bool, SignError>;

    /// Sign `digest` with the key addressed by `key_id`.
    async fn sign(
        &self,
        key_id: &str,
        signature_algorithm: &str,
        digest: &[u8],
    ) -> Result<Vec<u8>, SignError>;
}
