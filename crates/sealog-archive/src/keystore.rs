//! Key store seam (Vault-like secret backend).

use std::collections::BTreeSet;

use crate::error::ArchiveError;

/// Secret backend resolving recipient key ids to key-encryption keys.
#[async_trait::async_trait]
pub trait KeyStore: Send + Sync {
    /// Key id of the server's own signing key pair, used for server-wide
    /// self-encryption.
    async fn signing_key_id(&self) -> Result<String, ArchiveError>;

    /// Every recipient key id known to the backend.
    async fn all_key_ids(&self) -> Result<BTreeSet<String>, ArchiveError>;

    /// 256-bit key-encryption key for one key id.
    async fn encryption_key(&self, key_id: &str) -> Result<[u8; 32], ArchiveError>;
}
