//! Recipient key resolution for archive encryption.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use sealog_types::{ArchiveConfig, ClientId, EncryptionMember, Grouping, GroupingStrategy};
use tokio::sync::OnceCell;
use tracing::warn;

use crate::error::ArchiveError;
use crate::keystore::KeyStore;
use crate::seal;

/// Resolved recipient set for one archive group.
///
/// The archiver compares these across consecutive records; a change forces
/// a container rollover even within one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipients {
    /// Recipient key ids the container is sealed for.
    pub key_ids: BTreeSet<String>,
    /// True when no explicit mapping resolved and a fallback was used.
    pub default_key_used: bool,
}

enum Mode {
    Disabled,
    /// One self-encryption recipient set for every group, resolved from the
    /// server's signing key on first use.
    ServerWide { cached: OnceCell<BTreeSet<String>> },
    /// Explicit member mappings with default-key and all-keys fallbacks.
    PerGrouping {
        default_key: Option<String>,
        member_keys: BTreeMap<String, BTreeSet<String>>,
    },
}

/// Maps an archive group to the keys its containers are sealed for.
///
/// Constructed once at startup from configuration; only key resolution is
/// lazy.
pub struct EncryptionProvider {
    mode: Mode,
    key_store: Arc<dyn KeyStore>,
}

impl EncryptionProvider {
    pub fn from_config(config: &ArchiveConfig, key_store: Arc<dyn KeyStore>) -> Self {
        let mode = if !config.encryption_enabled {
            Mode::Disabled
        } else if config.grouping == GroupingStrategy::None {
            Mode::ServerWide {
                cached: OnceCell::new(),
            }
        } else {
            Mode::PerGrouping {
                default_key: config.default_key_id.clone(),
                member_keys: config.member_keys.clone(),
            }
        };
        Self { mode, key_store }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.mode, Mode::Disabled)
    }

    /// Resolve the recipient set for a group; `None` when encryption is
    /// disabled.
    pub async fn recipients(&self, group: &Grouping) -> Result<Option<Recipients>, ArchiveError> {
        match &self.mode {
            Mode::Disabled => Ok(None),
            Mode::ServerWide { cached } => {
                let keys = cached
                    .get_or_try_init(|| async {
                        let id = self.key_store.signing_key_id().await?;
                        Ok::<_, ArchiveError>(BTreeSet::from([id]))
                    })
                    .await?;
                Ok(Some(Recipients {
                    key_ids: keys.clone(),
                    default_key_used: false,
                }))
            }
            Mode::PerGrouping {
                default_key,
                member_keys,
            } => {
                let member = group
                    .client()
                    .map(|c| c.member_id().to_string())
                    .unwrap_or_default();
                Ok(Some(
                    self.resolve_member(&member, default_key, member_keys)
                        .await?,
                ))
            }
        }
    }

    async fn resolve_member(
        &self,
        member: &str,
        default_key: &Option<String>,
        member_keys: &BTreeMap<String, BTreeSet<String>>,
    ) -> Result<Recipients, ArchiveError> {
        if let Some(keys) = member_keys.get(member)
            && !keys.is_empty()
        {
            return Ok(Recipients {
                key_ids: keys.clone(),
                default_key_used: false,
            });
        }
        if let Some(default) = default_key {
            return Ok(Recipients {
                key_ids: BTreeSet::from([default.clone()]),
                default_key_used: true,
            });
        }
        // Fail open: an archive nobody can read is worse than one every
        // configured key can read.
        let all = self.key_store.all_key_ids().await?;
        warn!(
            member,
            keys = all.len(),
            "no encryption key mapping and no default key, sealing for every known key"
        );
        Ok(Recipients {
            key_ids: all,
            default_key_used: true,
        })
    }

    /// Seal finalized container bytes for the resolved recipients.
    ///
    /// Recipient ids that fail key-material lookup are skipped with a
    /// warning; a container with zero resolvable recipients is an error.
    pub async fn seal(
        &self,
        recipients: &Recipients,
        plain: Vec<u8>,
    ) -> Result<Vec<u8>, ArchiveError> {
        let mut keys = Vec::with_capacity(recipients.key_ids.len());
        for key_id in &recipients.key_ids {
            match self.key_store.encryption_key(key_id).await {
                Ok(key) => keys.push((key_id.clone(), key)),
                Err(e) => {
                    warn!(key = %key_id, error = %e, "skipping unresolvable recipient key");
                }
            }
        }
        seal::seal(&plain, &keys)
    }

    /// Per-member view of the resolved recipient keys, for operational
    /// diagnostics. Never creates an encryption stream, never collapses a
    /// member's multiple keys into one.
    pub async fn for_diagnostics(
        &self,
        members: &[ClientId],
    ) -> Result<Vec<EncryptionMember>, ArchiveError> {
        match &self.mode {
            Mode::Disabled => Ok(Vec::new()),
            Mode::ServerWide { .. } => {
                let Some(shared) = self.recipients(&Grouping::server()).await? else {
                    return Ok(Vec::new());
                };
                Ok(members
                    .iter()
                    .map(|m| EncryptionMember {
                        member_id: m.member_id().to_string(),
                        key_ids: shared.key_ids.clone(),
                        default_key_used: false,
                    })
                    .collect())
            }
            Mode::PerGrouping {
                default_key,
                member_keys,
            } => {
                let mut out = Vec::with_capacity(members.len());
                for member in members {
                    let id = member.member_id().to_string();
                    let resolved = self.resolve_member(&id, default_key, member_keys).await?;
                    out.push(EncryptionMember {
                        member_id: id,
                        key_ids: resolved.key_ids,
                        default_key_used: resolved.default_key_used,
                    });
                }
                Ok(out)
            }
        }
    }
}
