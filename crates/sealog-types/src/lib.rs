//! Shared types and identifiers for sealog.
//!
//! This crate defines the types used across the sealog workspace:
//! client identifiers ([`ClientId`]), digest algorithms ([`HashAlg`]),
//! archive grouping ([`GroupingStrategy`], [`Grouping`]), the persisted
//! per-group archive marker ([`DigestEntry`]), encryption diagnostics
//! ([`EncryptionMember`]) and configuration ([`LogConfig`], [`ArchiveConfig`]).

use std::fmt;

use serde::{Deserialize, Serialize};

mod config;
mod hash;

pub use config::{ArchiveConfig, LogConfig};
pub use hash::{HashAlg, to_hex};

// ---------------------------------------------------------------------------
// Client identifiers
// ---------------------------------------------------------------------------

/// Identifier of a data-exchange member or one of its subsystems.
///
/// Rendered as `instance/member-class/member-code[/subsystem-code]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId {
    /// Instance identifier of the exchange federation.
    pub instance: String,
    /// Member class (e.g. governmental, commercial).
    pub member_class: String,
    /// Member code, unique within the class.
    pub member_code: String,
    /// Optional subsystem code.
    pub subsystem: Option<String>,
}

impl ClientId {
    /// Create a member-level identifier (no subsystem).
    pub fn member(
        instance: impl Into<String>,
        member_class: impl Into<String>,
        member_code: impl Into<String>,
    ) -> Self {
        Self {
            instance: instance.into(),
            member_class: member_class.into(),
            member_code: member_code.into(),
            subsystem: None,
        }
    }

    /// Create a subsystem-level identifier.
    pub fn subsystem(
        instance: impl Into<String>,
        member_class: impl Into<String>,
        member_code: impl Into<String>,
        subsystem: impl Into<String>,
    ) -> Self {
        Self {
            subsystem: Some(subsystem.into()),
            ..Self::member(instance, member_class, member_code)
        }
    }

    /// Identifier of the owning member, dropping any subsystem part.
    pub fn member_id(&self) -> ClientId {
        ClientId {
            subsystem: None,
            ..self.clone()
        }
    }

    /// Parse from the slash-joined rendering.
    pub fn parse(s: &str) -> Option<ClientId> {
        let mut parts = s.split('/');
        let instance = parts.next()?.to_string();
        let member_class = parts.next()?.to_string();
        let member_code = parts.next()?.to_string();
        let subsystem = parts.next().map(str::to_string);
        if parts.next().is_some() || instance.is_empty() {
            return None;
        }
        Some(ClientId {
            instance,
            member_class,
            member_code,
            subsystem,
        })
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.instance, self.member_class, self.member_code
        )?;
        if let Some(sub) = &self.subsystem {
            write!(f, "/{sub}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Archive grouping
// ---------------------------------------------------------------------------

/// How archived records are partitioned into groups.
///
/// The grouping key drives both archive file boundaries and encryption
/// recipient selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingStrategy {
    /// One group for the whole server.
    #[default]
    None,
    /// One group per member (subsystems fold into their member).
    Member,
    /// One group per subsystem.
    Subsystem,
}

impl GroupingStrategy {
    /// Resolve the archive group for a record's client identifier.
    pub fn resolve(&self, client: &ClientId) -> Grouping {
        match self {
            GroupingStrategy::None => Grouping::server(),
            GroupingStrategy::Member => Grouping::of(client.member_id()),
            GroupingStrategy::Subsystem => Grouping::of(client.clone()),
        }
    }
}

/// A concrete archive group: either the whole server or a single client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Grouping {
    client: Option<ClientId>,
}

impl Grouping {
    /// The server-wide group.
    pub fn server() -> Self {
        Self { client: None }
    }

    /// A per-client group.
    pub fn of(client: ClientId) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// The client identifier backing this group, if any.
    pub fn client(&self) -> Option<&ClientId> {
        self.client.as_ref()
    }

    /// Group name as persisted in [`DigestEntry`] rows; `None` for the
    /// server-wide group.
    pub fn name(&self) -> Option<String> {
        self.client.as_ref().map(ToString::to_string)
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.client {
            Some(c) => write!(f, "{c}"),
            None => f.write_str("<server>"),
        }
    }
}

// ---------------------------------------------------------------------------
// Archive digest chaining
// ---------------------------------------------------------------------------

/// Last-archive marker persisted per group.
///
/// Each new archive file for a group chains from exactly this digest; a
/// group with no prior archive starts from the empty entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestEntry {
    /// Lowercase-hex digest closing the group's previous archive file.
    pub digest: String,
    /// Name of the previous archive file.
    pub file_name: String,
}

impl DigestEntry {
    /// Marker for a group that has never been archived.
    pub fn empty() -> Self {
        Self {
            digest: String::new(),
            file_name: String::new(),
        }
    }

    /// True when no previous archive exists for the group.
    pub fn is_empty(&self) -> bool {
        self.digest.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Encryption diagnostics
// ---------------------------------------------------------------------------

/// Diagnostic projection of which recipient keys protect a member's archives.
///
/// A member may have several configured keys for redundancy; all of them are
/// reported, none is collapsed into a "primary" one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionMember {
    /// The member this entry describes, slash-joined.
    pub member_id: String,
    /// Resolved recipient key ids (possibly empty).
    pub key_ids: std::collections::BTreeSet<String>,
    /// True when the member fell back to the default key because no
    /// explicit mapping resolved.
    pub default_key_used: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
