//! Record store seam: ordered batch reads and archived-flag updates.

use sealog_types::{ClientId, DigestEntry, Grouping};

use crate::error::ArchiveError;

/// One message record eligible for archiving (time-stamped, not archived).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRecord {
    /// Record store id; archive order within a group is ascending id order.
    pub id: u64,
    /// Client the message belongs to; resolves the archive group.
    pub client: ClientId,
    /// Query id of the exchanged message.
    pub query_id: String,
    /// True for the response half of an exchange.
    pub response: bool,
    /// Serialized message document written into the container.
    pub body: Vec<u8>,
}

impl ArchiveRecord {
    /// Container entry name. Unique per record within one container.
    pub fn entry_name(&self) -> String {
        let direction = if self.response { "response" } else { "request" };
        let query: String = self
            .query_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}-{direction}-{query}", self.id)
    }

    /// Position of this record in archival order.
    pub fn cursor(&self) -> RecordCursor {
        RecordCursor {
            client: self.client.clone(),
            id: self.id,
        }
    }

    /// Archival sort key: group columns first, then id.
    pub fn sort_key(&self) -> (&str, &str, Option<&str>, u64) {
        (
            &self.client.member_class,
            &self.client.member_code,
            self.client.subsystem.as_deref(),
            self.id,
        )
    }
}

/// Resume point for paged eligible-record reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordCursor {
    pub client: ClientId,
    pub id: u64,
}

impl RecordCursor {
    /// Archival sort key of the record this cursor stands for.
    pub fn sort_key(&self) -> (&str, &str, Option<&str>, u64) {
        (
            &self.client.member_class,
            &self.client.member_code,
            self.client.subsystem.as_deref(),
            self.id,
        )
    }
}

/// Record store operations the archiver depends on.
///
/// Implementations back onto the relational store; the ordering contract of
/// [`fetch_eligible`](RecordRepository::fetch_eligible) is load-bearing for
/// the per-group digest chains.
#[async_trait::async_trait]
pub trait RecordRepository: Send + Sync {
    /// Highest id among eligible records, or `None` when nothing is
    /// eligible. Taken once per pass so records added mid-run wait for the
    /// next pass.
    async fn max_eligible_id(&self) -> Result<Option<u64>, ArchiveError>;

    /// Up to `limit` eligible records with `id <= max_id`, strictly after
    /// `after` in archival order: (member class, member code, subsystem
    /// code), then ascending id. Records of one archive group are therefore
    /// contiguous and repeated paged reads never return a record twice,
    /// whether or not earlier pages have been marked archived yet.
    async fn fetch_eligible(
        &self,
        max_id: u64,
        after: Option<&RecordCursor>,
        limit: usize,
    ) -> Result<Vec<ArchiveRecord>, ArchiveError>;

    /// Flip the archived flag of one record. Archiving an already-archived
    /// record again is a no-op.
    async fn mark_archived(&self, id: u64) -> Result<(), ArchiveError>;

    /// Mark timestamp records archived once no unarchived message record
    /// references them. Returns how many were marked.
    async fn mark_stale_timestamps_archived(&self) -> Result<u64, ArchiveError>;

    /// The group's last-archive marker, or the empty entry for a group
    /// never archived before.
    async fn load_last_archive(&self, group: &Grouping) -> Result<DigestEntry, ArchiveError>;

    /// Persist the group's new last-archive marker. Updated on every run
    /// that touches the group, never deleted.
    async fn save_last_archive(
        &self,
        group: &Grouping,
        entry: DigestEntry,
    ) -> Result<(), ArchiveError>;
}
