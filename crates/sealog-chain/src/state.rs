//! Replayable chain state: previous record, todo backlog and the recent
//! signature cache.

use std::num::NonZeroUsize;

use lru::LruCache;
use sealog_types::HashAlg;

use crate::backlog::{TodoBacklog, TodoEntry};
use crate::record::{ChainedRecord, LogRecord, PrevRecord};

/// Bound of the manifest-id → sequence-number dedup cache.
const RECENT_SIGNATURE_CACHE_SIZE: usize = 100;

/// Process-local reconstruction of the log file's state.
///
/// Built by replaying a file from its start; kept current by applying each
/// appended record. Replaying the file from scratch at any point reproduces
/// the same state as the in-memory instance.
#[derive(Debug)]
pub struct LogState {
    prev: PrevRecord,
    backlog: TodoBacklog,
    /// Manifest id → sequence number of recently logged signatures, used to
    /// detect and skip duplicate signature submissions.
    recent: LruCache<String, u64>,
}

impl LogState {
    /// State of an empty log.
    pub fn new(alg: HashAlg) -> Self {
        Self {
            prev: PrevRecord::first(alg),
            backlog: TodoBacklog::new(),
            recent: LruCache::new(
                NonZeroUsize::new(RECENT_SIGNATURE_CACHE_SIZE).expect("cache size is non-zero"),
            ),
        }
    }

    /// Apply one record, during replay or right after an append.
    pub fn apply(&mut self, rec: &ChainedRecord) {
        if rec.record.advances_chain() {
            self.prev = rec.prev_record();
        }
        match &rec.record {
            LogRecord::Signature {
                manifest_id,
                digest_method,
                digest,
            }
            | LogRecord::Todo {
                manifest_id,
                digest_method,
                digest,
            } => {
                self.backlog.push(TodoEntry::new(
                    rec.seq,
                    manifest_id.clone(),
                    *digest_method,
                    digest.clone(),
                ));
                self.recent.put(manifest_id.clone(), rec.seq);
            }
            LogRecord::Timestamp { manifest_ids, .. } => {
                self.backlog.on_timestamped(manifest_ids);
            }
            LogRecord::FirstRow
            | LogRecord::Message { .. }
            | LogRecord::EncryptedMessage { .. } => {}
        }
    }

    /// Sequence number already logged for a manifest, if recently seen.
    pub fn recent_signature(&mut self, manifest_id: &str) -> Option<u64> {
        self.recent.get(manifest_id).copied()
    }

    /// The most recently written chained record's state.
    pub fn prev(&self) -> &PrevRecord {
        &self.prev
    }

    pub fn backlog(&self) -> &TodoBacklog {
        &self.backlog
    }

    pub fn backlog_mut(&mut self) -> &mut TodoBacklog {
        &mut self.backlog
    }
}
