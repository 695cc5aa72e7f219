//! Tests for the archiving crate.


use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sealog_types::{ClientId, DigestEntry, Grouping};

use crate::error::ArchiveError;
use crate::keystore::KeyStore;
use crate::repository::{ArchiveRecord, RecordCursor, RecordRepository};

pub(crate) fn record(id: u64, client: ClientId) -> ArchiveRecord {
    ArchiveRecord {
        id,
        client,
        query_id: format!("q{id}"),
        response: id % 2 == 0,
        body: format!("message body {id}").into_bytes(),
    }
}

struct StoredTimestamp {
    id: u64,
    message_ids: Vec<u64>,
    archived: bool,
}

#[derive(Default)]
struct RepoState {
    records: Vec<(ArchiveRecord, bool)>,
    timestamps: Vec<StoredTimestamp>,
    digests: HashMap<Option<String>, DigestEntry>,
}

/// In-memory stand-in for the relational record store.
#[derive(Default)]
pub(crate) struct MemoryRepository {
    inner: Mutex<RepoState>,
    fetch_calls: AtomicUsize,
}

impl MemoryRepository {
    pub(crate) fn with_records(records: Vec<ArchiveRecord>) -> Arc<Self> {
        let repo = Self::default();
        repo.inner.lock().unwrap().records = records.into_iter().map(|r| (r, false)).collect();
        Arc::new(repo)
    }

    pub(crate) fn add_record(&self, record: ArchiveRecord) {
        self.inner.lock().unwrap().records.push((record, false));
    }

    pub(crate) fn seed_digest(&self, group: &Grouping, entry: DigestEntry) {
        self.inner
            .lock()
            .unwrap()
            .digests
            .insert(group.name(), entry);
    }

    pub(crate) fn add_timestamp(&self, id: u64, message_ids: Vec<u64>) {
        self.inner.lock().unwrap().timestamps.push(StoredTimestamp {
            id,
            message_ids,
            archived: false,
        });
    }

    pub(crate) fn archived_ids(&self) -> Vec<u64> {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|(_, archived)| *archived)
            .map(|(r, _)| r.id)
            .collect()
    }

    pub(crate) fn timestamp_archived(&self, id: u64) -> bool {
        self.inner
            .lock()
            .unwrap()
            .timestamps
            .iter()
            .any(|ts| ts.id == id && ts.archived)
    }

    pub(crate) fn digest_for(&self, group: &Grouping) -> Option<DigestEntry> {
        self.inner.lock().unwrap().digests.get(&group.name()).cloned()
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RecordRepository for MemoryRepository {
    async fn max_eligible_id(&self) -> Result<Option<u64>, ArchiveError> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .records
            .iter()
            .filter(|(_, archived)| !archived)
            .map(|(r, _)| r.id)
            .max())
    }

    async fn fetch_eligible(
        &self,
        max_id: u64,
        after: Option<&RecordCursor>,
        limit: usize,
    ) -> Result<Vec<ArchiveRecord>, ArchiveError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.inner.lock().unwrap();
        let mut eligible: Vec<ArchiveRecord> = state
            .records
            .iter()
            .filter(|(r, archived)| {
                !archived
                    && r.id <= max_id
                    && after.is_none_or(|c| r.sort_key() > c.sort_key())
            })
            .map(|(r, _)| r.clone())
            .collect();
        eligible.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        eligible.truncate(limit);
        Ok(eligible)
    }

    async fn mark_archived(&self, id: u64) -> Result<(), ArchiveError> {
        let mut state = self.inner.lock().unwrap();
        for (record, archived) in &mut state.records {
            if record.id == id {
                *archived = true;
            }
        }
        Ok(())
    }

    async fn mark_stale_timestamps_archived(&self) -> Result<u64, ArchiveError> {
        let mut state = self.inner.lock().unwrap();
        let archived_messages: Vec<u64> = state
            .records
            .iter()
            .filter(|(_, archived)| *archived)
            .map(|(r, _)| r.id)
            .collect();
        let mut marked = 0;
        for ts in &mut state.timestamps {
            if !ts.archived && ts.message_ids.iter().all(|id| archived_messages.contains(id)) {
                ts.archived = true;
                marked += 1;
            }
        }
        Ok(marked)
    }

    async fn load_last_archive(&self, group: &Grouping) -> Result<DigestEntry, ArchiveError> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .digests
            .get(&group.name())
            .cloned()
            .unwrap_or_else(DigestEntry::empty))
    }

    async fn save_last_archive(
        &self,
        group: &Grouping,
        entry: DigestEntry,
    ) -> Result<(), ArchiveError> {
        let mut state = self.inner.lock().unwrap();
        state.digests.insert(group.name(), entry);
        Ok(())
    }
}

/// In-memory key store with deterministic key material.
pub(crate) struct MemoryKeyStore {
    signing_key: String,
    keys: BTreeMap<String, [u8; 32]>,
}

impl MemoryKeyStore {
    pub(crate) fn with_keys(key_ids: &[&str]) -> Arc<Self> {
        let keys = key_ids
            .iter()
            .map(|id| (id.to_string(), Self::key_material(id)))
            .collect();
        Arc::new(Self {
            signing_key: key_ids.first().unwrap_or(&"server-signing").to_string(),
            keys,
        })
    }

    pub(crate) fn key_material(key_id: &str) -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, byte) in key_id.bytes().cycle().take(32).enumerate() {
            key[i] = byte;
        }
        key
    }
}

#[async_trait::async_trait]
impl KeyStore for MemoryKeyStore {
    async fn signing_key_id(&self) -> Result<String, ArchiveError> {
        Ok(self.signing_key.clone())
    }

    async fn all_key_ids(&self) -> Result<BTreeSet<String>, ArchiveError> {
        Ok(self.keys.keys().cloned().collect())
    }

    async fn encryption_key(&self, key_id: &str) -> Result<[u8; 32], ArchiveError> {
        self.keys
            .get(key_id)
            .copied()
            .ok_or_else(|| ArchiveError::key_store(format!("unknown key {key_id}")))
    }
}
