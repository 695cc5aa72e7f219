//! Time-stamp backlog: signature records awaiting a time-stamp.
//!
//! Entries are handed out in bounded batches and marked in-process so that
//! repeated scheduling cycles do not pick the same entries while a
//! time-stamping round is still in flight. A failed round returns its
//! entries for retry; a successful one removes them by manifest id.

use std::time::{Duration, Instant};

use sealog_types::HashAlg;
use tracing::debug;

/// A signature record awaiting a time-stamp.
#[derive(Debug, Clone)]
pub struct TodoEntry {
    /// Sequence number of the signature record in the log.
    pub seq: u64,
    /// Time-stamp manifest id the eventual timestamp record will reference.
    pub manifest_id: String,
    /// Digest method of the manifest.
    pub digest_method: HashAlg,
    /// Lowercase-hex manifest digest.
    pub digest: String,
    in_process: bool,
    since: Instant,
}

impl TodoEntry {
    /// Create a fresh entry, not yet handed to a time-stamping round.
    pub fn new(seq: u64, manifest_id: String, digest_method: HashAlg, digest: String) -> Self {
        Self {
            seq,
            manifest_id,
            digest_method,
            digest,
            in_process: false,
            since: Instant::now(),
        }
    }

    /// Whether the entry is currently part of an in-flight round.
    pub fn in_process(&self) -> bool {
        self.in_process
    }

    /// How long the current in-flight round has been processing this entry.
    pub fn processing_for(&self) -> Option<Duration> {
        self.in_process.then(|| self.since.elapsed())
    }
}

/// Backlog of signature records not yet sealed by a timestamp record.
#[derive(Debug, Default)]
pub struct TodoBacklog {
    entries: Vec<TodoEntry>,
    /// Entries available for the next round (not in-process).
    active: usize,
}

impl TodoBacklog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fresh entry to the backlog.
    pub fn push(&mut self, entry: TodoEntry) {
        debug_assert!(!entry.in_process);
        self.entries.push(entry);
        self.active += 1;
    }

    /// Take up to `max` entries that are not currently in-process, marking
    /// them in-process so the next cycle skips them until they complete or
    /// fail.
    pub fn take_up_to(&mut self, max: usize) -> Vec<TodoEntry> {
        let mut taken = Vec::new();
        for entry in self.entries.iter_mut() {
            if taken.len() == max {
                break;
            }
            if !entry.in_process {
                entry.in_process = true;
                entry.since = Instant::now();
                self.active -= 1;
                taken.push(entry.clone());
            }
        }
        taken
    }

    /// Revert entries of a failed round so the next cycle retries them.
    pub fn on_failure(&mut self, failed: &[TodoEntry]) {
        for entry in self.entries.iter_mut() {
            if entry.in_process && failed.iter().any(|f| f.manifest_id == entry.manifest_id) {
                entry.in_process = false;
                self.active += 1;
            }
        }
        debug!(restored = failed.len(), "time-stamping round failed, backlog restored");
    }

    /// Remove entries whose manifests a timestamp record now references.
    pub fn on_timestamped(&mut self, manifest_ids: &[String]) {
        self.entries.retain(|entry| {
            let done = manifest_ids.iter().any(|m| *m == entry.manifest_id);
            if done && !entry.in_process {
                self.active -= 1;
            }
            !done
        });
    }

    /// Entries available for the next round.
    pub fn active_count(&self) -> usize {
        self.active
    }

    /// Total entries, including in-process ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate all entries, in insertion (sequence) order.
    pub fn entries(&self) -> impl Iterator<Item = &TodoEntry> {
        self.entries.iter()
    }

    /// Whether a manifest is still awaiting its time-stamp.
    pub fn contains_manifest(&self, manifest_id: &str) -> bool {
        self.entries.iter().any(|e| e.manifest_id == manifest_id)
    }
}
