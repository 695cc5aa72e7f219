//! Configuration consumed by the log engine and the archiver.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::GroupingStrategy;
use crate::hash::HashAlg;

/// Configuration of the record log and time-stamping behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Path of the active log file.
    pub log_file: PathBuf,
    /// Digest algorithm used for record linking.
    pub hash_alg: HashAlg,
    /// Rotate the log file once it exceeds this many bytes.
    pub rotation_size: u64,
    /// Time-stamp each record synchronously instead of batching.
    pub timestamp_immediately: bool,
    /// Maximum signature records handed to one time-stamping round.
    pub timestamp_records_limit: usize,
    /// Refuse new messages once time-stamping has been failing for this
    /// many seconds. Zero disables the check.
    pub acceptable_timestamp_failure_period: u64,
    /// Delay in seconds before retrying after a failed time-stamping round.
    pub timestamp_retry_delay: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("slog"),
            hash_alg: HashAlg::Sha512,
            rotation_size: 10_000_000, // 10 MB
            timestamp_immediately: false,
            timestamp_records_limit: 10_000,
            acceptable_timestamp_failure_period: 14_400, // 4 h
            timestamp_retry_delay: 60,
        }
    }
}

/// Configuration of the archiver and archive encryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Directory archive containers are written into. Must exist, be a
    /// directory and be writable; checked before each run.
    pub output_dir: PathBuf,
    /// Maximum records processed in one archiving transaction.
    pub transaction_batch_size: usize,
    /// Shell command invoked after each finalized container; stdout is
    /// discarded, a non-zero exit is logged but not fatal.
    pub transfer_command: Option<String>,
    /// How records are partitioned into archive groups.
    pub grouping: GroupingStrategy,
    /// Whether archive containers are encrypted.
    pub encryption_enabled: bool,
    /// Key id used when a member has no explicit mapping.
    pub default_key_id: Option<String>,
    /// Explicit member id → recipient key ids. Multiple keys per member are
    /// allowed for redundancy.
    pub member_keys: BTreeMap<String, BTreeSet<String>>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("/var/lib/sealog/archive"),
            transaction_batch_size: 10_000,
            transfer_command: None,
            grouping: GroupingStrategy::None,
            encryption_enabled: false,
            default_key_id: None,
            member_keys: BTreeMap::new(),
        }
    }
}
