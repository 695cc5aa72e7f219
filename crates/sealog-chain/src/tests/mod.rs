//! Tests for the record chain crate.

mod record_tests;

use sealog_types::{ClientId, HashAlg, LogConfig};
use tempfile::TempDir;

use crate::file::LogFile;
use crate::record::LogRecord;

/// Config pointing at a log file inside a fresh temp dir.
fn test_config(dir: &TempDir) -> LogConfig {
    LogConfig {
        log_file: dir.path().join("slog"),
        hash_alg: HashAlg::Sha256,
        ..LogConfig::default()
    }
}

/// Open a log file in a fresh temp dir.
fn test_log() -> (LogFile, TempDir) {
    let dir = TempDir::new().unwrap();
    let log = LogFile::open(&test_config(&dir)).unwrap();
    (log, dir)
}

fn message(query_id: &str) -> LogRecord {
    LogRecord::Message {
        query_id: query_id.to_string(),
        client: ClientId::subsystem("XE", "GOV", "1234", "portal"),
        response: false,
    }
}

fn signature(manifest_id: &str) -> LogRecord {
    LogRecord::Signature {
        manifest_id: manifest_id.to_string(),
        digest_method: HashAlg::Sha256,
        digest: HashAlg::Sha256.digest_hex(manifest_id.as_bytes()),
    }
}

fn timestamp(manifest_ids: &[&str]) -> LogRecord {
    LogRecord::Timestamp {
        manifest_ids: manifest_ids.iter().map(|m| m.to_string()).collect(),
        token_digest: Some("deadbeef".to_string()),
    }
}
