//! Tests for the log engine.

mod manager_tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use sealog_chain::TodoEntry;
use sealog_types::{ClientId, HashAlg, LogConfig};
use tempfile::TempDir;

use crate::error::EngineError;
use crate::manager::{LogManager, MessageEntry, SignatureEntry};
use crate::timestamper::{TimestampToken, Timestamper};

pub(crate) const TSA_URL: &str = "https://tsa.example.org";

/// Scriptable in-memory time-stamping authority.
pub(crate) struct MockTimestamper {
    pub fails: AtomicBool,
    /// Per-round responder latency in milliseconds.
    pub delay_ms: AtomicU64,
    pub rounds: AtomicUsize,
    pub stamped: Mutex<Vec<String>>,
}

impl MockTimestamper {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            fails: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            rounds: AtomicUsize::new(0),
            stamped: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn failing() -> Arc<Self> {
        let mock = Self::new();
        mock.fails.store(true, Ordering::SeqCst);
        mock
    }
}

#[async_trait::async_trait]
impl Timestamper for MockTimestamper {
    async fn timestamp(&self, entries: &[TodoEntry]) -> Result<TimestampToken, EngineError> {
        self.rounds.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        if self.fails.load(Ordering::SeqCst) {
            return Err(EngineError::timestamping_at(TSA_URL, "responder unreachable"));
        }
        let mut stamped = self.stamped.lock().unwrap();
        for entry in entries {
            stamped.push(entry.manifest_id.clone());
        }
        Ok(TimestampToken {
            url: TSA_URL.to_string(),
            token_digest: Some("746f6b656e".to_string()),
        })
    }
}

pub(crate) fn config(dir: &TempDir) -> LogConfig {
    LogConfig {
        log_file: dir.path().join("slog"),
        hash_alg: HashAlg::Sha256,
        ..LogConfig::default()
    }
}

pub(crate) fn manager(config: LogConfig, mock: Arc<MockTimestamper>) -> Arc<LogManager> {
    Arc::new(LogManager::open(config, mock).expect("open log manager"))
}

pub(crate) fn entry(n: u32) -> (MessageEntry, SignatureEntry) {
    let message = MessageEntry {
        query_id: format!("q{n}"),
        client: ClientId::member("XE", "GOV", "1234"),
        response: false,
        encrypted: false,
    };
    let signature = SignatureEntry {
        manifest_id: format!("m{n}"),
        digest_method: HashAlg::Sha256,
        digest: HashAlg::Sha256.digest_hex(format!("sig{n}").as_bytes()),
    };
    (message, signature)
}
