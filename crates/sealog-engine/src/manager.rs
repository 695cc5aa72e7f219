//! Log manager: the logging and time-stamping entry points.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use lru::LruCache;
use sealog_chain::{LogFile, LogRecord};
use sealog_types::{ClientId, HashAlg, LogConfig};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::timestamper::Timestamper;

/// Bound of the manifest → timestamp-sequence cache backing idempotent
/// [`LogManager::timestamp`] calls.
const STAMPED_CACHE_SIZE: usize = 100;

/// Poll interval while a manifest is held by a concurrent round.
const IN_PROCESS_POLL: Duration = Duration::from_millis(10);

/// A message to be logged.
#[derive(Debug, Clone)]
pub struct MessageEntry {
    pub query_id: String,
    pub client: ClientId,
    pub response: bool,
    /// Store the message payload encrypted at rest.
    pub encrypted: bool,
}

/// The signature sealing a logged message, identified by its time-stamp
/// manifest.
#[derive(Debug, Clone)]
pub struct SignatureEntry {
    pub manifest_id: String,
    pub digest_method: HashAlg,
    pub digest: String,
}

/// Last known outcome per time-stamp responder URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampStatus {
    pub ok: bool,
    /// Failure description for a failed round.
    pub message: Option<String>,
    pub at: DateTime<Utc>,
}

/// Owns the record log and drives time-stamping of its backlog.
///
/// Logical producers serialize through the internal log mutex; the lock is
/// never held across a responder round trip.
pub struct LogManager {
    config: LogConfig,
    log: Mutex<LogFile>,
    timestamper: Arc<dyn Timestamper>,
    /// When the current uninterrupted streak of failed rounds began.
    failing_since: Mutex<Option<Instant>>,
    stamped: Mutex<LruCache<String, u64>>,
    status: Mutex<BTreeMap<String, TimestampStatus>>,
}

impl LogManager {
    /// Open the log file and recover its chain state.
    pub fn open(config: LogConfig, timestamper: Arc<dyn Timestamper>) -> Result<Self, EngineError> {
        let log = LogFile::open(&config)?;
        Ok(Self {
            config,
            log: Mutex::new(log),
            timestamper,
            failing_since: Mutex::new(None),
            stamped: Mutex::new(LruCache::new(
                NonZeroUsize::new(STAMPED_CACHE_SIZE).expect("cache size is non-zero"),
            )),
            status: Mutex::new(BTreeMap::new()),
        })
    }

    /// Log one message with its signature. Returns the signature record's
    /// sequence number, which a later timestamp record will seal.
    pub async fn log(
        &self,
        message: MessageEntry,
        signature: SignatureEntry,
    ) -> Result<u64, EngineError> {
        self.verify_can_log()?;

        let seq = {
            let mut log = self.lock_log();
            let record = if message.encrypted {
                LogRecord::EncryptedMessage {
                    query_id: message.query_id,
                    client: message.client,
                    response: message.response,
                }
            } else {
                LogRecord::Message {
                    query_id: message.query_id,
                    client: message.client,
                    response: message.response,
                }
            };
            log.append(record)?;
            let seq = log.append(LogRecord::Signature {
                manifest_id: signature.manifest_id,
                digest_method: signature.digest_method,
                digest: signature.digest,
            })?;
            if log.must_rotate() {
                log.rotate()?;
            }
            seq
        };

        if self.config.timestamp_immediately {
            self.timestamp_pending().await?;
        }
        Ok(seq)
    }

    /// Time-stamp the record identified by its manifest, driving rounds
    /// until it is sealed. Idempotent: a manifest already sealed returns the
    /// existing timestamp record's sequence number.
    pub async fn timestamp(&self, manifest_id: &str) -> Result<u64, EngineError> {
        if let Some(seq) = self.stamped_seq(manifest_id) {
            debug!(manifest_id, seq, "manifest already time-stamped");
            return Ok(seq);
        }
        if !self.lock_log().state().backlog().contains_manifest(manifest_id) {
            return Err(EngineError::UnknownManifest {
                manifest_id: manifest_id.to_string(),
            });
        }
        while self.lock_log().state().backlog().contains_manifest(manifest_id) {
            // A zero-entry round means a concurrent round holds the
            // manifest; wait for it to settle instead of giving up.
            if self.timestamp_pending().await? == 0 {
                tokio::time::sleep(IN_PROCESS_POLL).await;
            }
        }
        self.stamped_seq(manifest_id)
            .ok_or_else(|| EngineError::timestamping("completed round did not cover the manifest"))
    }

    /// Run one time-stamping round over up to the configured number of
    /// backlog entries. Returns how many records the round sealed.
    pub async fn timestamp_pending(&self) -> Result<usize, EngineError> {
        let entries = {
            let mut log = self.lock_log();
            log.state_mut()
                .backlog_mut()
                .take_up_to(self.config.timestamp_records_limit)
        };
        if entries.is_empty() {
            return Ok(0);
        }
        debug!(records = entries.len(), "time-stamping round started");

        match self.timestamper.timestamp(&entries).await {
            Ok(token) => {
                let manifest_ids: Vec<String> =
                    entries.iter().map(|e| e.manifest_id.clone()).collect();
                let seq = {
                    let mut log = self.lock_log();
                    let seq = log.append(LogRecord::Timestamp {
                        manifest_ids: manifest_ids.clone(),
                        token_digest: token.token_digest.clone(),
                    })?;
                    if log.must_rotate() {
                        log.rotate()?;
                    }
                    seq
                };
                {
                    let mut stamped = self.stamped.lock().expect("stamped cache poisoned");
                    for manifest_id in &manifest_ids {
                        stamped.put(manifest_id.clone(), seq);
                    }
                }
                *self.failing_since.lock().expect("failure clock poisoned") = None;
                self.put_status(
                    token.url.clone(),
                    TimestampStatus {
                        ok: true,
                        message: None,
                        at: Utc::now(),
                    },
                );
                info!(records = entries.len(), seq, url = %token.url, "time-stamp appended");
                Ok(entries.len())
            }
            Err(e) => {
                self.lock_log().state_mut().backlog_mut().on_failure(&entries);
                {
                    let mut failing = self.failing_since.lock().expect("failure clock poisoned");
                    failing.get_or_insert_with(Instant::now);
                }
                if let EngineError::Timestamping { url: Some(url), message } = &e {
                    self.put_status(
                        url.clone(),
                        TimestampStatus {
                            ok: false,
                            message: Some(message.clone()),
                            at: Utc::now(),
                        },
                    );
                }
                warn!(records = entries.len(), error = %e, "time-stamping round failed");
                Err(e)
            }
        }
    }

    /// Per-responder-URL outcome of the most recent round that used it.
    pub fn diagnostics(&self) -> BTreeMap<String, TimestampStatus> {
        self.status.lock().expect("status map poisoned").clone()
    }

    /// Backlog entries currently awaiting a time-stamp.
    pub fn pending_count(&self) -> usize {
        self.lock_log().state().backlog().len()
    }

    /// Number of records the configuration allows per round.
    pub fn round_limit(&self) -> usize {
        self.config.timestamp_records_limit
    }

    /// Refuse new messages once time-stamping has been failing longer than
    /// the acceptable period. A period of zero disables the check.
    fn verify_can_log(&self) -> Result<(), EngineError> {
        let period = self.config.acceptable_timestamp_failure_period;
        if period == 0 {
            return Ok(());
        }
        if let Some(since) = *self.failing_since.lock().expect("failure clock poisoned") {
            let for_secs = since.elapsed().as_secs();
            if for_secs >= period {
                return Err(EngineError::TimestampingStalled { for_secs });
            }
        }
        Ok(())
    }

    fn stamped_seq(&self, manifest_id: &str) -> Option<u64> {
        self.stamped
            .lock()
            .expect("stamped cache poisoned")
            .get(manifest_id)
            .copied()
    }

    fn put_status(&self, url: String, status: TimestampStatus) {
        self.status
            .lock()
            .expect("status map poisoned")
            .insert(url, status);
    }

    fn lock_log(&self) -> MutexGuard<'_, LogFile> {
        self.log.lock().expect("log file lock poisoned")
    }
}
