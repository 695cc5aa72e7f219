//! Durable, single-writer, append-only log file store.
//!
//! The file holds the record chain as newline-delimited text lines. Opening
//! replays every existing line through [`LogState`], recovering the previous
//! record and the time-stamp backlog. Appends are flushed to disk before
//! returning; once the file exceeds its size threshold it is rotated away
//! and the fresh file is re-seeded so it replays standalone.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use rand::Rng;
use sealog_types::{HashAlg, LogConfig};
use tracing::{debug, info};

use crate::backlog::TodoEntry;
use crate::error::ChainError;
use crate::record::{ChainedRecord, LogRecord, PrevRecord};
use crate::state::LogState;

type Result<T> = std::result::Result<T, ChainError>;

/// Attempts at finding a collision-free rotation target name.
const ROTATE_ATTEMPTS: u32 = 100;

/// Append-only store of the record chain.
///
/// Single writer: concurrent logical producers must serialize through one
/// instance (a mutex or an actor mailbox), never write in parallel.
pub struct LogFile {
    path: PathBuf,
    file: File,
    size: u64,
    alg: HashAlg,
    rotation_size: u64,
    state: LogState,
}

impl LogFile {
    /// Open the log file, creating it if absent, and replay its lines to
    /// recover chain state. An empty file gets an initial first-row line.
    pub fn open(config: &LogConfig) -> Result<Self> {
        let path = config.log_file.clone();
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;

        let mut state = LogState::new(config.hash_alg);
        let mut size = file.metadata()?.len();
        let mut lines = 0u64;

        if size > 0 {
            let reader = BufReader::new(File::open(&path)?);
            for (idx, line) in reader.lines().enumerate() {
                let line = line?;
                if line.is_empty() {
                    continue;
                }
                let rec = ChainedRecord::parse(&line, idx as u64 + 1)?;
                state.apply(&rec);
                lines += 1;
            }
        }

        let mut log = Self {
            path,
            file,
            size,
            alg: config.hash_alg,
            rotation_size: config.rotation_size,
            state,
        };

        if size == 0 {
            let first = ChainedRecord::first_row(config.hash_alg);
            log.write_record(&first)?;
            size = log.size;
        }

        info!(
            path = %log.path.display(),
            size,
            replayed = lines,
            seq = log.state.prev().seq,
            backlog = log.state.backlog().len(),
            "log file opened"
        );
        Ok(log)
    }

    /// Append a record, linking it to the current chain state.
    ///
    /// Returns the record's sequence number. The line is flushed to disk
    /// before this returns; on an I/O error the record must not be assumed
    /// durable. A signature record whose manifest was recently logged is
    /// skipped and the existing sequence number returned instead.
    pub fn append(&mut self, record: LogRecord) -> Result<u64> {
        if let LogRecord::Signature { manifest_id, .. } = &record
            && let Some(seq) = self.state.recent_signature(manifest_id)
        {
            debug!(manifest_id, seq, "duplicate signature submission, reusing record");
            return Ok(seq);
        }

        let chained = ChainedRecord::link_next(self.state.prev(), record, self.alg);
        self.write_record(&chained)?;
        Ok(chained.seq)
    }

    /// True once the file exceeds the rotation threshold.
    pub fn must_rotate(&self) -> bool {
        self.size > self.rotation_size
    }

    /// Rotate: rename the current file to a timestamped name (retrying on
    /// collision) and re-seed a fresh file with the current chain state and
    /// backlog so it replays without the rotated file.
    pub fn rotate(&mut self) -> Result<PathBuf> {
        let rotated = self.rename_away()?;

        self.file = OpenOptions::new()
            .read(true)
            .append(true)
            .create_new(true)
            .open(&self.path)?;
        self.size = 0;

        // First row carrying the pre-rotation chain state.
        let prev = self.state.prev().clone();
        let seed = ChainedRecord {
            seq: prev.seq,
            alg: prev.alg,
            linking_info: prev.linking_info,
            time_millis: Utc::now().timestamp_millis(),
            record: LogRecord::FirstRow,
        };
        self.write_line(&seed)?;

        // One todo marker per outstanding backlog entry.
        let todos: Vec<TodoEntry> = self.state.backlog().entries().cloned().collect();
        for todo in &todos {
            let marker = ChainedRecord {
                seq: todo.seq,
                alg: todo.digest_method,
                linking_info: "-".to_string(),
                time_millis: Utc::now().timestamp_millis(),
                record: LogRecord::Todo {
                    manifest_id: todo.manifest_id.clone(),
                    digest_method: todo.digest_method,
                    digest: todo.digest.clone(),
                },
            };
            self.write_line(&marker)?;
        }
        self.file.sync_data()?;

        info!(
            rotated = %rotated.display(),
            seq = self.state.prev().seq,
            backlog = todos.len(),
            "log file rotated"
        );
        Ok(rotated)
    }

    /// Current chain state of the most recently written record.
    pub fn prev_record(&self) -> &PrevRecord {
        self.state.prev()
    }

    /// The replayed/maintained state, including the time-stamp backlog.
    pub fn state(&self) -> &LogState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut LogState {
        &mut self.state
    }

    /// Path of the active log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Write, flush to disk and fold into state. The sync is the durability
    /// point: a crash after this call must not lose the record.
    fn write_record(&mut self, rec: &ChainedRecord) -> Result<()> {
        self.write_line(rec)?;
        self.file.sync_data()?;
        self.state.apply(rec);
        Ok(())
    }

    /// Serialize one line and advance the size counter. Does not touch
    /// state: rotation re-writes lines the state already contains.
    fn write_line(&mut self, rec: &ChainedRecord) -> Result<()> {
        let mut line = rec.to_line()?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.size += line.len() as u64;
        Ok(())
    }

    /// Rename the active file to a fresh rotation name, retrying with a new
    /// random suffix on collision.
    fn rename_away(&self) -> Result<PathBuf> {
        let mut rng = rand::thread_rng();
        for _ in 0..ROTATE_ATTEMPTS {
            let stamp = Utc::now().format("%Y%m%d%H%M%S");
            let suffix: u32 = rng.gen_range(0..0x100_0000);
            let name = format!(
                "{}-{stamp}-{suffix:06x}",
                self.path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "slog".to_string())
            );
            let candidate = self.path.with_file_name(name);
            if candidate.exists() {
                continue;
            }
            std::fs::rename(&self.path, &candidate)?;
            return Ok(candidate);
        }
        Err(ChainError::Io(std::io::Error::other(
            "could not find a free rotation file name",
        )))
    }
}
