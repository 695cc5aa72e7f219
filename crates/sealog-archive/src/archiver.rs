//! Archiving loop: drains time-stamped records into digest-chained
//! containers, one bounded batch per pass.

use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::Arc;

use sealog_types::{ArchiveConfig, DigestEntry, Grouping, HashAlg};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::encryption::{EncryptionProvider, Recipients};
use crate::error::ArchiveError;
use crate::keystore::KeyStore;
use crate::repository::{RecordCursor, RecordRepository};
use crate::writer::{CREATE_ATTEMPTS, ContainerFile, LogArchiveWriter};

/// Page size of eligible-record reads within a pass.
const FETCH_PAGE: usize = 100;

/// Container being filled, with the record ids it must mark archived once
/// it is durable.
struct OpenContainer {
    writer: LogArchiveWriter,
    recipients: Option<Recipients>,
    record_ids: Vec<u64>,
}

/// Drains eligible records from the record store into archive containers.
///
/// One archiver owns one log; [`run`](LogArchiver::run) never executes two
/// cycles concurrently, a second call while one is in flight is a no-op.
pub struct LogArchiver {
    config: ArchiveConfig,
    hash_alg: HashAlg,
    repository: Arc<dyn RecordRepository>,
    encryption: EncryptionProvider,
    run_lock: tokio::sync::Mutex<()>,
}

impl LogArchiver {
    pub fn new(
        config: ArchiveConfig,
        hash_alg: HashAlg,
        repository: Arc<dyn RecordRepository>,
        key_store: Arc<dyn KeyStore>,
    ) -> Self {
        let encryption = EncryptionProvider::from_config(&config, key_store);
        Self {
            config,
            hash_alg,
            repository,
            encryption,
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn encryption(&self) -> &EncryptionProvider {
        &self.encryption
    }

    /// Run archiving to exhaustion: repeats bounded passes while each pass
    /// fills its batch. Returns the number of records archived.
    pub async fn run(&self) -> Result<u64, ArchiveError> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            warn!("archiving already in progress, skipping this cycle");
            return Ok(0);
        };

        let mut total = 0u64;
        loop {
            let count = self.run_once().await?;
            total += count as u64;
            if count < self.config.transaction_batch_size {
                break;
            }
        }
        if total > 0 {
            info!(records = total, "archiving cycle complete");
            self.run_transfer().await;
        }
        Ok(total)
    }

    /// One bounded archiving pass over records eligible at pass start.
    /// Records are read in pages and marked archived only once the
    /// container holding them is durable.
    async fn run_once(&self) -> Result<usize, ArchiveError> {
        self.validate_output_dir()?;

        // Stable upper bound: records logged mid-pass wait for the next one.
        let Some(max_id) = self.repository.max_eligible_id().await? else {
            return Ok(0);
        };

        let mut open: Option<OpenContainer> = None;
        let mut cursor: Option<RecordCursor> = None;
        let mut count = 0usize;
        loop {
            let remaining = self.config.transaction_batch_size - count;
            if remaining == 0 {
                break;
            }
            let wanted = FETCH_PAGE.min(remaining);
            let page = self
                .repository
                .fetch_eligible(max_id, cursor.as_ref(), wanted)
                .await?;
            let exhausted = page.len() < wanted;
            for record in page {
                cursor = Some(record.cursor());
                let group = self.config.grouping.resolve(&record.client);
                let recipients = self.encryption.recipients(&group).await?;

                let rollover = match open.as_ref() {
                    Some(c) => *c.writer.group() != group || c.recipients != recipients,
                    None => true,
                };
                if rollover {
                    if let Some(c) = open.take() {
                        self.finalize(c).await?;
                    }
                    let prev = self.repository.load_last_archive(&group).await?;
                    open = Some(OpenContainer {
                        writer: LogArchiveWriter::new(
                            group,
                            prev,
                            self.hash_alg,
                            &self.config.output_dir,
                        )?,
                        recipients,
                        record_ids: Vec::new(),
                    });
                }
                if let Some(c) = open.as_mut() {
                    c.writer.append(&record)?;
                    c.record_ids.push(record.id);
                }
                count += 1;
            }
            if exhausted {
                break;
            }
        }
        if let Some(c) = open.take() {
            self.finalize(c).await?;
        }

        let swept = self.repository.mark_stale_timestamps_archived().await?;
        if swept > 0 {
            debug!(records = swept, "marked fully-archived timestamp records");
        }
        Ok(count)
    }

    /// Seal and persist one finished container, record the group's new
    /// chain digest, mark its records archived and fire the transfer hook.
    /// The archived flags are flipped last: a failure before that leaves
    /// every record of the container eligible for the next pass.
    async fn finalize(&self, open: OpenContainer) -> Result<(), ArchiveError> {
        let OpenContainer {
            writer,
            recipients,
            record_ids,
        } = open;
        let group = writer.group().clone();
        let records = writer.records();
        let (container, digest) = writer.finish()?;

        let file_name = match &recipients {
            Some(recipients) => {
                let plain = tokio::fs::read(container.path()).await?;
                let sealed = self.encryption.seal(recipients, plain).await?;
                self.write_container(&group, &sealed, ".sealed").await?
            }
            None => self.persist_container(&group, container).await?,
        };
        self.repository
            .save_last_archive(
                &group,
                DigestEntry {
                    digest,
                    file_name: file_name.clone(),
                },
            )
            .await?;
        for id in record_ids {
            self.repository.mark_archived(id).await?;
        }
        info!(group = %group, file = %file_name, records, "archive container written");

        self.run_transfer().await;
        Ok(())
    }

    /// Fresh timestamped container name.
    fn container_name(&self, group: &Grouping, suffix: &str) -> String {
        let group_part = match group.name() {
            Some(name) => {
                let sanitized: String = name
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric() { c } else { '.' })
                    .collect();
                format!("-{sanitized}")
            }
            None => String::new(),
        };
        let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
        let random: u32 = rand::random::<u32>() & 0xff_ffff;
        format!("mlog{group_part}-{stamp}-{random:06x}.zip{suffix}")
    }

    /// Move a streamed container from its temporary name to a final one,
    /// retrying on name collision.
    async fn persist_container(
        &self,
        group: &Grouping,
        container: ContainerFile,
    ) -> Result<String, ArchiveError> {
        for _ in 0..CREATE_ATTEMPTS {
            let file_name = self.container_name(group, "");
            let path = self.config.output_dir.join(&file_name);
            // Reserve the name, then move the temp file over the placeholder.
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(_) => {
                    tokio::fs::rename(container.into_path(), &path).await?;
                    return Ok(file_name);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ArchiveError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            "no free archive container name after repeated attempts",
        )))
    }

    /// Write container bytes under a fresh timestamped name, retrying on
    /// name collision.
    async fn write_container(
        &self,
        group: &Grouping,
        bytes: &[u8],
        suffix: &str,
    ) -> Result<String, ArchiveError> {
        for _ in 0..CREATE_ATTEMPTS {
            let file_name = self.container_name(group, suffix);
            let path = self.config.output_dir.join(&file_name);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(bytes).await?;
                    file.sync_all().await?;
                    return Ok(file_name);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ArchiveError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            "no free archive container name after repeated attempts",
        )))
    }

    fn validate_output_dir(&self) -> Result<(), ArchiveError> {
        let path = &self.config.output_dir;
        let invalid = |reason| ArchiveError::InvalidOutputDir {
            path: path.clone(),
            reason,
        };
        let meta = std::fs::metadata(path).map_err(|_| invalid("does not exist"))?;
        if !meta.is_dir() {
            return Err(invalid("not a directory"));
        }
        if meta.permissions().readonly() {
            return Err(invalid("not writable"));
        }
        Ok(())
    }

    /// Best effort transfer hook. stdout is discarded, stderr is captured
    /// for the log; a non-zero exit never fails the archiving transaction.
    async fn run_transfer(&self) {
        let Some(command) = &self.config.transfer_command else {
            return;
        };
        let result = Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;
        match result {
            Ok(output) if output.status.success() => {
                debug!("archive transfer command completed");
            }
            Ok(output) => {
                warn!(
                    status = %output.status,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "archive transfer command failed"
                );
            }
            Err(e) => {
                warn!(error = %e, "archive transfer command could not be started");
            }
        }
    }
}
