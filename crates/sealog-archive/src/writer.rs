//! Archive container writer: one zip per (group, batch window) with a
//! rolling digest chained from the group's previous archive.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use sealog_types::{DigestEntry, Grouping, HashAlg};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::ArchiveError;
use crate::repository::ArchiveRecord;

/// Name of the trailing digest-chain entry inside every container.
pub const LINKING_INFO_ENTRY: &str = "linkinginfo";

/// Attempts at finding an unused container file name.
pub(crate) const CREATE_ATTEMPTS: usize = 100;

/// A finished container in its temporary on-disk location. The file is
/// removed on drop unless claimed with
/// [`into_path`](ContainerFile::into_path).
pub struct ContainerFile {
    path: PathBuf,
    keep: bool,
}

impl ContainerFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Claim the file: it survives drop and now belongs to the caller.
    pub fn into_path(mut self) -> PathBuf {
        self.keep = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ContainerFile {
    fn drop(&mut self) {
        if !self.keep {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Streams one archive container to a temporary file in the output
/// directory, keeping memory use independent of the batch size.
///
/// Each record entry extends a rolling digest seeded from the group's last
/// [`DigestEntry`]; the chain is written as the final `linkinginfo` entry so
/// a container is verifiable against its predecessor's digest alone.
pub struct LogArchiveWriter {
    group: Grouping,
    alg: HashAlg,
    zip: ZipWriter<BufWriter<File>>,
    tmp: ContainerFile,
    rolling: String,
    lines: Vec<String>,
    records: usize,
}

impl LogArchiveWriter {
    pub fn new(
        group: Grouping,
        prev: DigestEntry,
        alg: HashAlg,
        dir: &Path,
    ) -> Result<Self, ArchiveError> {
        let (file, tmp) = Self::create_temp(dir)?;
        let header = if prev.is_empty() {
            format!("- {alg}")
        } else {
            format!("{} {alg}", prev.digest)
        };
        Ok(Self {
            group,
            alg,
            zip: ZipWriter::new(BufWriter::new(file)),
            tmp,
            rolling: prev.digest,
            lines: vec![header],
            records: 0,
        })
    }

    fn create_temp(dir: &Path) -> Result<(File, ContainerFile), ArchiveError> {
        for _ in 0..CREATE_ATTEMPTS {
            let random: u32 = rand::random::<u32>() & 0xff_ffff;
            let path = dir.join(format!(".mlog-{random:06x}.tmp"));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((file, ContainerFile { path, keep: false })),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ArchiveError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            "no free temporary container name after repeated attempts",
        )))
    }

    pub fn group(&self) -> &Grouping {
        &self.group
    }

    pub fn records(&self) -> usize {
        self.records
    }

    /// Append one record entry and extend the digest chain.
    pub fn append(&mut self, record: &ArchiveRecord) -> Result<(), ArchiveError> {
        let name = record.entry_name();
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.zip.start_file(&name, options)?;
        self.zip.write_all(&record.body)?;

        let entry_digest = self.alg.digest_hex(&record.body);
        self.rolling = self
            .alg
            .digest_hex(format!("{}{entry_digest}", self.rolling).as_bytes());
        self.lines.push(format!("{entry_digest} {name}"));
        self.records += 1;
        Ok(())
    }

    /// Write the trailing `linkinginfo` entry and close the container.
    /// Returns the synced temporary file and the digest the group's next
    /// archive chains from.
    pub fn finish(mut self) -> Result<(ContainerFile, String), ArchiveError> {
        self.lines.push(self.rolling.clone());

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.zip.start_file(LINKING_INFO_ENTRY, options)?;
        let mut body = self.lines.join("\n");
        body.push('\n');
        self.zip.write_all(body.as_bytes())?;

        let mut out = self.zip.finish()?;
        out.flush()?;
        out.get_ref().sync_data()?;
        Ok((self.tmp, self.rolling))
    }
}

/// Recompute the digest chain the writer produces, for verification.
pub fn chain_digest(prev: &DigestEntry, bodies: &[&[u8]], alg: HashAlg) -> String {
    let mut rolling = prev.digest.clone();
    for body in bodies {
        let entry = alg.digest_hex(body);
        rolling = alg.digest_hex(format!("{rolling}{entry}").as_bytes());
    }
    rolling
}
