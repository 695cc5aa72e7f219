//! Archiving of sealed, time-stamped log records.
//!
//! The [`LogArchiver`] drains eligible records from a [`RecordRepository`]
//! in group-contiguous order and rolls them into zip containers whose
//! entries extend a per-group digest chain persisted as a
//! [`DigestEntry`](sealog_types::DigestEntry) across runs. Containers are
//! optionally sealed for a set of recipient keys resolved by the
//! [`EncryptionProvider`] from a [`KeyStore`].

mod archiver;
mod encryption;
mod error;
mod keystore;
mod repository;
mod seal;
mod writer;

pub use archiver::LogArchiver;
pub use encryption::{EncryptionProvider, Recipients};
pub use error::ArchiveError;
pub use keystore::KeyStore;
pub use repository::{ArchiveRecord, RecordCursor, RecordRepository};
pub use seal::open_sealed;
pub use writer::{ContainerFile, LINKING_INFO_ENTRY, LogArchiveWriter, chain_digest};

#[cfg(test)]
mod tests;
