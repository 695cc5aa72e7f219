//! Error types for archiving.

use std::path::PathBuf;

/// Failures raised by the archiver and its collaborators.
///
/// A failure inside one archiving batch aborts that batch; already
/// finalized containers stay valid and the scheduler retries on its next
/// interval.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The configured output directory is missing, not a directory, or not
    /// writable. Checked before every run.
    #[error("archive output directory {path} unusable: {reason}")]
    InvalidOutputDir {
        path: PathBuf,
        reason: &'static str,
    },

    /// The record store reported a failure.
    #[error("record store failure: {message}")]
    Repository { message: String },

    /// The key store reported a failure.
    #[error("key store failure: {message}")]
    KeyStore { message: String },

    /// No recipient key of a container could be resolved to key material.
    #[error("archive encryption failed: {message}")]
    Encryption { message: String },

    /// A sealed container could not be parsed or authenticated.
    #[error("sealed container rejected: {message}")]
    SealedContainer { message: String },

    /// Building the zip container failed.
    #[error("archive container failure")]
    Container(#[from] zip::result::ZipError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// Wrap a record store failure.
    pub fn repository(err: impl std::fmt::Display) -> Self {
        ArchiveError::Repository {
            message: err.to_string(),
        }
    }

    /// Wrap a key store failure.
    pub fn key_store(err: impl std::fmt::Display) -> Self {
        ArchiveError::KeyStore {
            message: err.to_string(),
        }
    }

    pub(crate) fn encryption(message: impl Into<String>) -> Self {
        ArchiveError::Encryption {
            message: message.into(),
        }
    }

    pub(crate) fn sealed(message: impl Into<String>) -> Self {
        ArchiveError::SealedContainer {
            message: message.into(),
        }
    }
}
