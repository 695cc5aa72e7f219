//! Error types for the record chain and log file store.

/// Errors that can occur while appending to or replaying the record log.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// A previously written line cannot be parsed during replay. Fatal to
    /// that replay; corrupt lines are never silently skipped.
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord {
        /// 1-based line number in the log file.
        line: u64,
        /// What failed to parse.
        reason: String,
    },

    /// A record field would break the line format.
    #[error("invalid record field {field:?}: must be non-empty and free of whitespace")]
    InvalidField {
        /// The offending field value.
        field: String,
    },

    /// An I/O error occurred. An append that fails this way gives no
    /// durability guarantee for the in-flight record.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
