//! Append-only, hash-chained record log.
//!
//! Every exchanged message produces records in a durable log file where each
//! record's linking info is a digest over its predecessor, forming a tamper
//! evident chain verifiable in sequence order from the first row. The crate
//! covers the record model ([`LogRecord`], [`ChainedRecord`]), the durable
//! file store ([`LogFile`]) with rotation and crash-safe replay, and the
//! time-stamp backlog ([`TodoBacklog`]) of signature records awaiting a
//! time-stamp.

mod backlog;
mod error;
mod file;
mod record;
mod state;

#[cfg(test)]
mod tests;

pub use backlog::{TodoBacklog, TodoEntry};
pub use error::ChainError;
pub use file::LogFile;
pub use record::{ChainedRecord, LogRecord, PrevRecord};
pub use state::LogState;
