//! Message log engine: logging and time-stamping entry points.
//!
//! [`LogManager`] owns the hash-chained log file, appends message and
//! signature records, and drives time-stamping of the signature backlog
//! through a [`Timestamper`]. The periodic [`TimestamperJob`] runs rounds on
//! a cadence with failure backoff; per-responder outcomes are exposed as a
//! diagnostics status map.

mod error;
mod job;
mod manager;
mod timestamper;

#[cfg(test)]
mod tests;

pub use error::EngineError;
pub use job::TimestamperJob;
pub use manager::{LogManager, MessageEntry, SignatureEntry, TimestampStatus};
pub use timestamper::{TimestampToken, Timestamper};
