//! Record variants, the previous-record contract and linking-hash computation.
//!
//! On disk every record is one newline-delimited text line:
//! `<tag> <seq> <hash-alg> <linking-info> <timestamp-millis> [fields...]`,
//! space separated, with absent optional values rendered as a single dash.
//! The linking info binds each record to its predecessor: it is the digest of
//! the predecessor's algorithm and linking info concatenated with this
//! record's own type tag, sequence number and custom fields.

use chrono::Utc;
use sealog_types::{ClientId, HashAlg};

use crate::error::ChainError;

type Result<T> = std::result::Result<T, ChainError>;

/// A record payload, tagged by type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// First row of a log file. A fresh log starts from it; a rotated file's
    /// first row carries the pre-rotation chain state in its line columns.
    FirstRow,
    /// A logged message.
    Message {
        query_id: String,
        client: ClientId,
        response: bool,
    },
    /// A logged message whose payload is stored encrypted at rest.
    EncryptedMessage {
        query_id: String,
        client: ClientId,
        response: bool,
    },
    /// A message signature awaiting a time-stamp, identified by its
    /// time-stamp manifest.
    Signature {
        manifest_id: String,
        digest_method: HashAlg,
        digest: String,
    },
    /// A time-stamp sealing one or more signature manifests. The token
    /// digest is absent when the responder returned no token material.
    Timestamp {
        manifest_ids: Vec<String>,
        token_digest: Option<String>,
    },
    /// Backlog marker written during rotation so the fresh file replays to
    /// the same todo backlog without the old file.
    Todo {
        manifest_id: String,
        digest_method: HashAlg,
        digest: String,
    },
}

impl LogRecord {
    /// One-character type tag leading the log line.
    pub fn tag(&self) -> char {
        match self {
            LogRecord::FirstRow => '#',
            LogRecord::Message { .. } => 'M',
            LogRecord::EncryptedMessage { .. } => 'E',
            LogRecord::Signature { .. } => 'S',
            LogRecord::Timestamp { .. } => 'T',
            LogRecord::Todo { .. } => '?',
        }
    }

    /// Whether this record becomes the chain's previous record once written.
    /// Todo markers re-seed the backlog only and never advance the chain.
    pub fn advances_chain(&self) -> bool {
        !matches!(self, LogRecord::Todo { .. })
    }

    /// Type-specific line fields, in on-disk order.
    fn custom_fields(&self) -> Vec<String> {
        match self {
            LogRecord::FirstRow => Vec::new(),
            LogRecord::Message {
                query_id,
                client,
                response,
            }
            | LogRecord::EncryptedMessage {
                query_id,
                client,
                response,
            } => vec![
                query_id.clone(),
                client.to_string(),
                if *response { "1" } else { "0" }.to_string(),
            ],
            LogRecord::Signature {
                manifest_id,
                digest_method,
                digest,
            }
            | LogRecord::Todo {
                manifest_id,
                digest_method,
                digest,
            } => vec![manifest_id.clone(), digest_method.to_string(), digest.clone()],
            LogRecord::Timestamp {
                manifest_ids,
                token_digest,
            } => vec![
                manifest_ids.join(","),
                token_digest.clone().unwrap_or_else(|| "-".to_string()),
            ],
        }
    }
}

/// Chain state exposed by the most recently written record.
///
/// A fresh log's first row satisfies this with sequence 0 and the digest of
/// the empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrevRecord {
    /// Sequence number of the last chained record.
    pub seq: u64,
    /// Digest algorithm the last record was linked with.
    pub alg: HashAlg,
    /// Lowercase-hex linking info of the last record.
    pub linking_info: String,
}

impl PrevRecord {
    /// Chain state of an empty log: sequence 0, `digest(alg, "")`.
    pub fn first(alg: HashAlg) -> Self {
        Self {
            seq: 0,
            alg,
            linking_info: alg.digest_hex(b""),
        }
    }
}

/// A record bound into the chain: payload plus line columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainedRecord {
    /// Monotonically increasing sequence number.
    pub seq: u64,
    /// Algorithm this record's linking info was computed with.
    pub alg: HashAlg,
    /// Lowercase-hex linking digest.
    pub linking_info: String,
    /// Recording time, milliseconds since the Unix epoch.
    pub time_millis: i64,
    /// The record payload.
    pub record: LogRecord,
}

impl ChainedRecord {
    /// Link `record` to the chain after `prev`.
    ///
    /// Deterministic: identical inputs always yield identical sequence and
    /// linking info, which replay verification relies on. The recording
    /// time is taken from the wall clock and is not part of the link.
    pub fn link_next(prev: &PrevRecord, record: LogRecord, alg: HashAlg) -> Self {
        let seq = prev.seq + 1;
        let linking_info = linking_digest(prev, &record, seq, alg);
        Self {
            seq,
            alg,
            linking_info,
            time_millis: Utc::now().timestamp_millis(),
            record,
        }
    }

    /// The first row of an empty log file.
    pub fn first_row(alg: HashAlg) -> Self {
        let first = PrevRecord::first(alg);
        Self {
            seq: first.seq,
            alg,
            linking_info: first.linking_info,
            time_millis: Utc::now().timestamp_millis(),
            record: LogRecord::FirstRow,
        }
    }

    /// Chain state this record exposes to its successor.
    pub fn prev_record(&self) -> PrevRecord {
        PrevRecord {
            seq: self.seq,
            alg: self.alg,
            linking_info: self.linking_info.clone(),
        }
    }

    /// Serialize to one log line (no trailing newline).
    pub fn to_line(&self) -> Result<String> {
        let mut line = format!(
            "{} {} {} {} {}",
            self.record.tag(),
            self.seq,
            self.alg,
            self.linking_info,
            self.time_millis
        );
        for field in self.record.custom_fields() {
            check_field(&field)?;
            line.push(' ');
            line.push_str(&field);
        }
        Ok(line)
    }

    /// Parse a log line written by [`Self::to_line`].
    ///
    /// `line_no` is used for error reporting only.
    pub fn parse(line: &str, line_no: u64) -> Result<Self> {
        let malformed = |reason: &str| ChainError::MalformedRecord {
            line: line_no,
            reason: reason.to_string(),
        };

        let fields: Vec<&str> = line.split(' ').collect();
        if fields.len() < 5 {
            return Err(malformed("fewer than 5 fields"));
        }

        let tag = fields[0];
        let seq: u64 = fields[1].parse().map_err(|_| malformed("bad sequence number"))?;
        let alg: HashAlg = fields[2].parse().map_err(|_| malformed("bad hash algorithm"))?;
        let linking_info = fields[3].to_string();
        let time_millis: i64 = fields[4].parse().map_err(|_| malformed("bad timestamp"))?;
        let rest = &fields[5..];

        let record = match tag {
            "#" => LogRecord::FirstRow,
            "M" | "E" => {
                let [query_id, client, response] = rest else {
                    return Err(malformed("message record needs 3 fields"));
                };
                let client = ClientId::parse(client)
                    .ok_or_else(|| malformed("bad client identifier"))?;
                let response = match *response {
                    "1" => true,
                    "0" => false,
                    _ => return Err(malformed("bad response flag")),
                };
                let query_id = query_id.to_string();
                if tag == "M" {
                    LogRecord::Message {
                        query_id,
                        client,
                        response,
                    }
                } else {
                    LogRecord::EncryptedMessage {
                        query_id,
                        client,
                        response,
                    }
                }
            }
            "S" | "?" => {
                let [manifest_id, method, digest] = rest else {
                    return Err(malformed("signature record needs 3 fields"));
                };
                let digest_method: HashAlg =
                    method.parse().map_err(|_| malformed("bad digest method"))?;
                let manifest_id = manifest_id.to_string();
                let digest = digest.to_string();
                if tag == "S" {
                    LogRecord::Signature {
                        manifest_id,
                        digest_method,
                        digest,
                    }
                } else {
                    LogRecord::Todo {
                        manifest_id,
                        digest_method,
                        digest,
                    }
                }
            }
            "T" => {
                let [manifest_ids, token_digest] = rest else {
                    return Err(malformed("timestamp record needs 2 fields"));
                };
                LogRecord::Timestamp {
                    manifest_ids: manifest_ids.split(',').map(str::to_string).collect(),
                    token_digest: match *token_digest {
                        "-" => None,
                        other => Some(other.to_string()),
                    },
                }
            }
            _ => return Err(malformed("unknown record tag")),
        };

        Ok(Self {
            seq,
            alg,
            linking_info,
            time_millis,
            record,
        })
    }
}

/// Compute the linking digest binding `record` to `prev`.
fn linking_digest(prev: &PrevRecord, record: &LogRecord, seq: u64, alg: HashAlg) -> String {
    let mut input = format!(
        "{} {} {} {}",
        prev.alg,
        prev.linking_info,
        record.tag(),
        seq
    );
    for field in record.custom_fields() {
        input.push(' ');
        input.push_str(&field);
    }
    alg.digest_hex(input.as_bytes())
}

/// Line fields are space separated, so a field must be non-empty and must
/// not contain whitespace.
fn check_field(field: &str) -> Result<()> {
    if field.is_empty() || field.contains(char::is_whitespace) {
        return Err(ChainError::InvalidField {
            field: field.to_string(),
        });
    }
    Ok(())
}
