//! Line format and linking computation tests.

use sealog_types::{ClientId, HashAlg};

use crate::error::ChainError;
use crate::record::{ChainedRecord, LogRecord, PrevRecord};

use super::{message, signature, timestamp};

#[test]
fn test_first_row_linking_is_digest_of_empty_string() {
    let first = ChainedRecord::first_row(HashAlg::Sha256);
    assert_eq!(first.seq, 0);
    assert_eq!(first.linking_info, HashAlg::Sha256.digest_hex(b""));
}

#[test]
fn test_link_next_is_deterministic() {
    let prev = PrevRecord::first(HashAlg::Sha256);
    let a = ChainedRecord::link_next(&prev, message("q1"), HashAlg::Sha256);
    let b = ChainedRecord::link_next(&prev, message("q1"), HashAlg::Sha256);
    assert_eq!(a.seq, 1);
    assert_eq!(a.linking_info, b.linking_info);
}

#[test]
fn test_link_next_differs_per_payload_and_seq() {
    let prev = PrevRecord::first(HashAlg::Sha256);
    let a = ChainedRecord::link_next(&prev, message("q1"), HashAlg::Sha256);
    let b = ChainedRecord::link_next(&prev, message("q2"), HashAlg::Sha256);
    assert_ne!(a.linking_info, b.linking_info);

    let c = ChainedRecord::link_next(&a.prev_record(), message("q1"), HashAlg::Sha256);
    assert_eq!(c.seq, 2);
    assert_ne!(c.linking_info, a.linking_info);
}

#[test]
fn test_line_roundtrip_all_variants() {
    let mut prev = PrevRecord::first(HashAlg::Sha512);
    let records = vec![
        message("q1"),
        LogRecord::EncryptedMessage {
            query_id: "q2".into(),
            client: ClientId::member("XE", "COM", "42"),
            response: true,
        },
        signature("m1"),
        timestamp(&["m1", "m2"]),
        LogRecord::Todo {
            manifest_id: "m3".into(),
            digest_method: HashAlg::Sha256,
            digest: "abcd".into(),
        },
    ];

    for record in records {
        let chained = ChainedRecord::link_next(&prev, record, HashAlg::Sha512);
        let line = chained.to_line().unwrap();
        let parsed = ChainedRecord::parse(&line, 1).unwrap();
        assert_eq!(parsed, chained);
        if chained.record.advances_chain() {
            prev = chained.prev_record();
        }
    }
}

#[test]
fn test_timestamp_token_digest_renders_as_dash() {
    let prev = PrevRecord::first(HashAlg::Sha256);
    let chained = ChainedRecord::link_next(
        &prev,
        LogRecord::Timestamp {
            manifest_ids: vec!["m1".into()],
            token_digest: None,
        },
        HashAlg::Sha256,
    );
    let line = chained.to_line().unwrap();
    assert!(line.ends_with(" m1 -"), "line: {line}");

    let parsed = ChainedRecord::parse(&line, 1).unwrap();
    assert_eq!(parsed, chained);
}

#[test]
fn test_parse_rejects_short_line() {
    let err = ChainedRecord::parse("M 1 SHA-256", 7).unwrap_err();
    assert!(matches!(err, ChainError::MalformedRecord { line: 7, .. }));
}

#[test]
fn test_parse_rejects_unknown_tag() {
    let err = ChainedRecord::parse("X 1 SHA-256 aa 0", 1).unwrap_err();
    assert!(matches!(err, ChainError::MalformedRecord { .. }));
}

#[test]
fn test_parse_rejects_bad_field_values() {
    // bad seq
    assert!(ChainedRecord::parse("M x SHA-256 aa 0 q XE/GOV/1/s 0", 1).is_err());
    // bad alg
    assert!(ChainedRecord::parse("M 1 MD5 aa 0 q XE/GOV/1/s 0", 1).is_err());
    // bad response flag
    assert!(ChainedRecord::parse("M 1 SHA-256 aa 0 q XE/GOV/1/s yes", 1).is_err());
    // bad client id
    assert!(ChainedRecord::parse("M 1 SHA-256 aa 0 q XE/GOV 0", 1).is_err());
    // missing message fields
    assert!(ChainedRecord::parse("M 1 SHA-256 aa 0 q", 1).is_err());
}

#[test]
fn test_fields_with_whitespace_are_rejected() {
    let prev = PrevRecord::first(HashAlg::Sha256);
    let chained = ChainedRecord::link_next(
        &prev,
        LogRecord::Signature {
            manifest_id: "has space".into(),
            digest_method: HashAlg::Sha256,
            digest: "aa".into(),
        },
        HashAlg::Sha256,
    );
    assert!(matches!(
        chained.to_line().unwrap_err(),
        ChainError::InvalidField { .. }
    ));
}
