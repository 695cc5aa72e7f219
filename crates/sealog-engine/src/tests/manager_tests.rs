use std::sync::atomic::Ordering;

use tempfile::TempDir;

use crate::error::EngineError;
use crate::tests::{MockTimestamper, TSA_URL, config, entry, manager};

#[tokio::test]
async fn logged_records_enter_the_backlog() {
    let dir = TempDir::new().unwrap();
    let manager = manager(config(&dir), MockTimestamper::new());

    let (message, signature) = entry(1);
    // Message record gets seq 1, signature record seq 2.
    assert_eq!(manager.log(message, signature).await.unwrap(), 2);
    assert_eq!(manager.pending_count(), 1);
}

#[tokio::test]
async fn a_round_seals_the_backlog_and_records_success() {
    let dir = TempDir::new().unwrap();
    let mock = MockTimestamper::new();
    let manager = manager(config(&dir), mock.clone());

    for n in 1..=3 {
        let (message, signature) = entry(n);
        manager.log(message, signature).await.unwrap();
    }
    assert_eq!(manager.timestamp_pending().await.unwrap(), 3);
    assert_eq!(manager.pending_count(), 0);
    assert_eq!(
        *mock.stamped.lock().unwrap(),
        vec!["m1".to_string(), "m2".to_string(), "m3".to_string()]
    );

    let diagnostics = manager.diagnostics();
    let status = diagnostics.get(TSA_URL).unwrap();
    assert!(status.ok);
    assert_eq!(status.message, None);
}

#[tokio::test]
async fn a_failed_round_restores_the_backlog_for_retry() {
    let dir = TempDir::new().unwrap();
    let mock = MockTimestamper::failing();
    let manager = manager(config(&dir), mock.clone());

    let (message, signature) = entry(1);
    manager.log(message, signature).await.unwrap();

    let err = manager.timestamp_pending().await.unwrap_err();
    assert!(matches!(err, EngineError::Timestamping { .. }));
    assert_eq!(manager.pending_count(), 1);
    assert!(!manager.diagnostics().get(TSA_URL).unwrap().ok);

    // Entries are available again once the responder recovers.
    mock.fails.store(false, Ordering::SeqCst);
    assert_eq!(manager.timestamp_pending().await.unwrap(), 1);
    assert_eq!(manager.pending_count(), 0);
    assert!(manager.diagnostics().get(TSA_URL).unwrap().ok);
}

#[tokio::test]
async fn prolonged_failure_refuses_new_messages() {
    let dir = TempDir::new().unwrap();
    let mock = MockTimestamper::failing();
    let mut config = config(&dir);
    config.acceptable_timestamp_failure_period = 1;
    let manager = manager(config, mock.clone());

    let (message, signature) = entry(1);
    manager.log(message, signature).await.unwrap();
    manager.timestamp_pending().await.unwrap_err();

    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let (message, signature) = entry(2);
    let err = manager.log(message, signature).await.unwrap_err();
    assert!(matches!(err, EngineError::TimestampingStalled { .. }));

    // One successful round clears the refusal.
    mock.fails.store(false, Ordering::SeqCst);
    manager.timestamp_pending().await.unwrap();
    let (message, signature) = entry(3);
    assert!(manager.log(message, signature).await.is_ok());
}

#[tokio::test]
async fn zero_failure_period_disables_the_check() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.acceptable_timestamp_failure_period = 0;
    let manager = manager(config, MockTimestamper::failing());

    let (message, signature) = entry(1);
    manager.log(message, signature).await.unwrap();
    manager.timestamp_pending().await.unwrap_err();

    let (message, signature) = entry(2);
    assert!(manager.log(message, signature).await.is_ok());
}

#[tokio::test]
async fn timestamp_immediately_stamps_synchronously() {
    let dir = TempDir::new().unwrap();
    let mock = MockTimestamper::new();
    let mut config = config(&dir);
    config.timestamp_immediately = true;
    let manager = manager(config, mock.clone());

    let (message, signature) = entry(1);
    manager.log(message, signature).await.unwrap();
    assert_eq!(manager.pending_count(), 0);
    assert_eq!(mock.rounds.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn timestamp_by_manifest_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let mock = MockTimestamper::new();
    let manager = manager(config(&dir), mock.clone());

    let (message, signature) = entry(1);
    manager.log(message, signature).await.unwrap();

    let seq = manager.timestamp("m1").await.unwrap();
    assert_eq!(manager.pending_count(), 0);
    // Stamping an already-stamped manifest returns the existing record.
    assert_eq!(manager.timestamp("m1").await.unwrap(), seq);
    assert_eq!(mock.rounds.load(Ordering::SeqCst), 1);

    let err = manager.timestamp("never-logged").await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownManifest { .. }));
}

#[tokio::test]
async fn timestamp_waits_for_a_round_already_holding_the_manifest() {
    let dir = TempDir::new().unwrap();
    let mock = MockTimestamper::new();
    let manager = manager(config(&dir), mock.clone());

    let (message, signature) = entry(1);
    manager.log(message, signature).await.unwrap();

    // Occupy the manifest with a slow concurrent round.
    mock.delay_ms.store(100, Ordering::SeqCst);
    let round = tokio::spawn({
        let manager = std::sync::Arc::clone(&manager);
        async move { manager.timestamp_pending().await }
    });
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let seq = manager.timestamp("m1").await.unwrap();
    assert_eq!(round.await.unwrap().unwrap(), 1);
    assert_eq!(manager.timestamp("m1").await.unwrap(), seq);
    // The waiting call never ran a round of its own.
    assert_eq!(mock.rounds.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn duplicate_signature_submission_reuses_the_record() {
    let dir = TempDir::new().unwrap();
    let manager = manager(config(&dir), MockTimestamper::new());

    let (message, signature) = entry(1);
    let seq = manager.log(message, signature).await.unwrap();
    let (message, signature) = entry(1);
    assert_eq!(manager.log(message, signature).await.unwrap(), seq);
    // The duplicate manifest was skipped, not queued twice.
    assert_eq!(manager.pending_count(), 1);
}

#[tokio::test]
async fn oversized_log_rotates_during_logging() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.rotation_size = 64;
    let manager = manager(config, MockTimestamper::new());

    for n in 1..=3 {
        let (message, signature) = entry(n);
        manager.log(message, signature).await.unwrap();
    }

    let rotated = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("slog-"))
        .count();
    assert!(rotated >= 1);
    // The backlog survives rotation.
    assert_eq!(manager.pending_count(), 3);
}
