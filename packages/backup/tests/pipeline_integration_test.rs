//! End-to-end pipeline tests against in-memory stubs
//!
//! Covers the full run: key import → enumerate → fetch → encrypt → upload.

mod common;

use chrono::{TimeZone, Utc};
use common::{
    RecordingSink, StubParameterStore, config_with_key, recipient_fingerprint, recipient_secret_key,
    write_public_key,
};
use parameterstore_backup::services::decrypt_armored;
use parameterstore_backup::{BackupError, BackupPipeline, MissingValuePolicy, ParameterRecord};

fn run_date() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 4, 3, 15, 0).unwrap()
}

#[tokio::test]
async fn test_backup_uploads_identical_bytes_to_both_buckets() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_with_key(write_public_key(dir.path()));
    let pipeline = BackupPipeline::new(config, StubParameterStore::with_count(23), RecordingSink::default());

    let (report, artifact) = pipeline.run_with_artifact(run_date()).await.expect("backup");

    assert_eq!(report.parameters, 23);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.batches, 3);
    assert_eq!(report.date_stamp, "20240704");
    assert_eq!(
        report.object_key,
        "parameterstore/backup/parameterstore-backup-20240704.gpg"
    );

    let uploads = pipeline_sink_uploads(&pipeline);
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0].0.bucket, "backups-primary");
    assert_eq!(uploads[1].0.bucket, "backups-replica");
    assert_ne!(uploads[0].0.region, uploads[1].0.region);
    assert_eq!(uploads[0].1, report.object_key);
    assert_eq!(uploads[1].1, report.object_key);
    assert_eq!(uploads[0].2, uploads[1].2);
    assert_eq!(uploads[0].2, artifact.armored.as_bytes());
    assert!(artifact.armored.starts_with("-----BEGIN PGP MESSAGE-----"));
    assert_eq!(report.uploaded.len(), 2);
}

#[tokio::test]
async fn test_uploaded_artifact_decrypts_to_json_lines_in_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_with_key(write_public_key(dir.path()));
    let store = StubParameterStore::new(vec![
        ("/z/last-alphabetically".to_string(), "z".to_string()),
        ("/a/db/password".to_string(), "p@ss\nword".to_string()),
        ("/m/unicode".to_string(), "päßwörd ✓".to_string()),
    ]);
    let pipeline = BackupPipeline::new(config, store, RecordingSink::default());

    pipeline.run(run_date()).await.expect("backup");

    let uploads = pipeline_sink_uploads(&pipeline);
    let armored = String::from_utf8(uploads[0].2.clone()).expect("ascii armor");
    let plaintext = decrypt_armored(recipient_secret_key(), &armored).expect("decrypt");
    let text = std::str::from_utf8(&plaintext).expect("utf8");

    let records: Vec<ParameterRecord> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(records.len(), 3);
    assert!(text.ends_with('\n'));

    let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["/z/last-alphabetically", "/a/db/password", "/m/unicode"]);
    assert_eq!(records[1].value(), Some("p@ss\nword"));
    assert_eq!(records[2].value(), Some("päßwörd ✓"));
    assert_eq!(records[0].r#type.as_deref(), Some("SecureString"));
}

#[tokio::test]
async fn test_batches_are_ceiling_and_never_empty() {
    for count in [0usize, 1, 9, 10, 11, 30, 31] {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_with_key(write_public_key(dir.path()));
        let pipeline = BackupPipeline::new(config, StubParameterStore::with_count(count), RecordingSink::default());

        let report = pipeline.run(run_date()).await.expect("backup");

        let expected = count.div_ceil(10);
        assert_eq!(report.batches, expected, "count = {}", count);
        let batches = pipeline_source_batches(&pipeline);
        assert_eq!(batches.len(), expected);
        assert!(batches.iter().all(|b| (1..=10).contains(&b.len())));
        assert_eq!(batches.iter().map(Vec::len).sum::<usize>(), count);
    }
}

#[tokio::test]
async fn test_missing_key_file_fails_before_network() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_with_key(dir.path().join("does-not-exist.asc"));
    let pipeline = BackupPipeline::new(config, StubParameterStore::with_count(5), RecordingSink::default());

    let err = pipeline.run(run_date()).await.unwrap_err();

    assert!(matches!(err, BackupError::KeyImport(_)));
    assert!(err.is_local());
    assert_eq!(pipeline_network_calls(&pipeline), 0);
    assert!(pipeline_sink_uploads(&pipeline).is_empty());
}

#[tokio::test]
async fn test_pin_mismatch_fails_before_network() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = config_with_key(write_public_key(dir.path()));
    config.pinned_fingerprint = Some("0".repeat(64));
    let pipeline = BackupPipeline::new(config, StubParameterStore::with_count(5), RecordingSink::default());

    let err = pipeline.run(run_date()).await.unwrap_err();

    assert!(matches!(err, BackupError::FingerprintMismatch { .. }));
    assert_eq!(pipeline_network_calls(&pipeline), 0);
    assert!(pipeline_sink_uploads(&pipeline).is_empty());
}

#[tokio::test]
async fn test_matching_pin_allows_backup() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = config_with_key(write_public_key(dir.path()));
    let fingerprint = recipient_fingerprint();
    config.pinned_fingerprint = Some(fingerprint.to_uppercase());
    let pipeline = BackupPipeline::new(config, StubParameterStore::with_count(2), RecordingSink::default());

    let report = pipeline.run(run_date()).await.expect("backup");
    assert_eq!(report.encryption.recipient, fingerprint);
    assert!(report.encryption.ok);
    assert_eq!(report.encryption.status, "encrypted to 1 key(s)");
}

#[tokio::test]
async fn test_sign_only_key_fails_before_network() {
    let dir = tempfile::tempdir().expect("tempdir");
    let key_file = dir.path().join("mixed.pub.asc");
    std::fs::write(&key_file, include_str!("fixtures/recipient-and-signer.pub.asc")).expect("write");
    let pipeline = BackupPipeline::new(
        config_with_key(key_file),
        StubParameterStore::with_count(5),
        RecordingSink::default(),
    );

    let err = pipeline.run(run_date()).await.unwrap_err();

    assert!(matches!(err, BackupError::KeyImport(_)));
    assert_eq!(pipeline_network_calls(&pipeline), 0);
}

#[tokio::test]
async fn test_unreadable_parameter_fails_run_without_upload() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_with_key(write_public_key(dir.path()));
    let mut store = StubParameterStore::with_count(12);
    store.unreadable.insert("/service/param-004".to_string());
    let pipeline = BackupPipeline::new(config, store, RecordingSink::default());

    let err = pipeline.run(run_date()).await.unwrap_err();

    match err {
        BackupError::MissingValue { name } => assert_eq!(name, "/service/param-004"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(pipeline_sink_uploads(&pipeline).is_empty());
}

#[tokio::test]
async fn test_unreadable_parameter_skipped_when_configured() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = config_with_key(write_public_key(dir.path()));
    config.missing_values = MissingValuePolicy::Skip;
    let mut store = StubParameterStore::with_count(12);
    store.unreadable.insert("/service/param-004".to_string());
    let pipeline = BackupPipeline::new(config, store, RecordingSink::default());

    let report = pipeline.run(run_date()).await.expect("backup");

    assert_eq!(report.parameters, 11);
    assert_eq!(report.skipped, 1);

    let uploads = pipeline_sink_uploads(&pipeline);
    let armored = String::from_utf8(uploads[0].2.clone()).expect("ascii armor");
    let plaintext = decrypt_armored(recipient_secret_key(), &armored).expect("decrypt");
    let text = std::str::from_utf8(&plaintext).expect("utf8");
    assert_eq!(text.lines().count(), 11);
    assert!(!text.contains("/service/param-004"));
}

#[tokio::test]
async fn test_dry_run_uploads_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = config_with_key(write_public_key(dir.path()));
    config.dry_run = true;
    let pipeline = BackupPipeline::new(config, StubParameterStore::with_count(4), RecordingSink::default());

    let report = pipeline.run(run_date()).await.expect("backup");

    assert!(report.dry_run);
    assert!(report.uploaded.is_empty());
    assert!(report.encryption.armored_len > 0);
    assert!(pipeline_sink_uploads(&pipeline).is_empty());
}

#[tokio::test]
async fn test_upload_failure_propagates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_with_key(write_public_key(dir.path()));
    let sink = RecordingSink {
        fail_bucket: Some("backups-replica".to_string()),
        ..RecordingSink::default()
    };
    let pipeline = BackupPipeline::new(config, StubParameterStore::with_count(3), sink);

    let err = pipeline.run(run_date()).await.unwrap_err();

    assert!(matches!(err, BackupError::Upload { ref bucket, .. } if bucket == "backups-replica"));
    assert!(!err.is_local());
    assert_eq!(pipeline_sink_uploads(&pipeline).len(), 1);
}

#[tokio::test]
async fn test_invalid_config_rejected_before_key_import() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = config_with_key(write_public_key(dir.path()));
    config.targets.clear();
    let pipeline = BackupPipeline::new(config, StubParameterStore::with_count(3), RecordingSink::default());

    let err = pipeline.run(run_date()).await.unwrap_err();
    assert!(matches!(err, BackupError::Configuration(_)));
    assert_eq!(pipeline_network_calls(&pipeline), 0);
}

fn pipeline_sink_uploads(
    pipeline: &BackupPipeline<StubParameterStore, RecordingSink>,
) -> Vec<(parameterstore_backup::UploadTarget, String, Vec<u8>)> {
    pipeline.sink().uploads.lock().expect("lock").clone()
}

fn pipeline_source_batches(pipeline: &BackupPipeline<StubParameterStore, RecordingSink>) -> Vec<Vec<String>> {
    pipeline.source().batches.lock().expect("lock").clone()
}

fn pipeline_network_calls(pipeline: &BackupPipeline<StubParameterStore, RecordingSink>) -> usize {
    pipeline.source().network_calls()
}
