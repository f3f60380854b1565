//! Shared fixtures for pipeline integration tests

#![allow(dead_code)]

use parameterstore_backup::services::keyring::fingerprint_of;
use parameterstore_backup::services::{FetchedBatch, ObjectSink, ParameterPage, ParameterSource};
use parameterstore_backup::{BackupConfig, BackupError, BackupResult, ParameterRecord, UploadTarget};
use pgp::{Deserializable, SignedPublicKey, SignedSecretKey};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use zeroize::Zeroizing;

/// Armored public key of the test recipient (RSA primary, RSA encryption subkey)
pub const RECIPIENT_PUBLIC: &str = include_str!("../fixtures/recipient.pub.asc");
const RECIPIENT_SECRET: &str = include_str!("../fixtures/recipient.sec.asc");

pub fn recipient_secret_key() -> &'static SignedSecretKey {
    static KEY: OnceLock<SignedSecretKey> = OnceLock::new();
    KEY.get_or_init(|| SignedSecretKey::from_string(RECIPIENT_SECRET).expect("secret key").0)
}

pub fn recipient_fingerprint() -> String {
    let (key, _) = SignedPublicKey::from_string(RECIPIENT_PUBLIC).expect("public key");
    fingerprint_of(&key).expect("fingerprint")
}

/// Write the recipient public key into `dir`
pub fn write_public_key(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("recipient.pub.asc");
    std::fs::write(&path, RECIPIENT_PUBLIC).expect("write key");
    path
}

pub fn config_with_key(key_file: std::path::PathBuf) -> BackupConfig {
    BackupConfig {
        key_file,
        targets: vec![
            UploadTarget::new("backups-primary", "us-east-1"),
            UploadTarget::new("backups-replica", "us-east-2"),
        ],
        ..BackupConfig::default()
    }
}

/// In-memory parameter store with call accounting
pub struct StubParameterStore {
    pub parameters: Vec<(String, String)>,
    pub page_size: usize,
    /// Names listed but never returned by the value fetch
    pub unreadable: HashSet<String>,
    pub describe_calls: Mutex<usize>,
    pub batches: Mutex<Vec<Vec<String>>>,
}

impl StubParameterStore {
    pub fn with_count(count: usize) -> Self {
        Self::new(
            (0..count)
                .map(|i| (format!("/service/param-{:03}", i), format!("secret-{}", i)))
                .collect(),
        )
    }

    pub fn new(parameters: Vec<(String, String)>) -> Self {
        Self {
            parameters,
            page_size: 7,
            unreadable: HashSet::new(),
            describe_calls: Mutex::new(0),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn network_calls(&self) -> usize {
        *self.describe_calls.lock().expect("lock") + self.batches.lock().expect("lock").len()
    }
}

impl ParameterSource for StubParameterStore {
    async fn describe_page(&self, next_token: Option<String>) -> BackupResult<ParameterPage> {
        *self.describe_calls.lock().expect("lock") += 1;

        let start = match next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|e| BackupError::Provider(e.to_string()))?,
            None => 0,
        };
        let end = (start + self.page_size).min(self.parameters.len());

        Ok(ParameterPage {
            parameters: self.parameters[start..end]
                .iter()
                .map(|(name, _)| ParameterRecord {
                    r#type: Some("SecureString".to_string()),
                    version: 1,
                    ..ParameterRecord::named(name.clone())
                })
                .collect(),
            next_token: (end < self.parameters.len()).then(|| end.to_string()),
        })
    }

    async fn get_parameters(&self, names: &[String]) -> BackupResult<FetchedBatch> {
        self.batches.lock().expect("lock").push(names.to_vec());

        let mut batch = FetchedBatch::default();
        for name in names {
            if self.unreadable.contains(name) {
                batch.invalid.push(name.clone());
                continue;
            }
            if let Some((_, value)) = self.parameters.iter().find(|(n, _)| n == name) {
                batch.values.push((name.clone(), Zeroizing::new(value.clone())));
            }
        }
        Ok(batch)
    }
}

/// Records every upload; optionally fails for one bucket
#[derive(Default)]
pub struct RecordingSink {
    pub uploads: Mutex<Vec<(UploadTarget, String, Vec<u8>)>>,
    pub fail_bucket: Option<String>,
}

impl ObjectSink for RecordingSink {
    async fn put_object(&self, target: &UploadTarget, key: &str, body: &[u8]) -> BackupResult<()> {
        if self.fail_bucket.as_deref() == Some(target.bucket.as_str()) {
            return Err(BackupError::Upload {
                bucket: target.bucket.clone(),
                region: target.region.clone(),
                message: "SlowDown".to_string(),
            });
        }
        self.uploads
            .lock()
            .expect("lock")
            .push((target.clone(), key.to_string(), body.to_vec()));
        Ok(())
    }
}
