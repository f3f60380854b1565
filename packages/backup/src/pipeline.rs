//! The export, encrypt and upload run
//!
//! Stages run strictly in sequence and hand their output to the next stage
//! as values:
//! 1. key import and pin check (local only, fails before any network call)
//! 2. enumeration
//! 3. batched value fetch
//! 4. merge, serialize and encrypt (gated on the encryption report)
//! 5. upload of identical bytes to every target

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{BackupConfig, UploadTarget};
use crate::error::BackupResult;
use crate::logging::{Stage, log_stage};
use crate::record::{merge_values, to_json_lines};
use crate::services::keyring::{Keyring, verify_pin};
use crate::services::parameters::{ParameterSource, enumerate, fetch_values};
use crate::services::storage::{ObjectSink, date_stamp, object_key, upload_all};
use crate::services::{EncryptedArtifact, EncryptionReport, encrypt_armored};

/// Summary of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    pub object_key: String,
    pub date_stamp: String,
    pub parameters: usize,
    pub skipped: usize,
    pub batches: usize,
    pub encryption: EncryptionReport,
    pub uploaded: Vec<UploadTarget>,
    pub dry_run: bool,
}

pub struct BackupPipeline<P, S> {
    config: BackupConfig,
    source: P,
    sink: S,
}

impl<P: ParameterSource, S: ObjectSink> BackupPipeline<P, S> {
    pub fn new(config: BackupConfig, source: P, sink: S) -> Self {
        Self {
            config,
            source,
            sink,
        }
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run the backup, stamping the object key with `now`
    pub async fn run(&self, now: DateTime<Utc>) -> BackupResult<BackupReport> {
        self.run_with_artifact(now).await.map(|(report, _)| report)
    }

    /// Run the backup and also return the artifact that was uploaded
    pub async fn run_with_artifact(
        &self,
        now: DateTime<Utc>,
    ) -> BackupResult<(BackupReport, EncryptedArtifact)> {
        self.config.validate()?;

        // Computed once so every target gets the same key
        let stamp = date_stamp(now);
        let key = object_key(&self.config.key_prefix, &stamp);

        let mut keyring = Keyring::new();
        keyring.import_file(&self.config.key_file)?;
        let recipient = keyring.recipient(self.config.recipient.as_deref())?;
        match &self.config.pinned_fingerprint {
            Some(pin) => verify_pin(recipient, pin)?,
            None => log::warn!(
                "No pinned fingerprint configured; trusting recipient {}",
                recipient.fingerprint()
            ),
        }

        let enumeration = enumerate(&self.source).await?;
        let (values, batches) =
            fetch_values(&self.source, &enumeration.names, self.config.batch_size).await?;

        let total = enumeration.records.len();
        let records = merge_values(enumeration.records, &values, self.config.missing_values)?;
        drop(values);
        let skipped = total - records.len();

        let plaintext = to_json_lines(&records)?;
        drop(records);

        let artifact = encrypt_armored(recipient, plaintext.as_bytes())?;
        artifact.ensure_ok()?;
        log_stage(
            Stage::Encrypt,
            &[
                ("parameters", total - skipped),
                ("plaintext_bytes", artifact.report.plaintext_len),
                ("armored_bytes", artifact.report.armored_len),
            ],
            &format!("to {} ({})", artifact.report.recipient, artifact.report.status),
        );

        let uploaded = if self.config.dry_run {
            log::info!("Dry run: skipping upload of {}", key);
            Vec::new()
        } else {
            upload_all(&self.sink, &self.config.targets, &key, artifact.armored.as_bytes()).await?
        };

        let report = BackupReport {
            object_key: key,
            date_stamp: stamp,
            parameters: total - skipped,
            skipped,
            batches,
            encryption: artifact.report.clone(),
            uploaded,
            dry_run: self.config.dry_run,
        };

        log_stage(
            Stage::Complete,
            &[
                ("parameters", report.parameters),
                ("skipped", report.skipped),
                ("targets", report.uploaded.len()),
            ],
            &report.object_key,
        );

        Ok((report, artifact))
    }
}
