//! Artifact upload to redundant object storage

use chrono::{DateTime, Utc};

use crate::config::UploadTarget;
use crate::error::BackupResult;
use crate::logging::{Stage, log_stage, log_stage_failure};

const OBJECT_STEM: &str = "parameterstore-backup-";
const OBJECT_SUFFIX: &str = ".gpg";

/// Abstraction over an object store reachable in several regions
pub trait ObjectSink: Send + Sync {
    /// Write `body` to `key` in the target's bucket
    ///
    /// # Errors
    /// Returns `BackupError::Upload` naming the bucket and region
    async fn put_object(&self, target: &UploadTarget, key: &str, body: &[u8]) -> BackupResult<()>;
}

impl<T: ObjectSink> ObjectSink for &T {
    async fn put_object(&self, target: &UploadTarget, key: &str, body: &[u8]) -> BackupResult<()> {
        (**self).put_object(target, key, body).await
    }
}

/// `YYYYMMDD` stamp used in object keys
pub fn date_stamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d").to_string()
}

/// Object key for a backup taken on `stamp`
pub fn object_key(prefix: &str, stamp: &str) -> String {
    format!("{}{}{}{}", prefix, OBJECT_STEM, stamp, OBJECT_SUFFIX)
}

/// Upload the same bytes to every target, in order
///
/// Stops at the first failure. Returns the targets written.
pub async fn upload_all<S: ObjectSink>(
    sink: &S,
    targets: &[UploadTarget],
    key: &str,
    body: &[u8],
) -> BackupResult<Vec<UploadTarget>> {
    let mut uploaded = Vec::with_capacity(targets.len());

    for target in targets {
        if let Err(e) = sink.put_object(target, key, body).await {
            log_stage_failure(Stage::Upload, &e);
            return Err(e);
        }

        log_stage(
            Stage::Upload,
            &[("bytes", body.len()), ("target", uploaded.len() + 1), ("targets", targets.len())],
            &format!("s3://{}/{} ({})", target.bucket, key, target.region),
        );
        uploaded.push(target.clone());
    }

    Ok(uploaded)
}
