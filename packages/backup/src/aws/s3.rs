//! S3 uploads across regions
//!
//! One client per region; targets are resolved to their region's client.

use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use std::collections::HashMap;

use super::client::load_sdk_config;
use crate::config::UploadTarget;
use crate::error::{BackupError, BackupResult};
use crate::services::storage::ObjectSink;

#[derive(Debug, Clone, Default)]
pub struct S3ObjectStore {
    clients: HashMap<String, Client>,
}

impl S3ObjectStore {
    /// Build one client for each distinct region in `targets`
    pub async fn connect(targets: &[UploadTarget], profile: Option<&str>) -> Self {
        let mut clients = HashMap::new();
        for target in targets {
            if clients.contains_key(&target.region) {
                continue;
            }
            let config = load_sdk_config(&target.region, profile).await;
            clients.insert(target.region.clone(), Client::new(&config));
        }
        Self { clients }
    }

    /// Use `client` for every target in `region`
    pub fn with_client(mut self, region: impl Into<String>, client: Client) -> Self {
        self.clients.insert(region.into(), client);
        self
    }
}

impl ObjectSink for S3ObjectStore {
    async fn put_object(&self, target: &UploadTarget, key: &str, body: &[u8]) -> BackupResult<()> {
        let upload_error = |message: String| BackupError::Upload {
            bucket: target.bucket.clone(),
            region: target.region.clone(),
            message,
        };

        let client = self
            .clients
            .get(&target.region)
            .ok_or_else(|| upload_error("no client for region".to_string()))?;

        client
            .put_object()
            .bucket(&target.bucket)
            .key(key)
            .body(ByteStream::from(body.to_vec()))
            .send()
            .await
            .map_err(|e| upload_error(e.to_string()))?;

        Ok(())
    }
}
