//! Parameter Store operations
//!
//! `DescribeParameters` for paginated metadata and `GetParameters` with
//! decryption for values.

use aws_sdk_ssm::Client;
use aws_sdk_ssm::primitives::DateTime as SmithyDateTime;
use aws_sdk_ssm::types::ParameterMetadata;
use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

use super::client::load_sdk_config;
use crate::error::{BackupError, BackupResult};
use crate::record::{ParameterPolicy, ParameterRecord};
use crate::services::parameters::{FetchedBatch, MAX_BATCH_SIZE, ParameterPage, ParameterSource};

/// Parameter store in one region
#[derive(Debug, Clone)]
pub struct SsmParameterSource {
    client: Client,
}

impl SsmParameterSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client for `region`
    pub async fn connect(region: &str, profile: Option<&str>) -> Self {
        let config = load_sdk_config(region, profile).await;
        Self::new(Client::new(&config))
    }
}

impl ParameterSource for SsmParameterSource {
    async fn describe_page(&self, next_token: Option<String>) -> BackupResult<ParameterPage> {
        let result = self
            .client
            .describe_parameters()
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| BackupError::Provider(format!("DescribeParameters failed: {}", e)))?;

        let parameters = result.parameters().iter().map(record_from_metadata).collect();

        Ok(ParameterPage {
            parameters,
            next_token: result.next_token().map(str::to_string),
        })
    }

    async fn get_parameters(&self, names: &[String]) -> BackupResult<FetchedBatch> {
        if names.len() > MAX_BATCH_SIZE {
            return Err(BackupError::Provider(format!(
                "GetParameters accepts at most {} names, got {}",
                MAX_BATCH_SIZE,
                names.len()
            )));
        }

        let result = self
            .client
            .get_parameters()
            .set_names(Some(names.to_vec()))
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| BackupError::Provider(format!("GetParameters failed: {}", e)))?;

        let mut batch = FetchedBatch::default();
        for parameter in result.parameters() {
            let (Some(name), Some(value)) = (parameter.name(), parameter.value()) else {
                continue;
            };
            batch
                .values
                .push((name.to_string(), Zeroizing::new(value.to_string())));
        }
        batch.invalid = result.invalid_parameters().to_vec();

        Ok(batch)
    }
}

fn record_from_metadata(metadata: &ParameterMetadata) -> ParameterRecord {
    ParameterRecord {
        name: metadata.name().unwrap_or_default().to_string(),
        arn: metadata.arn().map(str::to_string),
        r#type: metadata.r#type().map(|t| t.as_str().to_string()),
        key_id: metadata.key_id().map(str::to_string),
        last_modified_date: metadata.last_modified_date().and_then(to_chrono),
        last_modified_user: metadata.last_modified_user().map(str::to_string),
        description: metadata.description().map(str::to_string),
        allowed_pattern: metadata.allowed_pattern().map(str::to_string),
        version: metadata.version(),
        tier: metadata.tier().map(|t| t.as_str().to_string()),
        data_type: metadata.data_type().map(str::to_string),
        policies: metadata
            .policies()
            .iter()
            .map(|p| ParameterPolicy {
                policy_text: p.policy_text().map(str::to_string),
                policy_type: p.policy_type().map(str::to_string),
                policy_status: p.policy_status().map(str::to_string),
            })
            .collect(),
        value: None,
    }
}

fn to_chrono(timestamp: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}
