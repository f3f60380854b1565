//! Parameter records and their JSON-lines serialization
//!
//! A record starts out as metadata returned by enumeration and gains its
//! value when merged with the fetched [`ValueMap`]. Field names follow the
//! parameter store's own PascalCase naming so backups read like the
//! service's API responses.

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use zeroize::Zeroizing;

use crate::config::MissingValuePolicy;
use crate::error::{BackupError, BackupResult};

/// Decrypted values keyed by parameter name
pub type ValueMap = HashMap<String, Zeroizing<String>>;

/// One parameter; `Debug` output never includes the value
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParameterRecord {
    pub name: String,
    #[serde(rename = "ARN", skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_pattern: Option<String>,
    pub version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<ParameterPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Zeroizing<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParameterPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_status: Option<String>,
}

impl ParameterRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref().map(String::as_str)
    }
}

impl fmt::Debug for ParameterRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterRecord")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("version", &self.version)
            .field("last_modified_date", &self.last_modified_date)
            .field("tier", &self.tier)
            .field("value", &self.value.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

/// Attach fetched values to their records, in enumeration order
///
/// Records whose name is absent from `values` either fail the run or are
/// dropped, depending on `policy`.
pub fn merge_values(
    records: Vec<ParameterRecord>,
    values: &ValueMap,
    policy: MissingValuePolicy,
) -> BackupResult<Vec<ParameterRecord>> {
    let mut merged = Vec::with_capacity(records.len());

    for mut record in records {
        match values.get(&record.name) {
            Some(value) => {
                record.value = Some(value.clone());
                merged.push(record);
            }
            None => match policy {
                MissingValuePolicy::Fail => {
                    return Err(BackupError::MissingValue { name: record.name });
                }
                MissingValuePolicy::Skip => {
                    warn!("Skipping parameter without readable value: {}", record.name);
                }
            },
        }
    }

    Ok(merged)
}

/// Serialize records as newline-terminated JSON objects
pub fn to_json_lines(records: &[ParameterRecord]) -> BackupResult<Zeroizing<String>> {
    let mut blob = Zeroizing::new(String::new());
    for record in records {
        let line = Zeroizing::new(serde_json::to_string(record)?);
        blob.push_str(&line);
        blob.push('\n');
    }
    Ok(blob)
}
