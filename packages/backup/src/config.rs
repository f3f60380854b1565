use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{BackupError, BackupResult};
use crate::services::keyring::normalize_fingerprint;
use crate::services::parameters::MAX_BATCH_SIZE;

/// Name of the config file looked up under the OS config directory
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Region of the parameter store being exported
    #[serde(default = "default_source_region")]
    pub source_region: String,
    /// Named AWS profile; ambient credentials are used when unset
    #[serde(default)]
    pub aws_profile: Option<String>,
    /// Armored OpenPGP file holding the recipient public key(s)
    #[serde(default = "default_key_file")]
    pub key_file: PathBuf,
    /// Fingerprint (or unambiguous prefix) of the key to encrypt to
    #[serde(default)]
    pub recipient: Option<String>,
    /// Expected SHA-256 fingerprint of the recipient key
    #[serde(default)]
    pub pinned_fingerprint: Option<String>,
    #[serde(default = "default_targets")]
    pub targets: Vec<UploadTarget>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub missing_values: MissingValuePolicy,
    /// Encrypt but skip the upload stage
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadTarget {
    pub bucket: String,
    pub region: String,
}

impl UploadTarget {
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
        }
    }
}

/// What to do with a parameter whose value could not be read
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingValuePolicy {
    #[default]
    Fail,
    Skip,
}

fn default_source_region() -> String {
    "us-east-1".to_string()
}

fn default_key_file() -> PathBuf {
    PathBuf::from("backup.pub.asc")
}

fn default_targets() -> Vec<UploadTarget> {
    vec![
        UploadTarget::new("parameterstore-backup", "us-east-1"),
        UploadTarget::new("parameterstore-backup-replica", "us-east-2"),
    ]
}

fn default_key_prefix() -> String {
    "parameterstore/backup/".to_string()
}

fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            source_region: default_source_region(),
            aws_profile: None,
            key_file: default_key_file(),
            recipient: None,
            pinned_fingerprint: None,
            targets: default_targets(),
            key_prefix: default_key_prefix(),
            batch_size: default_batch_size(),
            missing_values: MissingValuePolicy::default(),
            dry_run: false,
        }
    }
}

impl BackupConfig {
    /// Default config file location: `$XDG_CONFIG_HOME/parameterstore-backup/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("parameterstore-backup").join(CONFIG_FILE_NAME))
    }

    /// Load a config from a JSON file
    pub fn from_file(path: &Path) -> BackupResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BackupError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: BackupConfig = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), "Loaded backup config");
        Ok(config)
    }

    /// Load from an explicit path, else the default location, else defaults
    pub fn load(explicit: Option<&Path>) -> BackupResult<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => Self::load_default(Self::default_path()),
        }
    }

    fn load_default(default_path: Option<PathBuf>) -> BackupResult<Self> {
        match default_path {
            Some(path) if path.exists() => Self::from_file(&path),
            Some(path) => {
                debug!(path = %path.display(), "No config file found, using defaults");
                Ok(Self::default())
            }
            None => {
                warn!("Could not determine OS config directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> BackupResult<()> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(BackupError::Configuration(format!(
                "batch_size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.batch_size
            )));
        }

        if self.source_region.trim().is_empty() {
            return Err(BackupError::Configuration(
                "source_region must not be empty".to_string(),
            ));
        }

        if self.targets.is_empty() {
            return Err(BackupError::Configuration(
                "at least one upload target is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            if target.bucket.trim().is_empty() || target.region.trim().is_empty() {
                return Err(BackupError::Configuration(format!(
                    "upload target has empty bucket or region: {:?}",
                    target
                )));
            }
            if !seen.insert(target) {
                return Err(BackupError::Configuration(format!(
                    "duplicate upload target s3://{} ({})",
                    target.bucket, target.region
                )));
            }
        }

        if let Some(pin) = &self.pinned_fingerprint {
            let normalized = normalize_fingerprint(pin);
            if normalized.len() != 64 || !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(BackupError::Configuration(format!(
                    "pinned_fingerprint must be a 64 character SHA-256 hex digest, got '{}'",
                    pin
                )));
            }
        }

        Ok(())
    }
}
