//! Structured logging for backup runs
//!
//! `env_logger` backed; levels are controlled through `RUST_LOG`, e.g.
//! `RUST_LOG=parameterstore_backup=debug`. `tracing` events from this crate
//! are forwarded to the same logger through tracing's `log` feature.
//!
//! Every pipeline stage reports what it handled as one line:
//!
//! ```text
//! [fetch] values=23 names=23 batches=3
//! [upload] bytes=4127 s3://backups/parameterstore-backup-20240704.gpg (us-east-2)
//! ```

use log::{info, warn};
use std::sync::Once;

use crate::error::BackupError;

static INIT_LOGGER: Once = Once::new();

/// Initialize logging (call once at startup)
pub fn init() {
    INIT_LOGGER.call_once(|| {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .format_timestamp_micros()
            .init();
    });
}

/// Initialize logging for tests without clashing with other test threads
pub fn init_test() {
    let _ = env_logger::Builder::from_default_env()
        .is_test(true)
        .try_init();
}

/// Pipeline stage a log line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    KeyImport,
    KeyPin,
    Enumerate,
    Fetch,
    Encrypt,
    Upload,
    Complete,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::KeyImport => "key-import",
            Stage::KeyPin => "key-pin",
            Stage::Enumerate => "enumerate",
            Stage::Fetch => "fetch",
            Stage::Encrypt => "encrypt",
            Stage::Upload => "upload",
            Stage::Complete => "complete",
        }
    }
}

/// Log a finished stage with its counters
///
/// # Parameters
/// * `counts` - Named counters, rendered as `name=value` in order
/// * `details` - Free text such as a path or object URL; never parameter values
pub fn log_stage(stage: Stage, counts: &[(&str, usize)], details: &str) {
    info!("{}", stage_line(stage, counts, details));
}

/// Log a failed stage with the error that stopped it
pub fn log_stage_failure(stage: Stage, error: &BackupError) {
    warn!("[{}] failed: {}", stage.as_str(), error);
}

fn stage_line(stage: Stage, counts: &[(&str, usize)], details: &str) -> String {
    let mut line = format!("[{}]", stage.as_str());
    for (name, value) in counts {
        line.push_str(&format!(" {}={}", name, value));
    }
    if !details.is_empty() {
        line.push(' ');
        line.push_str(details);
    }
    line
}
