pub mod aws;
pub mod cli;
pub mod config;
pub mod error;
pub mod lambda;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod services;

// Re-export the public API
pub use config::{BackupConfig, MissingValuePolicy, UploadTarget};
pub use error::{BackupError, BackupResult};
pub use pipeline::{BackupPipeline, BackupReport};
pub use record::{ParameterPolicy, ParameterRecord, ValueMap};
