//! AWS Lambda entry point
//!
//! Each invocation runs one backup with the loaded config and returns the
//! [`BackupReport`] as the function result. Scheduled events carry nothing
//! this handler reads; a manual invocation may send `{"dry_run": true}`.

use chrono::Utc;
use lambda_runtime::{Error, LambdaEvent, service_fn};
use serde::Deserialize;
use serde_json::Value;

use crate::aws::{S3ObjectStore, SsmParameterSource};
use crate::config::BackupConfig;
use crate::error::BackupResult;
use crate::pipeline::{BackupPipeline, BackupReport};
use crate::services::parameters::ParameterSource;
use crate::services::storage::ObjectSink;

/// Per-invocation settings taken from the event payload
#[derive(Debug, Default, Deserialize)]
pub struct InvocationOverrides {
    #[serde(default)]
    pub dry_run: Option<bool>,
}

impl InvocationOverrides {
    /// Read overrides from an object payload; any other payload has none
    pub fn from_payload(payload: &Value) -> BackupResult<Self> {
        match payload {
            Value::Object(_) => Ok(Self::deserialize(payload)?),
            _ => Ok(Self::default()),
        }
    }

    pub fn apply(&self, config: &mut BackupConfig) {
        if let Some(dry_run) = self.dry_run {
            config.dry_run = dry_run;
        }
    }
}

/// Run one backup for a Lambda event against the given source and sink
pub async fn handle_event<P: ParameterSource, S: ObjectSink>(
    event: LambdaEvent<Value>,
    mut config: BackupConfig,
    source: P,
    sink: S,
) -> Result<BackupReport, Error> {
    InvocationOverrides::from_payload(&event.payload)?.apply(&mut config);
    log::info!(
        "Lambda request {} starting backup (dry_run={})",
        event.context.request_id,
        config.dry_run
    );

    let report = BackupPipeline::new(config, source, sink).run(Utc::now()).await?;
    Ok(report)
}

/// Serve invocations until the runtime shuts down
pub async fn serve(config: BackupConfig) -> Result<(), Error> {
    config.validate()?;

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let config = config.clone();
        async move {
            let profile = config.aws_profile.clone();
            let source = SsmParameterSource::connect(&config.source_region, profile.as_deref()).await;
            let sink = S3ObjectStore::connect(&config.targets, profile.as_deref()).await;
            handle_event(event, config, source, sink).await
        }
    }))
    .await
}
