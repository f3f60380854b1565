//! Parameter enumeration and batched value fetch
//!
//! The parameter service is reached through [`ParameterSource`] so the
//! pipeline can run against AWS or an in-memory stub.

use std::collections::HashSet;
use zeroize::Zeroizing;

use crate::error::BackupResult;
use crate::logging::{Stage, log_stage};
use crate::record::{ParameterRecord, ValueMap};

/// Most names the service accepts in one value-fetch request
pub const MAX_BATCH_SIZE: usize = 10;

/// One page of parameter metadata
#[derive(Debug, Clone, Default)]
pub struct ParameterPage {
    pub parameters: Vec<ParameterRecord>,
    pub next_token: Option<String>,
}

/// Values returned for one batch of names
#[derive(Debug, Default)]
pub struct FetchedBatch {
    pub values: Vec<(String, Zeroizing<String>)>,
    /// Names the service could not resolve (deleted or unreadable)
    pub invalid: Vec<String>,
}

/// Abstraction over the parameter store
pub trait ParameterSource: Send + Sync {
    /// Describe one page of parameters (metadata only, no values)
    ///
    /// # Arguments
    /// * `next_token` - Continuation token from the previous page, `None` for the first
    async fn describe_page(&self, next_token: Option<String>) -> BackupResult<ParameterPage>;

    /// Fetch decrypted values for at most [`MAX_BATCH_SIZE`] names
    async fn get_parameters(&self, names: &[String]) -> BackupResult<FetchedBatch>;
}

impl<T: ParameterSource> ParameterSource for &T {
    async fn describe_page(&self, next_token: Option<String>) -> BackupResult<ParameterPage> {
        (**self).describe_page(next_token).await
    }

    async fn get_parameters(&self, names: &[String]) -> BackupResult<FetchedBatch> {
        (**self).get_parameters(names).await
    }
}

/// Enumerated metadata plus the parallel name list
#[derive(Debug, Clone, Default)]
pub struct Enumeration {
    pub records: Vec<ParameterRecord>,
    pub names: Vec<String>,
    pub pages: usize,
}

/// Page through every parameter in the store
pub async fn enumerate<P: ParameterSource>(source: &P) -> BackupResult<Enumeration> {
    let mut enumeration = Enumeration::default();
    let mut seen = HashSet::new();
    let mut next_token = None;

    loop {
        let page = source.describe_page(next_token.take()).await?;
        enumeration.pages += 1;

        for record in page.parameters {
            if !seen.insert(record.name.clone()) {
                log::warn!("Duplicate parameter name in listing, keeping first: {}", record.name);
                continue;
            }
            enumeration.names.push(record.name.clone());
            enumeration.records.push(record);
        }

        match page.next_token {
            Some(token) if !token.is_empty() => next_token = Some(token),
            _ => break,
        }
    }

    log_stage(
        Stage::Enumerate,
        &[
            ("parameters", enumeration.records.len()),
            ("pages", enumeration.pages),
        ],
        "",
    );

    Ok(enumeration)
}

/// Fetch values for `names` in batches of `batch_size`
///
/// Issues exactly `ceil(names.len() / batch_size)` requests, none empty.
/// Returns the accumulated values and the number of requests made.
pub async fn fetch_values<P: ParameterSource>(
    source: &P,
    names: &[String],
    batch_size: usize,
) -> BackupResult<(ValueMap, usize)> {
    let batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
    let mut values = ValueMap::with_capacity(names.len());
    let mut batches = 0;
    let mut rejected = 0;

    for chunk in names.chunks(batch_size) {
        let fetched = source.get_parameters(chunk).await?;
        batches += 1;

        if !fetched.invalid.is_empty() {
            rejected += fetched.invalid.len();
            log::warn!(
                "Parameter store rejected {} name(s): {}",
                fetched.invalid.len(),
                fetched.invalid.join(", ")
            );
        }

        values.extend(fetched.values);
    }

    log_stage(
        Stage::Fetch,
        &[
            ("values", values.len()),
            ("names", names.len()),
            ("rejected", rejected),
            ("batches", batches),
        ],
        "",
    );

    Ok((values, batches))
}
