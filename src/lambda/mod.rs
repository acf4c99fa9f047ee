// src/lambda/mod.rs

//! AWS Lambda handler for scheduled watch passes.
//!
//! Each invocation:
//! 1. Connects to the S3-compatible store configured from the environment
//! 2. Loads `config.toml` from the store (defaults when absent)
//! 3. Runs one pass over the watch list

use std::sync::Arc;
use std::time::Instant;

use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, instrument};

use crate::config::StoreConfigLoader;
use crate::error::Result;
use crate::models::PassSummary;
use crate::pipeline::Watcher;
use crate::storage::BlobStore;
use crate::storage::s3::S3Storage;

/// Lambda response payload.
#[derive(Debug, Default, Serialize)]
pub struct PassResponse {
    /// Whether the pass ran to completion
    pub success: bool,

    /// Per-URL results, absent when the pass could not start
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<PassSummary>,

    /// Error message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

/// Main Lambda handler function.
///
/// The scheduled event payload carries nothing the pass needs and is only
/// logged.
#[instrument(skip(event))]
pub async fn handler(event: LambdaEvent<Value>) -> std::result::Result<PassResponse, LambdaError> {
    let start = Instant::now();
    let (payload, _context) = event.into_parts();
    info!("Scheduled pass triggered: {}", payload);

    let outcome = match S3Storage::from_env().await {
        Ok(storage) => run_pass(Arc::new(storage)).await,
        Err(e) => Err(e),
    };

    Ok(into_response(outcome, start))
}

/// Load config from `blobs` and run one pass over it.
pub async fn run_pass(blobs: Arc<dyn BlobStore>) -> Result<PassSummary> {
    let config = StoreConfigLoader::new(Arc::clone(&blobs))
        .load_config()
        .await?;
    let watcher = Watcher::new(&config, blobs)?;
    watcher.run_pass().await
}

fn into_response(outcome: Result<PassSummary>, start: Instant) -> PassResponse {
    let execution_time_ms = start.elapsed().as_millis() as u64;
    match outcome {
        Ok(summary) => {
            info!(
                "Pass completed: {} urls, {} processed, {} changed, {} errored in {}ms",
                summary.total,
                summary.processed,
                summary.changed,
                summary.errored,
                execution_time_ms
            );
            PassResponse {
                success: true,
                summary: Some(summary),
                error: None,
                execution_time_ms,
            }
        }
        Err(e) => {
            error!("Pass failed: {}", e);
            PassResponse {
                success: false,
                error: Some(e.to_string()),
                execution_time_ms,
                ..Default::default()
            }
        }
    }
}
