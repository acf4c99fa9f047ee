// src/pipeline/status.rs

//! Read-only status listing and health probe.
//!
//! Neither touches the watched pages nor writes to the store.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{SeatState, TargetConfig};
use crate::storage::{RecordLookup, StateStore};
use crate::utils::now_in;
use crate::utils::url::is_valid_target_url;

/// Key read by the health probe. It does not need to exist.
const HEALTH_CHECK_KEY: &str = "health-check";

/// Reported state of one watched URL.
#[derive(Debug, Clone, Serialize)]
pub struct StatusEntry {
    #[serde(rename = "STATE")]
    pub state: SeatState,

    #[serde(rename = "TIME")]
    pub time: DateTime<FixedOffset>,

    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Listing of every watched URL.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub states: Vec<StatusEntry>,
    pub count: usize,
    pub timestamp: DateTime<FixedOffset>,
}

/// List the last known state of every watched URL.
///
/// Invalid URLs are reported as `INVALID_URL`, URLs without a record as
/// `UNKNOWN`, unparsable records as `CORRUPTED`. A missing or empty watch
/// list is an error.
pub async fn collect_statuses(
    store: &StateStore,
    target: &TargetConfig,
    offset: FixedOffset,
) -> Result<StatusReport> {
    let urls = store.load_watch_list().await?.ok_or_else(|| {
        AppError::validation(format!(
            "No URLs configured, upload {} to the store",
            store.watch_list_key()
        ))
    })?;

    if urls.is_empty() {
        return Err(AppError::validation(format!(
            "{} contains no URLs",
            store.watch_list_key()
        )));
    }

    let mut states = Vec::with_capacity(urls.len());
    for url in urls {
        let now = now_in(offset);
        if !is_valid_target_url(&url, target) {
            log::warn!("Invalid URL in watch list: {}", url);
            states.push(StatusEntry {
                state: SeatState::InvalidUrl,
                time: now,
                url,
                error: Some("Invalid target URL format".to_string()),
            });
            continue;
        }

        let entry = match store.read_record(&url).await {
            RecordLookup::Found(record) => StatusEntry {
                state: record.state,
                time: record.observed_at,
                url,
                error: None,
            },
            RecordLookup::Untimed { state, reason } => {
                log::warn!("Stored state for {} has an unreadable TIME: {}", url, reason);
                StatusEntry {
                    state,
                    time: now,
                    url,
                    error: Some("Unreadable state timestamp".to_string()),
                }
            }
            RecordLookup::Missing => StatusEntry {
                state: SeatState::Unknown,
                time: now,
                url,
                error: None,
            },
            RecordLookup::Corrupted(reason) => {
                log::error!("Failed to parse stored state for {}: {}", url, reason);
                StatusEntry {
                    state: SeatState::Corrupted,
                    time: now,
                    url,
                    error: Some("Corrupted state data".to_string()),
                }
            }
            RecordLookup::Unreadable(e) => {
                log::error!("Failed to read stored state for {}: {}", url, e);
                StatusEntry {
                    state: SeatState::Unknown,
                    time: now,
                    url,
                    error: Some(format!("Storage read failed: {e}")),
                }
            }
        };
        states.push(entry);
    }

    Ok(StatusReport {
        count: states.len(),
        states,
        timestamp: now_in(offset),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageHealth {
    Connected,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookHealth {
    Configured,
    NotConfigured,
}

/// Connectivity of the collaborators a pass depends on.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub storage: StorageHealth,
    pub webhook: WebhookHealth,
    pub timestamp: DateTime<FixedOffset>,
}

/// Probe the store and report whether notifications are configured.
pub async fn check_health(
    store: &StateStore,
    webhook_configured: bool,
    offset: FixedOffset,
) -> HealthReport {
    let storage = match store.blobs().get(HEALTH_CHECK_KEY).await {
        Ok(_) => StorageHealth::Connected,
        Err(e) => {
            log::error!("Storage health check failed: {}", e);
            StorageHealth::Error
        }
    };

    HealthReport {
        storage,
        webhook: if webhook_configured {
            WebhookHealth::Configured
        } else {
            WebhookHealth::NotConfigured
        },
        timestamp: now_in(offset),
    }
}
