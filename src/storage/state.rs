//! Typed access to the watch list and per-URL state records.

use std::fmt;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{
    DEFAULT_PREVIOUS_STATE, KeyDerivation, SeatState, StateRecord, StorageConfig, StoredState,
};
use crate::storage::{BlobStore, JSON_CONTENT_TYPE};
use crate::utils::url::{degraded_fingerprint, fingerprint, sha256_fingerprint};

/// Result of looking up the stored record of a URL.
///
/// Reading never fails as a whole: every failure mode is a variant, so the
/// caller decides how to degrade.
#[derive(Debug)]
pub enum RecordLookup {
    /// No record stored yet
    Missing,
    /// Record parsed successfully
    Found(StateRecord),
    /// `STATE` is readable but the rest of the record is not
    Untimed { state: SeatState, reason: String },
    /// Blob exists but is not a valid record
    Corrupted(String),
    /// The store could not be read
    Unreadable(AppError),
}

impl RecordLookup {
    /// State to compare a new observation against.
    pub fn previous_state(&self) -> SeatState {
        match self {
            RecordLookup::Found(record) => record.state,
            RecordLookup::Untimed { state, .. } => *state,
            _ => DEFAULT_PREVIOUS_STATE,
        }
    }
}

impl fmt::Display for RecordLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordLookup::Missing => write!(f, "missing"),
            RecordLookup::Found(record) => write!(f, "{}", record.state),
            RecordLookup::Untimed { state, reason } => write!(f, "{state} ({reason})"),
            RecordLookup::Corrupted(reason) => write!(f, "corrupted ({reason})"),
            RecordLookup::Unreadable(err) => write!(f, "unreadable ({err})"),
        }
    }
}

/// Split a watch-list blob into candidate URLs.
///
/// Lines are trimmed and blank lines dropped. Validity is not checked here.
pub fn parse_watch_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Watch list and state records on top of a [`BlobStore`].
#[derive(Clone)]
pub struct StateStore {
    blobs: Arc<dyn BlobStore>,
    watch_list_key: String,
    key_derivation: KeyDerivation,
}

impl StateStore {
    pub fn new(blobs: Arc<dyn BlobStore>, config: &StorageConfig) -> Self {
        if config.key_derivation == KeyDerivation::Alphanumeric {
            log::warn!(
                "State keys use the degraded alphanumeric derivation; \
                 URLs sharing a prefix will collide. Use key_derivation = \"sha1\" unless migrating."
            );
        }

        Self {
            blobs,
            watch_list_key: config.watch_list_key.clone(),
            key_derivation: config.key_derivation,
        }
    }

    /// Underlying blob store.
    pub fn blobs(&self) -> &dyn BlobStore {
        self.blobs.as_ref()
    }

    pub fn watch_list_key(&self) -> &str {
        &self.watch_list_key
    }

    /// Fingerprint of `url` under the configured derivation.
    pub fn fingerprint(&self, url: &str) -> String {
        match self.key_derivation {
            KeyDerivation::Sha1 => fingerprint(url),
            KeyDerivation::Sha256 => sha256_fingerprint(url),
            KeyDerivation::Alphanumeric => degraded_fingerprint(url),
        }
    }

    /// Key of the state record of `url`.
    pub fn state_key(&self, url: &str) -> String {
        format!("state-{}.json", self.fingerprint(url))
    }

    /// Load the watch list.
    ///
    /// `Ok(None)` when the blob does not exist. A read failure is returned
    /// as an error: without the list there is nothing to do.
    pub async fn load_watch_list(&self) -> Result<Option<Vec<String>>> {
        let Some(bytes) = self.blobs.get(&self.watch_list_key).await? else {
            return Ok(None);
        };

        let text = String::from_utf8(bytes)
            .map_err(|e| AppError::storage(&self.watch_list_key, format!("not valid UTF-8: {e}")))?;
        Ok(Some(parse_watch_list(&text)))
    }

    /// Read the stored record of `url`.
    pub async fn read_record(&self, url: &str) -> RecordLookup {
        let key = self.state_key(url);
        match self.blobs.get(&key).await {
            Ok(None) => RecordLookup::Missing,
            Ok(Some(bytes)) => match serde_json::from_slice::<StateRecord>(&bytes) {
                Ok(record) => RecordLookup::Found(record),
                Err(e) => match serde_json::from_slice::<StoredState>(&bytes) {
                    Ok(stored) => RecordLookup::Untimed {
                        state: stored.state,
                        reason: e.to_string(),
                    },
                    Err(_) => RecordLookup::Corrupted(e.to_string()),
                },
            },
            Err(e) => RecordLookup::Unreadable(e),
        }
    }

    /// Overwrite the stored record of `url`.
    pub async fn write_record(&self, url: &str, record: &StateRecord) -> Result<()> {
        let key = self.state_key(url);
        let bytes = serde_json::to_vec(record)?;
        self.blobs.put(&key, bytes, JSON_CONTENT_TYPE).await
    }
}
