//! Application configuration structures.

use std::fs;
use std::path::Path;

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Which pages are watched and how they are classified
    #[serde(default)]
    pub target: TargetConfig,

    /// HTTP and polling behavior settings
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Webhook notification settings
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Blob store layout
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply overrides from process environment variables.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Recognised variables: `DISCORD_WEBHOOK_URL` (or `WEBHOOK_URL`),
    /// `WATCHER_TIMEOUT_SECS`, `WATCHER_REQUEST_DELAY_MS`, `WATCH_LIST_KEY`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("DISCORD_WEBHOOK_URL").or_else(|| lookup("WEBHOOK_URL")) {
            let url = url.trim().to_string();
            self.notifier.webhook_url = if url.is_empty() { None } else { Some(url) };
        }

        if let Some(secs) = lookup("WATCHER_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.watcher.timeout_secs = secs;
        }

        if let Some(ms) = lookup("WATCHER_REQUEST_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.watcher.request_delay_ms = ms;
        }

        if let Some(key) = lookup("WATCH_LIST_KEY") {
            self.storage.watch_list_key = key;
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.target.scheme.as_str(), "http" | "https") {
            return Err(AppError::validation(format!(
                "target.scheme must be http or https, got {:?}",
                self.target.scheme
            )));
        }
        if self.target.host.trim().is_empty() {
            return Err(AppError::validation("target.host is empty"));
        }
        if !self.target.path_prefix.starts_with('/') {
            return Err(AppError::validation("target.path_prefix must start with '/'"));
        }
        if self.target.full_marker.is_empty() {
            return Err(AppError::validation("target.full_marker is empty"));
        }
        if self.watcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("watcher.user_agent is empty"));
        }
        if self.watcher.timeout_secs == 0 {
            return Err(AppError::validation("watcher.timeout_secs must be > 0"));
        }
        if self.watcher.interval_secs == 0 {
            return Err(AppError::validation("watcher.interval_secs must be > 0"));
        }
        if self.notifier.checked_offset().is_none() {
            return Err(AppError::validation(
                "notifier.utc_offset_hours must be between -23 and 23",
            ));
        }
        if let Some(webhook) = &self.notifier.webhook_url {
            url::Url::parse(webhook)
                .map_err(|e| AppError::validation(format!("notifier.webhook_url: {e}")))?;
        }
        if self.storage.watch_list_key.trim().is_empty() {
            return Err(AppError::validation("storage.watch_list_key is empty"));
        }
        Ok(())
    }
}

/// Shape of the watched pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Required URL scheme
    #[serde(default = "defaults::scheme")]
    pub scheme: String,

    /// Required host name
    #[serde(default = "defaults::host")]
    pub host: String,

    /// Required path prefix
    #[serde(default = "defaults::path_prefix")]
    pub path_prefix: String,

    /// Literal text whose presence in the page means "full"
    #[serde(default = "defaults::full_marker")]
    pub full_marker: String,
}

impl TargetConfig {
    /// Root of the target site, sent as `Referer`.
    pub fn site_root(&self) -> String {
        format!("{}://{}/", self.scheme, self.host)
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            scheme: defaults::scheme(),
            host: defaults::host(),
            path_prefix: defaults::path_prefix(),
            full_marker: defaults::full_marker(),
        }
    }
}

/// HTTP client and polling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// User-Agent header for page requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Accept-Language header for page requests
    #[serde(default = "defaults::accept_language")]
    pub accept_language: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between URLs of one pass in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,

    /// Interval between passes for the local `watch` loop
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            accept_language: defaults::accept_language(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: 0,
            interval_secs: defaults::interval(),
        }
    }
}

/// Webhook notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Discord-compatible webhook endpoint; notifications are skipped when unset
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Footer text of the embed
    #[serde(default = "defaults::footer")]
    pub footer: String,

    /// Fixed UTC offset for timestamps in records and messages
    #[serde(default = "defaults::utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl NotifierConfig {
    /// Offset used for every timestamp this crate produces.
    ///
    /// Out-of-range values fall back to UTC; `Config::validate` rejects them.
    pub fn offset(&self) -> FixedOffset {
        self.checked_offset().unwrap_or(Utc.fix())
    }

    /// The configured offset, or `None` when it is not a valid one.
    pub fn checked_offset(&self) -> Option<FixedOffset> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            footer: defaults::footer(),
            utc_offset_hours: defaults::utc_offset_hours(),
        }
    }
}

/// How per-URL state keys are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyDerivation {
    /// Truncated SHA-1 digest, the layout of existing buckets
    #[default]
    Sha1,
    /// Truncated SHA-256 digest
    Sha256,
    /// Alphanumeric characters of the URL, truncated. Collision-prone.
    Alphanumeric,
}

/// Blob store layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Key of the newline-delimited watch list
    #[serde(default = "defaults::watch_list_key")]
    pub watch_list_key: String,

    #[serde(default)]
    pub key_derivation: KeyDerivation,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            watch_list_key: defaults::watch_list_key(),
            key_derivation: KeyDerivation::default(),
        }
    }
}

mod defaults {
    // Target defaults
    pub fn scheme() -> String {
        "https".into()
    }
    pub fn host() -> String {
        "testflight.apple.com".into()
    }
    pub fn path_prefix() -> String {
        "/join/".into()
    }
    pub fn full_marker() -> String {
        "<span>This beta is full.</span>".into()
    }

    // Watcher defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (TestFlight MultiChecker)".into()
    }
    pub fn accept_language() -> String {
        "en-US,en;q=0.9".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn interval() -> u64 {
        60
    }

    // Notifier defaults
    pub fn footer() -> String {
        "TestFlight Watcher".into()
    }
    pub fn utc_offset_hours() -> i32 {
        7
    }

    // Storage defaults
    pub fn watch_list_key() -> String {
        "urls.txt".into()
    }
}
