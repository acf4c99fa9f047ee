// src/config.rs

//! Configuration loading from a blob store.
//!
//! Used where there is no local filesystem to read `config.toml` from.

use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::storage::BlobStore;

/// Default key of the configuration object.
pub const CONFIG_KEY: &str = "config.toml";

/// Config loader reading `config.toml` from a blob store.
pub struct StoreConfigLoader {
    blobs: Arc<dyn BlobStore>,
    key: String,
}

impl StoreConfigLoader {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self::with_key(blobs, CONFIG_KEY)
    }

    pub fn with_key(blobs: Arc<dyn BlobStore>, key: impl Into<String>) -> Self {
        Self {
            blobs,
            key: key.into(),
        }
    }

    /// Load the stored config, without environment overrides.
    ///
    /// A missing object yields the default configuration; an unreadable or
    /// malformed one is an error.
    pub async fn load_stored(&self) -> Result<Config> {
        let Some(bytes) = self.blobs.get(&self.key).await? else {
            log::info!(
                "No config at {}, using defaults",
                self.blobs.location(&self.key)
            );
            return Ok(Config::default());
        };

        log::info!("Loading config from {}", self.blobs.location(&self.key));
        let text = String::from_utf8(bytes).map_err(|e| {
            AppError::config(format!("Config file {} is not valid UTF-8: {}", self.key, e))
        })?;
        Config::from_toml(&text)
    }

    /// Load the stored config, apply process environment overrides and
    /// validate the result.
    pub async fn load_config(&self) -> Result<Config> {
        let mut config = self.load_stored().await?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }
}
