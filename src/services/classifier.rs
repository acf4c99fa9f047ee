// src/services/classifier.rs

//! Page classifier.
//!
//! Fetches a beta page and decides between open and full by looking for a
//! literal marker in the body. The page markup is not ours, so no parsing
//! is attempted: marker present means full, anything else that loaded
//! successfully means open.

use reqwest::Client;
use reqwest::header::{ACCEPT_LANGUAGE, CACHE_CONTROL, EXPIRES, PRAGMA, REFERER};

use crate::error::{AppError, Result};
use crate::models::{Availability, Config};
use crate::utils::http::create_async_client;

/// Classify an already fetched body.
pub fn classify_body(body: &str, full_marker: &str) -> Availability {
    if body.contains(full_marker) {
        Availability::Full
    } else {
        Availability::Open
    }
}

/// Service for classifying watched pages.
#[derive(Debug, Clone)]
pub struct PageClassifier {
    client: Client,
    accept_language: String,
    referer: String,
    full_marker: String,
}

impl PageClassifier {
    /// Create a classifier with its own HTTP client.
    pub fn new(config: &Config) -> Result<Self> {
        let client = create_async_client(&config.watcher)?;
        Ok(Self::with_client(client, config))
    }

    /// Create a classifier sharing an existing client.
    pub fn with_client(client: Client, config: &Config) -> Self {
        Self {
            client,
            accept_language: config.watcher.accept_language.clone(),
            referer: config.target.site_root(),
            full_marker: config.target.full_marker.clone(),
        }
    }

    /// Fetch `url` and classify it.
    ///
    /// Non-success statuses are errors, never a state.
    pub async fn classify(&self, url: &str) -> Result<Availability> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT_LANGUAGE, &self.accept_language)
            .header(CACHE_CONTROL, "no-cache, no-store, must-revalidate")
            .header(PRAGMA, "no-cache")
            .header(EXPIRES, "0")
            .header(REFERER, &self.referer)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let availability = classify_body(&body, &self.full_marker);
        log::debug!(
            "Classified {} as {} (HTTP {}, {} bytes)",
            url,
            availability,
            status.as_u16(),
            body.len()
        );
        Ok(availability)
    }
}
