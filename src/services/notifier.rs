//! Webhook notification dispatcher.
//!
//! Builds Discord webhook messages for seat transitions and posts them as
//! JSON. There is no retry: a failed dispatch is logged and the transition
//! is only announced again if the state flips back and forth.

use chrono::{DateTime, FixedOffset};
use reqwest::Client;
use serde::Serialize;

use crate::error::Result;
use crate::models::{Availability, DispatchOutcome, NotifierConfig};
use crate::utils::now_in;

const COLOR_AVAILABLE: u32 = 0x57F287;
const COLOR_FULL: u32 = 0xED4245;

/// Discord action row component type.
const ACTION_ROW: u8 = 1;
/// Discord button component type.
const BUTTON: u8 = 2;
/// Discord link button style.
const LINK_STYLE: u8 = 5;

/// Body of a webhook call.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookMessage {
    pub embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ActionRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub color: u32,
    pub timestamp: DateTime<FixedOffset>,
    pub footer: Footer,
}

#[derive(Debug, Clone, Serialize)]
pub struct Footer {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    pub kind: u8,
    pub components: Vec<Button>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Button {
    #[serde(rename = "type")]
    pub kind: u8,
    pub label: String,
    pub style: u8,
    pub url: String,
}

impl WebhookMessage {
    /// Message for a page whose seats just opened, with a join button.
    pub fn seats_available(url: &str, footer: &str, timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            embeds: vec![Embed {
                title: "TestFlight Available".to_string(),
                url: url.to_string(),
                kind: "rich".to_string(),
                description: "✅ New TestFlight seats available!".to_string(),
                color: COLOR_AVAILABLE,
                timestamp,
                footer: Footer {
                    text: footer.to_string(),
                },
            }],
            components: vec![ActionRow {
                kind: ACTION_ROW,
                components: vec![Button {
                    kind: BUTTON,
                    label: "Join TestFlight".to_string(),
                    style: LINK_STYLE,
                    url: url.to_string(),
                }],
            }],
        }
    }

    /// Message for a page that filled up again.
    pub fn seats_full(url: &str, footer: &str, timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            embeds: vec![Embed {
                title: "TestFlight Full".to_string(),
                url: url.to_string(),
                kind: "rich".to_string(),
                description: "🚫 All TestFlight seats are taken again.".to_string(),
                color: COLOR_FULL,
                timestamp,
                footer: Footer {
                    text: footer.to_string(),
                },
            }],
            components: Vec::new(),
        }
    }

    pub fn for_transition(
        url: &str,
        availability: Availability,
        footer: &str,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        match availability {
            Availability::Open => Self::seats_available(url, footer, timestamp),
            Availability::Full => Self::seats_full(url, footer, timestamp),
        }
    }
}

/// Posts transition messages to the configured webhook.
#[derive(Debug, Clone)]
pub struct Notifier {
    client: Client,
    config: NotifierConfig,
}

impl Notifier {
    pub fn new(client: Client, config: NotifierConfig) -> Self {
        Self { client, config }
    }

    /// Whether a webhook endpoint is configured.
    pub fn is_configured(&self) -> bool {
        self.config.webhook_url.is_some()
    }

    /// Announce that `url` became `availability`.
    ///
    /// Returns `Err` only when the request could not be sent at all.
    pub async fn dispatch(&self, url: &str, availability: Availability) -> Result<DispatchOutcome> {
        let Some(webhook_url) = &self.config.webhook_url else {
            log::info!(
                "Skipping notification for {} ({}): no webhook configured",
                url,
                availability
            );
            return Ok(DispatchOutcome::Skipped);
        };

        let message = WebhookMessage::for_transition(
            url,
            availability,
            &self.config.footer,
            now_in(self.config.offset()),
        );

        let response = self.client.post(webhook_url).json(&message).send().await?;
        let status = response.status();

        if status.is_success() {
            log::info!(
                "Notification sent for {} ({}), HTTP {}",
                url,
                availability,
                status.as_u16()
            );
            Ok(DispatchOutcome::Sent {
                status: status.as_u16(),
            })
        } else {
            let body = response.text().await.unwrap_or_default();
            log::error!(
                "Notification rejected for {} ({}): HTTP {}: {}",
                url,
                availability,
                status.as_u16(),
                body
            );
            Ok(DispatchOutcome::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}
