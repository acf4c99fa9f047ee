// src/services/mod.rs

//! Services that talk to the outside world.
//!
//! - `PageClassifier`: fetches watched pages and derives their availability
//! - `Notifier`: posts transition messages to the webhook

pub mod classifier;
pub mod notifier;

pub use classifier::{PageClassifier, classify_body};
pub use notifier::{Notifier, WebhookMessage};
