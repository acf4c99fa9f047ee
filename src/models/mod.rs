// src/models/mod.rs

//! Domain models for the watcher.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod outcome;
mod state;

// Re-export all public types
pub use config::{Config, KeyDerivation, NotifierConfig, StorageConfig, TargetConfig, WatcherConfig};
pub use outcome::{DispatchOutcome, PassSummary, UrlOutcome, UrlReport};
pub use state::{
    Availability, DEFAULT_PREVIOUS_STATE, SeatState, StateRecord, StoredState, parse_timestamp,
};
