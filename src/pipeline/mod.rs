// src/pipeline/mod.rs

//! Watch passes and read-only reporting.

pub mod poll;
pub mod status;

pub use poll::Watcher;
pub use status::{HealthReport, StatusEntry, StatusReport, check_health, collect_statuses};
