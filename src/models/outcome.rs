//! Outcomes of a polling pass.

use serde::Serialize;

use super::{Availability, SeatState};

/// Result of a single webhook dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Webhook accepted the message
    Sent { status: u16 },
    /// No webhook configured
    Skipped,
    /// Webhook answered with a non-success status
    Rejected { status: u16, body: String },
    /// Request never produced a response
    Failed { message: String },
}

/// What happened to one watched URL during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UrlOutcome {
    /// Not a valid target URL; nothing fetched or stored
    Invalid,
    /// Page could not be classified this pass
    FetchFailed { message: String },
    /// Classified, same as the previous state
    Unchanged { state: SeatState },
    /// Classified, different from the previous state, but not recorded
    PersistFailed {
        previous: SeatState,
        current: SeatState,
        message: String,
    },
    /// Transition recorded and notification attempted
    Changed {
        previous: SeatState,
        current: SeatState,
        notification: DispatchOutcome,
    },
}

/// Per-URL entry of a pass summary.
#[derive(Debug, Clone, Serialize)]
pub struct UrlReport {
    pub url: String,
    #[serde(flatten)]
    pub outcome: UrlOutcome,
}

/// Counters and per-URL outcomes of a polling pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassSummary {
    /// Entries in the watch list
    pub total: usize,
    /// URLs classified and compared (changed or not)
    pub processed: usize,
    /// URLs skipped because of an error, invalid URLs included
    pub errored: usize,
    /// URLs whose transition was recorded
    pub changed: usize,
    /// Invalid URLs
    pub invalid: usize,
    pub reports: Vec<UrlReport>,
}

impl PassSummary {
    /// Fold one URL outcome into the counters.
    pub fn record(&mut self, url: &str, outcome: UrlOutcome) {
        match &outcome {
            UrlOutcome::Invalid => {
                self.invalid += 1;
                self.errored += 1;
            }
            UrlOutcome::FetchFailed { .. } | UrlOutcome::PersistFailed { .. } => {
                self.errored += 1;
            }
            UrlOutcome::Unchanged { .. } => self.processed += 1,
            UrlOutcome::Changed { .. } => {
                self.changed += 1;
                self.processed += 1;
            }
        }
        self.reports.push(UrlReport {
            url: url.to_string(),
            outcome,
        });
    }

    /// Outcome recorded for `url`, if any.
    pub fn outcome_for(&self, url: &str) -> Option<&UrlOutcome> {
        self.reports
            .iter()
            .find(|r| r.url == url)
            .map(|r| &r.outcome)
    }
}

impl UrlOutcome {
    pub fn changed(previous: SeatState, current: Availability, notification: DispatchOutcome) -> Self {
        UrlOutcome::Changed {
            previous,
            current: current.into(),
            notification,
        }
    }
}
