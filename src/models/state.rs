//! Seat availability states and the persisted state record.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, de};

/// State assumed for a URL whose previous record is missing or unreadable.
///
/// A first-ever `FULL` observation therefore never notifies, while a
/// first-ever `OPEN` observation does. Cold starts must not announce
/// "full" for every watched beta.
pub const DEFAULT_PREVIOUS_STATE: SeatState = SeatState::Full;

/// Every state a watched URL can be reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatState {
    Open,
    Full,
    Unknown,
    InvalidUrl,
    Corrupted,
}

impl SeatState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatState::Open => "OPEN",
            SeatState::Full => "FULL",
            SeatState::Unknown => "UNKNOWN",
            SeatState::InvalidUrl => "INVALID_URL",
            SeatState::Corrupted => "CORRUPTED",
        }
    }
}

impl fmt::Display for SeatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two-valued output of the page classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Availability {
    Open,
    Full,
}

impl From<Availability> for SeatState {
    fn from(value: Availability) -> Self {
        match value {
            Availability::Open => SeatState::Open,
            Availability::Full => SeatState::Full,
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        SeatState::from(*self).fmt(f)
    }
}

/// Persisted record, stored as `state-<fingerprint>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    #[serde(rename = "STATE")]
    pub state: SeatState,

    #[serde(rename = "TIME", deserialize_with = "deserialize_timestamp")]
    pub observed_at: DateTime<FixedOffset>,
}

/// The part of a stored record that change detection compares.
///
/// Parsed on its own when the full record is rejected, so a record with an
/// odd `TIME` still yields its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StoredState {
    #[serde(rename = "STATE")]
    pub state: SeatState,
}

/// Parse an ISO-8601 timestamp. Values without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw).ok().or_else(|| {
        raw.parse::<NaiveDateTime>()
            .ok()
            .map(|naive| naive.and_utc().fixed_offset())
    })
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid TIME {raw:?}")))
}

impl StateRecord {
    pub fn new(state: impl Into<SeatState>, observed_at: DateTime<FixedOffset>) -> Self {
        Self {
            state: state.into(),
            observed_at,
        }
    }
}
