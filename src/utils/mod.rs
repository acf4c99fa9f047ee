//! Utility functions and helpers.

pub mod http;
pub mod url;

use chrono::{DateTime, FixedOffset, Utc};

/// Current time expressed in the given fixed offset.
pub fn now_in(offset: FixedOffset) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&offset)
}
