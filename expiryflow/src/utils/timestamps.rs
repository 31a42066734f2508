//! Timestamp helpers for event payloads.

use chrono::{DateTime, Utc};

/// A UTC timestamp.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC time as an ISO 8601 string with microseconds,
/// e.g. `2024-01-01T12:00:00.000000+00:00`.
#[must_use]
pub fn iso_timestamp() -> String {
    now_utc().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}
