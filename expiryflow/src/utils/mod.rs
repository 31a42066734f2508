//! Utility functions for identifiers and timestamps.

pub(crate) mod duration_millis;
mod ids;
mod timestamps;

pub use ids::{generate_payment_id, generate_uuid};
pub use timestamps::{iso_timestamp, now_utc, Timestamp};
