//! Lifecycle events emitted while a payment run progresses.
//!
//! Sinks receive an event type and an optional JSON payload. Every payload
//! built by [`event_payload`] carries the payment id and an ISO-8601
//! timestamp.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use crate::utils::iso_timestamp;

/// Run accepted by the coordinator.
pub const RUN_STARTED: &str = "payment.run.started";
/// A step is about to issue its first call.
pub const STEP_STARTED: &str = "payment.step.started";
/// A step call succeeded.
pub const STEP_COMPLETED: &str = "payment.step.completed";
/// A step call failed transiently and will be retried.
pub const STEP_RETRY: &str = "payment.step.retry";
/// The deadline timer won the race.
pub const TIMER_FIRED: &str = "payment.timer.fired";
/// The terminal result was recorded.
pub const RUN_FINISHED: &str = "payment.run.finished";

/// Builds an event payload for `payment_id` merged with `fields`.
///
/// `fields` should be a JSON object; other values are stored under `"data"`.
#[must_use]
pub fn event_payload(payment_id: &str, fields: serde_json::Value) -> serde_json::Value {
    let mut payload = serde_json::json!({
        "payment_id": payment_id,
        "timestamp": iso_timestamp(),
    });
    if let serde_json::Value::Object(ref mut map) = payload {
        match fields {
            serde_json::Value::Object(extra) => map.extend(extra),
            serde_json::Value::Null => {}
            other => {
                map.insert("data".to_string(), other);
            }
        }
    }
    payload
}
