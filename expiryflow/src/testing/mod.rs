//! Testing utilities for payment runs.
//!
//! This module provides:
//! - Scripted collaborators with per-step latency and injected failures
//! - A status recorder that samples a run from the outside
//! - Assertions for terminal results and status sequences

mod assertions;
mod recorder;
mod scripted;

pub use assertions::{
    assert_message_contains, assert_monotonic, assert_result_status, assert_stable_terminal,
};
pub use recorder::StatusRecorder;
pub use scripted::ScriptedActivities;
