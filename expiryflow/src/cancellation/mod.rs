//! Cooperative cancellation primitives.
//!
//! This module provides:
//! - CancellationToken, the one-shot signal shared by the coordinator and the pipeline
//! - DeadlineTimer, the cancellable countdown that races the pipeline

mod timer;
mod token;

pub use timer::DeadlineTimer;
pub use token::CancellationToken;
