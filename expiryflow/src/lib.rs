//! # Expiryflow
//!
//! Deadline-bounded execution of a multi-step payment process.
//!
//! A run races a four-step pipeline (validate, check fraud, accept, notify)
//! against a deadline timer. Whichever finishes first decides the single
//! terminal result; the loser is cancelled cooperatively. The run's status can
//! be queried at any time without waiting on in-flight steps.
//!
//! - **Race coordination**: timer armed before the pipeline, timer wins ties
//! - **Retries**: transient step failures back off along a capped curve
//! - **Cancellation**: observed before each step, during interruptible calls
//!   and backoff sleeps, and after each call returns
//! - **Status tracking**: one writer, any number of lock-free readers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use expiryflow::prelude::*;
//! use std::sync::Arc;
//!
//! let coordinator = RaceCoordinator::new(Arc::new(SimulatedPaymentActivities::new()));
//! let result = coordinator.run(PaymentInput::new("PAY-1", 100.0, 10)).await?;
//! assert_eq!(result.status, PaymentStatus::Completed);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod activities;
pub mod cancellation;
pub mod config;
pub mod coordinator;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod registry;
pub mod testing;
pub mod tracker;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::activities::SimulatedPaymentActivities;
    pub use crate::cancellation::{CancellationToken, DeadlineTimer};
    pub use crate::config::ExpiryConfig;
    pub use crate::coordinator::{RaceCoordinator, RunHandle};
    pub use crate::core::{
        CancelPoint, PaymentInput, PaymentResult, PaymentStatus, PipelineOutcome, Rejection,
        StepName, StepOutcome,
    };
    pub use crate::errors::{ExpiryflowError, StepError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_tracing, LoggingConfig};
    pub use crate::pipeline::{JitterStrategy, PaymentActivities, RetryPolicy, StepOptions};
    pub use crate::registry::RunRegistry;
    pub use crate::tracker::{RunSnapshot, RunState, StatusQuery, StatusWriter};
    pub use crate::utils::{generate_payment_id, iso_timestamp};
}
