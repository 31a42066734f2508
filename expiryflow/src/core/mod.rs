//! Core types for expiryflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Payment status and its transition table
//! - Run input and terminal result records
//! - Step and pipeline outcomes

mod model;
mod outcome;
mod status;

pub use model::{CancelPoint, PaymentInput, PaymentResult, Rejection, StepName};
pub use outcome::{PipelineOutcome, StepFailure, StepOutcome};
pub use status::PaymentStatus;
