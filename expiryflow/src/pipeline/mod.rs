//! Step execution and the payment pipeline.
//!
//! This module provides:
//! - Retry policy with a capped backoff curve
//! - Step runner with per-call timeout and cooperative cancellation
//! - The payment pipeline and its collaborator trait

mod payment;
mod retry;
mod step;

#[cfg(test)]
pub use payment::MockPaymentActivities;
pub use payment::{PaymentActivities, PaymentPipeline, PipelineHandle, PipelineRun};
pub use retry::{JitterStrategy, RetryDecision, RetryPolicy, RetryState};
pub use step::{StepOptions, StepRunner};
