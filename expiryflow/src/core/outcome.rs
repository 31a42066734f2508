//! Outcomes of single steps and of the whole pipeline.

use super::{CancelPoint, Rejection, StepName};
use crate::errors::{ExpiryflowError, StepError};

/// A step that could not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    /// The failing step.
    pub step: StepName,
    /// Number of calls made, including the first.
    pub attempts: u32,
    /// The last error reported.
    pub error: StepError,
}

impl StepFailure {
    /// Converts the failure into the error surfaced to the caller.
    #[must_use]
    pub fn into_error(self) -> ExpiryflowError {
        ExpiryflowError::StepFailed {
            step: self.step,
            attempts: self.attempts,
            message: self.error.message().to_string(),
        }
    }
}

/// Result of invoking one step through the retry loop.
///
/// Transient failures never appear here; they are consumed by retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome<T> {
    /// The call succeeded with a payload.
    Success(T),
    /// The call failed and will not be retried.
    Failed(StepFailure),
    /// A cancellation signal stopped the step.
    Cancelled(CancelPoint),
}

impl<T> StepOutcome<T> {
    /// Returns true for a successful call.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns true if the step was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// How the pipeline task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// All four steps succeeded.
    Completed {
        /// Transaction id returned by the accept step.
        transaction_id: String,
    },
    /// A business rule rejected the payment.
    Rejected(Rejection),
    /// Cancellation was observed before the pipeline finished.
    Cancelled(CancelPoint),
    /// A step failed permanently.
    Failed(StepFailure),
}

impl PipelineOutcome {
    /// Returns true if the pipeline reached a business conclusion on its own.
    #[must_use]
    pub fn is_conclusive(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Rejected(_))
    }
}
