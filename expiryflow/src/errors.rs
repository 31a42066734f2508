//! Error types for the expiryflow core.
//!
//! Two layers of errors exist. [`StepError`] is what a payment collaborator
//! returns from a single remote call and drives the retry loop.
//! [`ExpiryflowError`] is what the coordinator, tracker and configuration
//! surface to callers.

use crate::core::{PaymentStatus, StepName};
use thiserror::Error;

/// Error returned by a single collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    /// A failure that may succeed if the call is repeated.
    #[error("transient failure: {0}")]
    Transient(String),

    /// A failure that repeating the call will not fix.
    #[error("non-retryable failure: {0}")]
    NonRetryable(String),
}

impl StepError {
    /// Creates a transient error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Creates a non-retryable error.
    #[must_use]
    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self::NonRetryable(message.into())
    }

    /// Returns true if the retry policy may repeat the call.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Returns the error message without the classification prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Transient(msg) | Self::NonRetryable(msg) => msg,
        }
    }
}

/// The main error type for expiryflow operations.
#[derive(Debug, Error)]
pub enum ExpiryflowError {
    /// The process input was rejected before the run started.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A status write would move the run backwards or skip the table.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// Status currently recorded.
        from: PaymentStatus,
        /// Status that was requested.
        to: PaymentStatus,
    },

    /// A write was attempted after the terminal result was recorded.
    #[error("Run already terminal with status {0}")]
    AlreadyTerminal(PaymentStatus),

    /// A step could not complete after its retries.
    #[error("Step '{step}' failed after {attempts} attempt(s): {message}")]
    StepFailed {
        /// The step that failed.
        step: StepName,
        /// Number of calls made.
        attempts: u32,
        /// Last error message reported by the collaborator.
        message: String,
    },

    /// Neither the pipeline nor the timer produced a terminal outcome.
    #[error("Internal inconsistency: {0}")]
    InternalInconsistency(String),

    /// A run with the same id is still registered.
    #[error("Run '{0}' is already registered")]
    DuplicateRun(String),

    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExpiryflowError {
    /// Returns true for errors that indicate a defect rather than a business path.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::InternalInconsistency(_) | Self::InvalidTransition { .. } | Self::AlreadyTerminal(_)
        )
    }
}
