//! Input, result and step identity types for a payment run.

use super::PaymentStatus;
use crate::errors::ExpiryflowError;
use crate::utils::generate_payment_id;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Input for one payment run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInput {
    /// Caller-supplied identifier, unique per run.
    pub id: String,
    /// Payment amount. Business bounds are enforced by the validation step.
    pub amount: f64,
    /// Seconds until the run expires.
    #[serde(default = "default_deadline_seconds")]
    pub deadline_seconds: u64,
}

fn default_deadline_seconds() -> u64 {
    PaymentInput::DEFAULT_DEADLINE_SECONDS
}

impl PaymentInput {
    /// Deadline applied when the caller does not provide one.
    pub const DEFAULT_DEADLINE_SECONDS: u64 = 5;

    /// Creates a new payment input.
    #[must_use]
    pub fn new(id: impl Into<String>, amount: f64, deadline_seconds: u64) -> Self {
        Self {
            id: id.into(),
            amount,
            deadline_seconds,
        }
    }

    /// Creates an input with a generated `PAY-xxxxxxxx` identifier.
    #[must_use]
    pub fn new_generated(amount: f64, deadline_seconds: u64) -> Self {
        Self::new(generate_payment_id(), amount, deadline_seconds)
    }

    /// Returns the deadline as a duration.
    #[must_use]
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_seconds)
    }

    /// Checks the structural preconditions for starting a run.
    ///
    /// Amounts outside the business bounds are accepted here; rejecting them
    /// is the validation step's job.
    pub fn validate(&self) -> Result<(), ExpiryflowError> {
        if self.id.trim().is_empty() {
            return Err(ExpiryflowError::InvalidInput(
                "payment id must not be empty".to_string(),
            ));
        }
        if !self.amount.is_finite() {
            return Err(ExpiryflowError::InvalidInput(format!(
                "amount must be finite, got {}",
                self.amount
            )));
        }
        if self.deadline_seconds == 0 {
            return Err(ExpiryflowError::InvalidInput(
                "deadline_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// The terminal record of a payment run. Produced exactly once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    /// The run identifier.
    pub id: String,
    /// Final status.
    pub status: PaymentStatus,
    /// Human-readable description of the outcome.
    pub message: String,
}

impl PaymentResult {
    /// Creates a new result.
    #[must_use]
    pub fn new(id: impl Into<String>, status: PaymentStatus, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status,
            message: message.into(),
        }
    }

    /// Returns true if the run expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.status == PaymentStatus::Expired
    }
}

/// The four steps of the payment pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    /// Validate the payment details.
    Validate,
    /// Screen the payment for fraud.
    CheckFraud,
    /// Accept the payment and obtain a transaction id.
    Accept,
    /// Notify the customer.
    Notify,
}

impl StepName {
    /// All steps in pipeline order.
    pub const ORDER: [Self; 4] = [Self::Validate, Self::CheckFraud, Self::Accept, Self::Notify];

    /// The status recorded while this step is in flight.
    #[must_use]
    pub fn status(&self) -> PaymentStatus {
        match self {
            Self::Validate => PaymentStatus::Validating,
            Self::CheckFraud => PaymentStatus::FraudCheck,
            Self::Accept => PaymentStatus::Accepted,
            Self::Notify => PaymentStatus::Notified,
        }
    }

    /// One-based position in the pipeline.
    #[must_use]
    pub fn ordinal(&self) -> usize {
        match self {
            Self::Validate => 1,
            Self::CheckFraud => 2,
            Self::Accept => 3,
            Self::Notify => 4,
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validate => write!(f, "validate"),
            Self::CheckFraud => write!(f, "check_fraud"),
            Self::Accept => write!(f, "accept"),
            Self::Notify => write!(f, "notify"),
        }
    }
}

/// A business rule that ended the pipeline early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// The validation step returned false.
    Validation,
    /// The fraud check flagged the payment.
    Fraud,
}

/// Where in the pipeline a cancellation signal was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelPoint {
    /// Observed before the step's remote call was issued.
    BeforeStep(StepName),
    /// Interrupted the step's outstanding call or its retry backoff.
    DuringStep(StepName),
    /// Observed after the step's call returned successfully.
    AfterStep(StepName),
}

impl CancelPoint {
    /// The step the pipeline was at when cancellation was observed.
    #[must_use]
    pub fn step(&self) -> StepName {
        match self {
            Self::BeforeStep(step) | Self::DuringStep(step) | Self::AfterStep(step) => *step,
        }
    }

    /// Returns true if a remote call was interrupted mid-flight.
    #[must_use]
    pub fn interrupted_call(&self) -> bool {
        matches!(self, Self::DuringStep(_))
    }
}

impl fmt::Display for CancelPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeStep(step) => write!(f, "before {step}"),
            Self::DuringStep(step) => write!(f, "during {step}"),
            Self::AfterStep(step) => write!(f, "after {step}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_validate() {
        assert!(PaymentInput::new("PAY-1", 100.0, 10).validate().is_ok());
        assert!(PaymentInput::new("PAY-1", -5.0, 10).validate().is_ok());
        assert!(PaymentInput::new("", 100.0, 10).validate().is_err());
        assert!(PaymentInput::new("PAY-1", f64::NAN, 10).validate().is_err());
        assert!(PaymentInput::new("PAY-1", 100.0, 0).validate().is_err());
    }

    #[test]
    fn test_input_default_deadline() {
        let input: PaymentInput =
            serde_json::from_str(r#"{"id": "PAY-1", "amount": 12.5}"#).unwrap();
        assert_eq!(input.deadline_seconds, PaymentInput::DEFAULT_DEADLINE_SECONDS);
        assert_eq!(input.deadline(), Duration::from_secs(5));
    }

    #[test]
    fn test_generated_input_id() {
        let input = PaymentInput::new_generated(100.0, 10);
        assert!(input.id.starts_with("PAY-"));
        assert_eq!(input.id.len(), 12);
    }

    #[test]
    fn test_result_serialize() {
        let result = PaymentResult::new("PAY-1", PaymentStatus::Completed, "done");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "PAY-1", "status": "COMPLETED", "message": "done"})
        );
        assert!(!result.is_expired());
    }

    #[test]
    fn test_step_order_and_status() {
        let statuses: Vec<_> = StepName::ORDER.iter().map(StepName::status).collect();
        assert_eq!(
            statuses,
            vec![
                PaymentStatus::Validating,
                PaymentStatus::FraudCheck,
                PaymentStatus::Accepted,
                PaymentStatus::Notified,
            ]
        );
        assert_eq!(StepName::CheckFraud.to_string(), "check_fraud");
        assert_eq!(StepName::Notify.ordinal(), 4);
    }

    #[test]
    fn test_cancel_point() {
        let point = CancelPoint::DuringStep(StepName::Accept);
        assert!(point.interrupted_call());
        assert_eq!(point.step(), StepName::Accept);
        assert_eq!(point.to_string(), "during accept");
        assert!(!CancelPoint::BeforeStep(StepName::Notify).interrupted_call());
    }
}
