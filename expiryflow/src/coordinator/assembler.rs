//! Builds the terminal result from whichever path won the race.

use crate::core::{PaymentInput, PaymentResult, PaymentStatus, PipelineOutcome, Rejection};
use crate::errors::ExpiryflowError;
use crate::tracker::UNRESOLVED_MESSAGE;
use tracing::{debug, error};

/// Which side of the race resolved first.
#[derive(Debug)]
pub enum RaceWinner {
    /// The pipeline ended before the deadline.
    Pipeline(Result<PipelineOutcome, ExpiryflowError>),
    /// The deadline fired; carries the pipeline's acknowledgement.
    Timer(Result<PipelineOutcome, ExpiryflowError>),
}

/// A terminal result plus the error to surface to the caller, if any.
#[derive(Debug)]
pub struct Assembled {
    /// The result to record.
    pub result: PaymentResult,
    /// Set for step failures and internal inconsistencies.
    pub error: Option<ExpiryflowError>,
}

impl Assembled {
    fn ok(result: PaymentResult) -> Self {
        Self { result, error: None }
    }
}

/// Message recorded for an expired run.
#[must_use]
pub fn expired_message(deadline_seconds: u64) -> String {
    format!("Payment workflow expired after {deadline_seconds} seconds")
}

/// Message recorded for a completed run.
#[must_use]
pub fn completed_message(transaction_id: &str) -> String {
    format!("Payment completed successfully. Transaction ID: {transaction_id}")
}

/// Message recorded for a business rejection.
#[must_use]
pub fn rejection_message(rejection: Rejection) -> &'static str {
    match rejection {
        Rejection::Validation => "Payment validation failed",
        Rejection::Fraud => "Payment flagged as potentially fraudulent",
    }
}

/// Converts the race outcome into exactly one terminal result.
///
/// A timer win always yields `Expired`, however far the pipeline got.
#[must_use]
pub fn assemble(input: &PaymentInput, winner: RaceWinner) -> Assembled {
    let id = input.id.as_str();
    match winner {
        RaceWinner::Timer(acknowledged) => {
            match &acknowledged {
                Ok(PipelineOutcome::Cancelled(point)) => debug!(
                    payment_id = %id,
                    point = %point,
                    interrupted_call = point.interrupted_call(),
                    "Pipeline acknowledged expiration"
                ),
                Ok(other) => debug!(
                    payment_id = %id,
                    outcome = ?other,
                    "Pipeline finished as the deadline fired"
                ),
                Err(err) => error!(
                    payment_id = %id,
                    error = %err,
                    "Pipeline errored after the deadline fired"
                ),
            }
            Assembled::ok(PaymentResult::new(
                id,
                PaymentStatus::Expired,
                expired_message(input.deadline_seconds),
            ))
        }
        RaceWinner::Pipeline(Ok(PipelineOutcome::Completed { transaction_id })) => Assembled::ok(
            PaymentResult::new(id, PaymentStatus::Completed, completed_message(&transaction_id)),
        ),
        RaceWinner::Pipeline(Ok(PipelineOutcome::Rejected(rejection))) => Assembled::ok(
            PaymentResult::new(id, PaymentStatus::Cancelled, rejection_message(rejection)),
        ),
        RaceWinner::Pipeline(Ok(PipelineOutcome::Failed(failure))) => {
            let message = format!(
                "Payment step '{}' failed after {} attempt(s): {}",
                failure.step,
                failure.attempts,
                failure.error.message()
            );
            Assembled {
                result: PaymentResult::new(id, PaymentStatus::Failed, message),
                error: Some(failure.into_error()),
            }
        }
        RaceWinner::Pipeline(Ok(PipelineOutcome::Cancelled(point))) => {
            let detail = format!("pipeline cancelled {point} without the deadline firing");
            error!(payment_id = %id, detail = %detail, "Run ended without a terminal path");
            Assembled {
                result: PaymentResult::new(id, PaymentStatus::Unresolved, UNRESOLVED_MESSAGE),
                error: Some(ExpiryflowError::InternalInconsistency(detail)),
            }
        }
        RaceWinner::Pipeline(Err(err)) => {
            error!(payment_id = %id, error = %err, "Pipeline ended with an internal error");
            Assembled {
                result: PaymentResult::new(id, PaymentStatus::Unresolved, UNRESOLVED_MESSAGE),
                error: Some(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CancelPoint, StepFailure, StepName};
    use crate::errors::StepError;
    use pretty_assertions::assert_eq;

    fn input() -> PaymentInput {
        PaymentInput::new("PAY-1", 100.0, 3)
    }

    #[test]
    fn test_completed() {
        let assembled = assemble(
            &input(),
            RaceWinner::Pipeline(Ok(PipelineOutcome::Completed {
                transaction_id: "TXN-PAY-1-10000".to_string(),
            })),
        );
        assert_eq!(
            assembled.result,
            PaymentResult::new(
                "PAY-1",
                PaymentStatus::Completed,
                "Payment completed successfully. Transaction ID: TXN-PAY-1-10000"
            )
        );
        assert!(assembled.error.is_none());
    }

    #[test]
    fn test_rejections() {
        let validation = assemble(
            &input(),
            RaceWinner::Pipeline(Ok(PipelineOutcome::Rejected(Rejection::Validation))),
        );
        assert_eq!(validation.result.status, PaymentStatus::Cancelled);
        assert_eq!(validation.result.message, "Payment validation failed");

        let fraud = assemble(
            &input(),
            RaceWinner::Pipeline(Ok(PipelineOutcome::Rejected(Rejection::Fraud))),
        );
        assert_eq!(fraud.result.message, "Payment flagged as potentially fraudulent");
        assert!(fraud.error.is_none());
    }

    #[test]
    fn test_timer_always_expires() {
        let outcomes = vec![
            Ok(PipelineOutcome::Cancelled(CancelPoint::DuringStep(StepName::Accept))),
            Ok(PipelineOutcome::Completed {
                transaction_id: "TXN".to_string(),
            }),
            Err(ExpiryflowError::InternalInconsistency("boom".to_string())),
        ];
        for outcome in outcomes {
            let assembled = assemble(&input(), RaceWinner::Timer(outcome));
            assert_eq!(assembled.result.status, PaymentStatus::Expired);
            assert_eq!(
                assembled.result.message,
                "Payment workflow expired after 3 seconds"
            );
            assert!(assembled.error.is_none());
        }
    }

    #[test]
    fn test_step_failure_surfaces_error() {
        let assembled = assemble(
            &input(),
            RaceWinner::Pipeline(Ok(PipelineOutcome::Failed(StepFailure {
                step: StepName::Accept,
                attempts: 3,
                error: StepError::non_retryable("card revoked"),
            }))),
        );
        assert_eq!(assembled.result.status, PaymentStatus::Failed);
        assert_eq!(
            assembled.result.message,
            "Payment step 'accept' failed after 3 attempt(s): card revoked"
        );
        assert!(matches!(
            assembled.error,
            Some(ExpiryflowError::StepFailed { attempts: 3, .. })
        ));
    }

    #[test]
    fn test_cancel_without_timer_is_unresolved() {
        let assembled = assemble(
            &input(),
            RaceWinner::Pipeline(Ok(PipelineOutcome::Cancelled(CancelPoint::BeforeStep(
                StepName::Notify,
            )))),
        );
        assert_eq!(assembled.result.status, PaymentStatus::Unresolved);
        assert_eq!(assembled.result.message, UNRESOLVED_MESSAGE);
        assert!(matches!(
            assembled.error,
            Some(ExpiryflowError::InternalInconsistency(_))
        ));
    }
}
