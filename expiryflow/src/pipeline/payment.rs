//! The payment pipeline: validate, check fraud, accept, notify.

use super::step::{StepOptions, StepRunner};
use crate::cancellation::CancellationToken;
use crate::core::{CancelPoint, PaymentInput, PipelineOutcome, Rejection, StepName, StepOutcome};
use crate::errors::{ExpiryflowError, StepError};
use crate::events::{self, EventSink, NoOpEventSink};
use crate::tracker::StatusWriter;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Remote operations the pipeline drives. Implemented by the host system.
///
/// Every call must be idempotent: the pipeline may repeat it after a
/// transient failure or a per-call timeout.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentActivities: Send + Sync {
    /// Returns true if the payment details are valid.
    async fn validate(&self, payment_id: &str, amount: f64) -> Result<bool, StepError>;

    /// Returns true if the payment is NOT fraudulent.
    async fn check_fraud(&self, payment_id: &str, amount: f64) -> Result<bool, StepError>;

    /// Accepts the payment and returns a transaction id.
    async fn accept(&self, payment_id: &str, amount: f64) -> Result<String, StepError>;

    /// Notifies the customer about the accepted payment.
    async fn notify(&self, payment_id: &str, transaction_id: &str) -> Result<(), StepError>;
}

/// What the pipeline task hands back when it ends.
///
/// The status writer travels with the outcome so the terminal result is
/// recorded by the same single writer that recorded progress.
#[derive(Debug)]
pub struct PipelineRun {
    /// The run's status writer.
    pub writer: StatusWriter,
    /// How the pipeline ended.
    pub outcome: Result<PipelineOutcome, ExpiryflowError>,
}

/// Handle to a running pipeline task.
///
/// Awaiting the handle joins the task. Dropping it before completion delivers
/// cancellation so the task does not outlive its coordinator.
#[derive(Debug)]
pub struct PipelineHandle {
    handle: JoinHandle<PipelineRun>,
    token: Arc<CancellationToken>,
}

impl PipelineHandle {
    /// Returns true once the task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Future for PipelineHandle {
    type Output = Result<PipelineRun, ExpiryflowError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| {
            joined.map_err(|err| {
                ExpiryflowError::InternalInconsistency(format!("pipeline task did not finish: {err}"))
            })
        })
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        if !self.handle.is_finished() {
            self.token.cancel("pipeline handle dropped");
        }
    }
}

/// Executes the payment steps in order, recording progress as it goes.
#[derive(Clone)]
pub struct PaymentPipeline {
    activities: Arc<dyn PaymentActivities>,
    options: StepOptions,
    events: Arc<dyn EventSink>,
}

impl PaymentPipeline {
    /// Creates a pipeline over the given collaborator.
    #[must_use]
    pub fn new(activities: Arc<dyn PaymentActivities>, options: StepOptions) -> Self {
        Self {
            activities,
            options,
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the step options.
    #[must_use]
    pub fn options(&self) -> &StepOptions {
        &self.options
    }

    /// Spawns the pipeline on its own task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        &self,
        input: PaymentInput,
        writer: StatusWriter,
        token: Arc<CancellationToken>,
    ) -> PipelineHandle {
        let pipeline = self.clone();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut writer = writer;
            let outcome = pipeline.execute(&input, &mut writer, &task_token).await;
            PipelineRun { writer, outcome }
        });
        PipelineHandle { handle, token }
    }

    /// Runs the steps in order until one rejects, fails or is cancelled.
    ///
    /// Completed steps are never rolled back.
    pub async fn execute(
        &self,
        input: &PaymentInput,
        writer: &mut StatusWriter,
        token: &CancellationToken,
    ) -> Result<PipelineOutcome, ExpiryflowError> {
        let runner = StepRunner::new(&input.id, &self.options, token, self.events.as_ref());
        let id = input.id.as_str();
        let amount = input.amount;

        if let Some(stop) = self.enter(input, writer, token, StepName::Validate)? {
            return Ok(stop);
        }
        let is_valid = match runner
            .run(StepName::Validate, || self.activities.validate(id, amount))
            .await
        {
            StepOutcome::Success(valid) => valid,
            StepOutcome::Failed(failure) => return Ok(PipelineOutcome::Failed(failure)),
            StepOutcome::Cancelled(point) => return Ok(cancelled(input, token, point)),
        };
        if !is_valid {
            info!(payment_id = %id, amount, "Payment validation failed");
            return Ok(PipelineOutcome::Rejected(Rejection::Validation));
        }

        if let Some(stop) = self.enter(input, writer, token, StepName::CheckFraud)? {
            return Ok(stop);
        }
        let is_not_fraudulent = match runner
            .run(StepName::CheckFraud, || self.activities.check_fraud(id, amount))
            .await
        {
            StepOutcome::Success(clean) => clean,
            StepOutcome::Failed(failure) => return Ok(PipelineOutcome::Failed(failure)),
            StepOutcome::Cancelled(point) => return Ok(cancelled(input, token, point)),
        };
        if !is_not_fraudulent {
            info!(payment_id = %id, amount, "Payment flagged as potentially fraudulent");
            return Ok(PipelineOutcome::Rejected(Rejection::Fraud));
        }

        if let Some(stop) = self.enter(input, writer, token, StepName::Accept)? {
            return Ok(stop);
        }
        let transaction_id = match runner
            .run(StepName::Accept, || self.activities.accept(id, amount))
            .await
        {
            StepOutcome::Success(transaction_id) => transaction_id,
            StepOutcome::Failed(failure) => return Ok(PipelineOutcome::Failed(failure)),
            StepOutcome::Cancelled(point) => return Ok(cancelled(input, token, point)),
        };

        if let Some(stop) = self.enter(input, writer, token, StepName::Notify)? {
            return Ok(stop);
        }
        match runner
            .run(StepName::Notify, || self.activities.notify(id, &transaction_id))
            .await
        {
            StepOutcome::Success(()) => {}
            StepOutcome::Failed(failure) => return Ok(PipelineOutcome::Failed(failure)),
            StepOutcome::Cancelled(point) => return Ok(cancelled(input, token, point)),
        }

        info!(
            payment_id = %id,
            transaction_id = %transaction_id,
            "Payment pipeline completed successfully"
        );
        Ok(PipelineOutcome::Completed { transaction_id })
    }

    /// Checks for cancellation, then records the step's status.
    fn enter(
        &self,
        input: &PaymentInput,
        writer: &mut StatusWriter,
        token: &CancellationToken,
        step: StepName,
    ) -> Result<Option<PipelineOutcome>, ExpiryflowError> {
        if token.is_cancelled() {
            return Ok(Some(cancelled(input, token, CancelPoint::BeforeStep(step))));
        }
        writer.advance(step.status())?;
        info!(
            payment_id = %input.id,
            step = %step,
            "Step {}: {}", step.ordinal(), step
        );
        self.events.emit(
            events::STEP_STARTED,
            Some(events::event_payload(
                &input.id,
                serde_json::json!({ "step": step, "ordinal": step.ordinal() }),
            )),
        );
        Ok(None)
    }
}

fn cancelled(input: &PaymentInput, token: &CancellationToken, point: CancelPoint) -> PipelineOutcome {
    warn!(
        payment_id = %input.id,
        point = %point,
        reason = token.reason().as_deref().unwrap_or("unspecified"),
        "Payment pipeline cancelled"
    );
    PipelineOutcome::Cancelled(point)
}

impl std::fmt::Debug for PaymentPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentPipeline")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PaymentStatus;
    use crate::events::CollectingEventSink;
    use crate::testing::ScriptedActivities;
    use crate::tracker::RunState;
    use std::time::Duration;

    fn input(amount: f64) -> PaymentInput {
        PaymentInput::new("PAY-1", amount, 10)
    }

    fn pipeline(mock: MockPaymentActivities) -> PaymentPipeline {
        PaymentPipeline::new(Arc::new(mock), StepOptions::default())
    }

    #[tokio::test]
    async fn test_happy_path_reaches_notified() {
        let mut mock = MockPaymentActivities::new();
        mock.expect_validate().times(1).returning(|_, _| Ok(true));
        mock.expect_check_fraud().times(1).returning(|_, _| Ok(true));
        mock.expect_accept()
            .times(1)
            .returning(|id, amount| Ok(format!("TXN-{id}-{amount}")));
        mock.expect_notify().times(1).returning(|_, _| Ok(()));

        let sink = Arc::new(CollectingEventSink::new());
        let pipeline = pipeline(mock).with_events(sink.clone());
        let (mut writer, query) = RunState::create("PAY-1");
        let token = CancellationToken::new();

        let outcome = pipeline.execute(&input(100.0), &mut writer, &token).await.unwrap();

        assert_eq!(
            outcome,
            PipelineOutcome::Completed {
                transaction_id: "TXN-PAY-1-100".to_string()
            }
        );
        assert_eq!(query.get_status(), PaymentStatus::Notified);
        assert_eq!(sink.events_of_type(events::STEP_STARTED).len(), 4);
        assert_eq!(sink.events_of_type(events::STEP_COMPLETED).len(), 4);
    }

    #[tokio::test]
    async fn test_validation_rejection_short_circuits() {
        let mut mock = MockPaymentActivities::new();
        mock.expect_validate().times(1).returning(|_, _| Ok(false));
        mock.expect_check_fraud().never();
        mock.expect_accept().never();
        mock.expect_notify().never();

        let (mut writer, query) = RunState::create("PAY-1");
        let outcome = pipeline(mock)
            .execute(&input(-5.0), &mut writer, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, PipelineOutcome::Rejected(Rejection::Validation));
        assert_eq!(query.get_status(), PaymentStatus::Validating);
    }

    #[tokio::test]
    async fn test_fraud_rejection_short_circuits() {
        let mut mock = MockPaymentActivities::new();
        mock.expect_validate().times(1).returning(|_, _| Ok(true));
        mock.expect_check_fraud().times(1).returning(|_, _| Ok(false));
        mock.expect_accept().never();
        mock.expect_notify().never();

        let (mut writer, query) = RunState::create("PAY-1");
        let outcome = pipeline(mock)
            .execute(&input(6_000.0), &mut writer, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, PipelineOutcome::Rejected(Rejection::Fraud));
        assert_eq!(query.get_status(), PaymentStatus::FraudCheck);
    }

    #[tokio::test]
    async fn test_cancelled_token_issues_no_calls() {
        let mut mock = MockPaymentActivities::new();
        mock.expect_validate().never();
        mock.expect_check_fraud().never();
        mock.expect_accept().never();
        mock.expect_notify().never();

        let token = CancellationToken::new();
        token.cancel("expired after 3 seconds");
        let (mut writer, query) = RunState::create("PAY-1");

        let outcome = pipeline(mock)
            .execute(&input(100.0), &mut writer, &token)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PipelineOutcome::Cancelled(CancelPoint::BeforeStep(StepName::Validate))
        );
        assert_eq!(query.get_status(), PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_permanent_failure_stops_pipeline() {
        let mut mock = MockPaymentActivities::new();
        mock.expect_validate().returning(|_, _| Ok(true));
        mock.expect_check_fraud().returning(|_, _| Ok(true));
        mock.expect_accept()
            .times(1)
            .returning(|_, _| Err(StepError::non_retryable("card revoked")));
        mock.expect_notify().never();

        let (mut writer, query) = RunState::create("PAY-1");
        let outcome = pipeline(mock)
            .execute(&input(100.0), &mut writer, &CancellationToken::new())
            .await
            .unwrap();

        match outcome {
            PipelineOutcome::Failed(failure) => {
                assert_eq!(failure.step, StepName::Accept);
                assert_eq!(failure.attempts, 1);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(query.get_status(), PaymentStatus::Accepted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_started_pipeline_returns_writer() {
        let activities = Arc::new(ScriptedActivities::new());
        let pipeline = PaymentPipeline::new(activities.clone(), StepOptions::default());
        let (writer, query) = RunState::create("PAY-1");
        let token = Arc::new(CancellationToken::new());

        let handle = pipeline.start(input(100.0), writer, token);
        let run = handle.await.unwrap();

        assert!(run.outcome.unwrap().is_conclusive());
        assert_eq!(run.writer.status(), PaymentStatus::Notified);
        assert_eq!(activities.calls(), StepName::ORDER.to_vec());
        drop(run.writer);
        // Releasing the writer without a terminal result closes the run.
        assert_eq!(query.get_status(), PaymentStatus::Unresolved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_step_stops_advancing() {
        let activities = Arc::new(ScriptedActivities::new());
        let pipeline = PaymentPipeline::new(activities.clone(), StepOptions::default());
        let (writer, query) = RunState::create("PAY-1");
        let token = Arc::new(CancellationToken::new());

        let handle = pipeline.start(input(100.0), writer, token.clone());
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(query.get_status(), PaymentStatus::FraudCheck);
        token.cancel("expired");

        let run = handle.await.unwrap();
        assert_eq!(
            run.outcome.unwrap(),
            PipelineOutcome::Cancelled(CancelPoint::DuringStep(StepName::CheckFraud))
        );
        assert_eq!(activities.call_count(StepName::Accept), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_cancels_pipeline() {
        let activities = Arc::new(ScriptedActivities::new());
        let pipeline = PaymentPipeline::new(activities, StepOptions::default());
        let (writer, _query) = RunState::create("PAY-1");
        let token = Arc::new(CancellationToken::new());

        let handle = pipeline.start(input(100.0), writer, token.clone());
        assert!(!handle.is_finished());
        drop(handle);

        assert!(token.is_cancelled());
        assert_eq!(token.reason().as_deref(), Some("pipeline handle dropped"));
    }
}
