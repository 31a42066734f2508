//! Races the payment pipeline against the run's deadline.

use super::assembler::{assemble, Assembled, RaceWinner};
use crate::cancellation::{CancellationToken, DeadlineTimer};
use crate::config::ExpiryConfig;
use crate::core::{PaymentInput, PaymentResult};
use crate::errors::ExpiryflowError;
use crate::events::{self, EventSink, NoOpEventSink};
use crate::pipeline::{PaymentActivities, PaymentPipeline, PipelineRun, StepOptions};
use crate::registry::RunRegistry;
use crate::tracker::{RunState, StatusQuery, StatusWriter};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Which branch of the select resolved first.
enum First {
    Timer,
    Pipeline(Result<PipelineRun, ExpiryflowError>),
}

/// Starts payment runs, each racing its pipeline against a deadline timer.
///
/// The timer is armed before the pipeline is spawned. Whichever finishes
/// first decides the terminal result; the loser is cancelled. When both are
/// ready at the same instant the timer wins.
#[derive(Clone)]
pub struct RaceCoordinator {
    pipeline: PaymentPipeline,
    events: Arc<dyn EventSink>,
    registry: Option<Arc<RunRegistry>>,
}

impl RaceCoordinator {
    /// Creates a coordinator with default step options.
    #[must_use]
    pub fn new(activities: Arc<dyn PaymentActivities>) -> Self {
        Self::with_options(activities, StepOptions::default())
    }

    /// Creates a coordinator with explicit step options.
    #[must_use]
    pub fn with_options(activities: Arc<dyn PaymentActivities>, options: StepOptions) -> Self {
        Self {
            pipeline: PaymentPipeline::new(activities, options),
            events: Arc::new(NoOpEventSink),
            registry: None,
        }
    }

    /// Creates a coordinator from validated configuration.
    pub fn from_config(
        activities: Arc<dyn PaymentActivities>,
        config: &ExpiryConfig,
    ) -> Result<Self, ExpiryflowError> {
        config.validate()?;
        Ok(Self::with_options(activities, config.step.clone()))
    }

    /// Sets the event sink used by the coordinator and its pipeline.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.pipeline = self.pipeline.with_events(events.clone());
        self.events = events;
        self
    }

    /// Registers every started run in `registry`.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<RunRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Returns the registry, if one is attached.
    #[must_use]
    pub fn registry(&self) -> Option<&Arc<RunRegistry>> {
        self.registry.as_ref()
    }

    /// Starts a run and returns immediately.
    ///
    /// The run proceeds on its own task; use the returned handle to query it
    /// or wait for its result. Must be called from within a tokio runtime.
    pub fn start(&self, input: PaymentInput) -> Result<RunHandle, ExpiryflowError> {
        input.validate()?;
        let (writer, query) = RunState::create(input.id.clone());
        if let Some(registry) = &self.registry {
            registry.register(query.clone())?;
        }

        info!(
            payment_id = %input.id,
            amount = input.amount,
            deadline_seconds = input.deadline_seconds,
            "Starting payment workflow"
        );
        self.events.emit(
            events::RUN_STARTED,
            Some(events::event_payload(
                &input.id,
                serde_json::json!({
                    "amount": input.amount,
                    "deadline_seconds": input.deadline_seconds,
                }),
            )),
        );

        let coordinator = self.clone();
        let handle = tokio::spawn(async move { coordinator.race(input, writer).await });
        Ok(RunHandle { query, handle })
    }

    /// Runs a payment to its terminal result.
    ///
    /// Rejections and expirations are `Ok`. A step that fails permanently or
    /// an internal inconsistency is `Err`; the run still records a terminal
    /// result that queries can observe.
    pub async fn run(&self, input: PaymentInput) -> Result<PaymentResult, ExpiryflowError> {
        self.start(input)?.wait().await
    }

    async fn race(
        &self,
        input: PaymentInput,
        writer: StatusWriter,
    ) -> Result<PaymentResult, ExpiryflowError> {
        let deadline = input.deadline();
        // None when the deadline lies beyond the clock's range and can never be reached.
        let expires_at = Instant::now().checked_add(deadline);
        let token = Arc::new(CancellationToken::new());

        let mut timer = DeadlineTimer::start(deadline);
        let mut pipeline = self.pipeline.start(input.clone(), writer, token.clone());

        let first = tokio::select! {
            biased;
            () = timer.fired() => First::Timer,
            run = &mut pipeline => First::Pipeline(run),
        };

        let (timer_won, joined) = match first {
            First::Timer => {
                self.signal_expiry(&input, &token);
                (true, pipeline.await)
            }
            First::Pipeline(run) => {
                // Ready together with the timer counts as expired.
                let timer_won =
                    !timer.cancel() || expires_at.is_some_and(|at| Instant::now() >= at);
                if timer_won {
                    self.signal_expiry(&input, &token);
                }
                (timer_won, run)
            }
        };

        let run = match joined {
            Ok(run) => run,
            Err(err) => {
                error!(payment_id = %input.id, error = %err, "Pipeline task lost its status writer");
                self.emit_finished(&input.id, None);
                return Err(err);
            }
        };

        let PipelineRun { writer, outcome } = run;
        let winner = if timer_won {
            RaceWinner::Timer(outcome)
        } else {
            RaceWinner::Pipeline(outcome)
        };
        let Assembled { result, error } = assemble(&input, winner);
        let recorded = writer.finish(result)?;

        info!(
            payment_id = %recorded.id,
            status = %recorded.status,
            message = %recorded.message,
            "Payment workflow finished"
        );
        self.emit_finished(&recorded.id, Some(&recorded));

        match error {
            Some(err) => Err(err),
            None => Ok(recorded),
        }
    }

    fn signal_expiry(&self, input: &PaymentInput, token: &CancellationToken) {
        token.cancel(format!("expired after {} seconds", input.deadline_seconds));
        warn!(
            payment_id = %input.id,
            deadline_seconds = input.deadline_seconds,
            "Payment workflow expired"
        );
        self.events.emit(
            events::TIMER_FIRED,
            Some(events::event_payload(
                &input.id,
                serde_json::json!({ "deadline_seconds": input.deadline_seconds }),
            )),
        );
    }

    fn emit_finished(&self, payment_id: &str, result: Option<&PaymentResult>) {
        let fields = match result {
            Some(result) => serde_json::json!({
                "status": result.status,
                "message": result.message,
            }),
            None => serde_json::Value::Null,
        };
        self.events.emit(
            events::RUN_FINISHED,
            Some(events::event_payload(payment_id, fields)),
        );
    }
}

impl std::fmt::Debug for RaceCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaceCoordinator")
            .field("pipeline", &self.pipeline)
            .field("registry", &self.registry.is_some())
            .finish_non_exhaustive()
    }
}

/// Handle to a started run.
///
/// Dropping the handle detaches it; the run still reaches a terminal result.
#[derive(Debug)]
pub struct RunHandle {
    query: StatusQuery,
    handle: JoinHandle<Result<PaymentResult, ExpiryflowError>>,
}

impl RunHandle {
    /// The run identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        self.query.id()
    }

    /// A reader for the run's status.
    #[must_use]
    pub fn query(&self) -> &StatusQuery {
        &self.query
    }

    /// Waits for the terminal result.
    pub async fn wait(self) -> Result<PaymentResult, ExpiryflowError> {
        self.handle.await.map_err(|err| {
            ExpiryflowError::InternalInconsistency(format!("run task did not finish: {err}"))
        })?
    }
}
