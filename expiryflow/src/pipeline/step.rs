//! Execution of a single step: per-call timeout, retries and cancellation.

use super::retry::{RetryDecision, RetryPolicy, RetryState};
use crate::cancellation::CancellationToken;
use crate::core::{CancelPoint, StepFailure, StepName, StepOutcome};
use crate::errors::{ExpiryflowError, StepError};
use crate::events::{self, EventSink};
use crate::utils::duration_millis;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Options applied to every step call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOptions {
    /// Upper bound on a single call. Exceeding it counts as a transient failure.
    #[serde(with = "duration_millis", default = "default_start_to_close")]
    pub start_to_close: Duration,
    /// Whether an outstanding call is aborted when cancellation arrives.
    ///
    /// When false the call runs to completion and cancellation is observed
    /// right after it returns.
    #[serde(default = "default_interruptible")]
    pub interruptible: bool,
    /// Retry policy for transient failures.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_start_to_close() -> Duration {
    Duration::from_secs(30)
}

fn default_interruptible() -> bool {
    true
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            start_to_close: default_start_to_close(),
            interruptible: default_interruptible(),
            retry: RetryPolicy::default(),
        }
    }
}

impl StepOptions {
    /// Creates options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub fn with_start_to_close(mut self, timeout: Duration) -> Self {
        self.start_to_close = timeout;
        self
    }

    /// Sets whether outstanding calls can be interrupted.
    #[must_use]
    pub fn with_interruptible(mut self, interruptible: bool) -> Self {
        self.interruptible = interruptible;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Checks the options.
    pub fn validate(&self) -> Result<(), ExpiryflowError> {
        if self.start_to_close.is_zero() {
            return Err(ExpiryflowError::Config(
                "start_to_close must be positive".to_string(),
            ));
        }
        self.retry.validate()
    }
}

/// Runs steps for one payment under a shared cancellation token.
///
/// Cancellation is observed at three points: before each call is issued,
/// while a call or a backoff sleep is outstanding (interruptible calls only),
/// and after a call returns successfully.
pub struct StepRunner<'a> {
    payment_id: &'a str,
    options: &'a StepOptions,
    token: &'a CancellationToken,
    events: &'a dyn EventSink,
}

impl<'a> StepRunner<'a> {
    /// Creates a runner.
    #[must_use]
    pub fn new(
        payment_id: &'a str,
        options: &'a StepOptions,
        token: &'a CancellationToken,
        events: &'a dyn EventSink,
    ) -> Self {
        Self {
            payment_id,
            options,
            token,
            events,
        }
    }

    /// Invokes `call` until it succeeds, fails permanently, or is cancelled.
    pub async fn run<T, F, Fut>(&self, step: StepName, mut call: F) -> StepOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StepError>>,
    {
        let mut state = RetryState::new();

        loop {
            if self.token.is_cancelled() {
                let point = if state.attempts == 0 {
                    CancelPoint::BeforeStep(step)
                } else {
                    CancelPoint::DuringStep(step)
                };
                return StepOutcome::Cancelled(point);
            }

            state.record_attempt();
            let started = Instant::now();
            let attempt = tokio::time::timeout(self.options.start_to_close, call());

            let result = if self.options.interruptible {
                tokio::select! {
                    biased;
                    () = self.token.cancelled() => {
                        debug!(payment_id = %self.payment_id, step = %step, "Outstanding call interrupted");
                        return StepOutcome::Cancelled(CancelPoint::DuringStep(step));
                    }
                    result = attempt => result,
                }
            } else {
                attempt.await
            };

            let err = match result {
                Ok(Ok(value)) => {
                    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
                    debug!(
                        payment_id = %self.payment_id,
                        step = %step,
                        attempt = state.attempts,
                        duration_ms,
                        "Step call succeeded"
                    );
                    self.events.emit(
                        events::STEP_COMPLETED,
                        Some(events::event_payload(
                            self.payment_id,
                            serde_json::json!({
                                "step": step,
                                "attempts": state.attempts,
                                "duration_ms": duration_ms,
                            }),
                        )),
                    );
                    // Completed remote effects stand even if cancellation arrived meanwhile.
                    if self.token.is_cancelled() {
                        return StepOutcome::Cancelled(CancelPoint::AfterStep(step));
                    }
                    return StepOutcome::Success(value);
                }
                Ok(Err(err)) => err,
                Err(_elapsed) => StepError::transient(format!(
                    "{step} timed out after {}ms",
                    self.options.start_to_close.as_millis()
                )),
            };

            match state.decide(&self.options.retry, &err) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        payment_id = %self.payment_id,
                        step = %step,
                        attempt = state.attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Retrying step after transient failure"
                    );
                    self.events.emit(
                        events::STEP_RETRY,
                        Some(events::event_payload(
                            self.payment_id,
                            serde_json::json!({
                                "step": step,
                                "attempt": state.attempts,
                                "delay_ms": u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                                "error": err.message(),
                            }),
                        )),
                    );
                    tokio::select! {
                        biased;
                        () = self.token.cancelled() => {
                            return StepOutcome::Cancelled(CancelPoint::DuringStep(step));
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::GiveUp | RetryDecision::NotRetryable => {
                    error!(
                        payment_id = %self.payment_id,
                        step = %step,
                        attempts = state.attempts,
                        error = %err,
                        "Step failed permanently"
                    );
                    return StepOutcome::Failed(StepFailure {
                        step,
                        attempts: state.attempts,
                        error: err,
                    });
                }
            }
        }
    }
}

impl std::fmt::Debug for StepRunner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRunner")
            .field("payment_id", &self.payment_id)
            .field("options", &self.options)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}
