//! Scripted collaborator for tests.

use crate::activities::SimulatedPaymentActivities;
use crate::core::StepName;
use crate::errors::StepError;
use crate::pipeline::PaymentActivities;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// A collaborator that follows the simulated business rules but lets tests
/// change latency per step, inject failures and inspect calls.
#[derive(Debug)]
pub struct ScriptedActivities {
    latency: Duration,
    step_latency: Mutex<HashMap<StepName, Duration>>,
    failures: Mutex<HashMap<StepName, VecDeque<StepError>>>,
    calls: Mutex<Vec<StepName>>,
}

impl Default for ScriptedActivities {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedActivities {
    /// Creates a collaborator with one second of latency per call.
    #[must_use]
    pub fn new() -> Self {
        Self {
            latency: Duration::from_secs(1),
            step_latency: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sets the default latency for every step.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Overrides the latency of one step.
    #[must_use]
    pub fn with_step_latency(self, step: StepName, latency: Duration) -> Self {
        self.step_latency.lock().insert(step, latency);
        self
    }

    /// Queues an error returned by the next call to `step`.
    ///
    /// Queued errors are consumed in order; once empty the step follows the
    /// normal rules.
    pub fn fail_next(&self, step: StepName, error: StepError) {
        self.failures
            .lock()
            .entry(step)
            .or_default()
            .push_back(error);
    }

    /// Queues `count` transient failures for `step`.
    pub fn fail_transiently(&self, step: StepName, count: usize) {
        for attempt in 1..=count {
            self.fail_next(step, StepError::transient(format!("{step} unavailable (#{attempt})")));
        }
    }

    /// Steps in the order they were called, one entry per call.
    #[must_use]
    pub fn calls(&self) -> Vec<StepName> {
        self.calls.lock().clone()
    }

    /// Number of calls made to `step`.
    #[must_use]
    pub fn call_count(&self, step: StepName) -> usize {
        self.calls.lock().iter().filter(|called| **called == step).count()
    }

    /// Clears recorded calls and queued failures.
    pub fn reset(&self) {
        self.calls.lock().clear();
        self.failures.lock().clear();
    }

    async fn call(&self, step: StepName) -> Result<(), StepError> {
        self.calls.lock().push(step);
        let latency = self
            .step_latency
            .lock()
            .get(&step)
            .copied()
            .unwrap_or(self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let failure = self
            .failures
            .lock()
            .get_mut(&step)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentActivities for ScriptedActivities {
    async fn validate(&self, _payment_id: &str, amount: f64) -> Result<bool, StepError> {
        self.call(StepName::Validate).await?;
        Ok(SimulatedPaymentActivities::is_valid_amount(amount))
    }

    async fn check_fraud(&self, _payment_id: &str, amount: f64) -> Result<bool, StepError> {
        self.call(StepName::CheckFraud).await?;
        Ok(SimulatedPaymentActivities::is_clean_amount(amount))
    }

    async fn accept(&self, payment_id: &str, amount: f64) -> Result<String, StepError> {
        self.call(StepName::Accept).await?;
        Ok(SimulatedPaymentActivities::transaction_id(payment_id, amount))
    }

    async fn notify(&self, _payment_id: &str, _transaction_id: &str) -> Result<(), StepError> {
        self.call(StepName::Notify).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_failures_consumed_in_order() {
        let activities = ScriptedActivities::new().with_latency(Duration::ZERO);
        activities.fail_next(StepName::Accept, StepError::transient("busy"));
        activities.fail_next(StepName::Accept, StepError::non_retryable("revoked"));

        assert_eq!(
            activities.accept("PAY-1", 1.0).await,
            Err(StepError::transient("busy"))
        );
        assert_eq!(
            activities.accept("PAY-1", 1.0).await,
            Err(StepError::non_retryable("revoked"))
        );
        assert_eq!(activities.accept("PAY-1", 1.0).await.unwrap(), "TXN-PAY-1-100");
        assert_eq!(activities.call_count(StepName::Accept), 3);
        assert_eq!(activities.call_count(StepName::Notify), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_latency_override() {
        let activities =
            ScriptedActivities::new().with_step_latency(StepName::Notify, Duration::from_secs(7));
        let start = tokio::time::Instant::now();

        activities.validate("PAY-1", 1.0).await.unwrap();
        activities.notify("PAY-1", "TXN").await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(8));
        assert_eq!(activities.calls(), vec![StepName::Validate, StepName::Notify]);

        activities.reset();
        assert!(activities.calls().is_empty());
    }
}
