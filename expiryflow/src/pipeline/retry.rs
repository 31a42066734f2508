//! Retry policy with a capped backoff curve and optional jitter.
//!
//! The default policy retries transient failures forever with the backoff
//! interval capped at five seconds. That is only safe because every step runs
//! inside a deadline race: the deadline bounds retries in wall-clock time,
//! the attempt count does not.

use crate::errors::{ExpiryflowError, StepError};
use crate::utils::duration_millis;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Jitter strategy to prevent thundering herd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter, delays follow the curve exactly.
    #[default]
    None,
    /// Random from 0 to delay.
    Full,
    /// Half fixed, half random.
    Equal,
    /// min(max, random(initial, prev * 3))
    Decorrelated,
}

/// Backoff and attempt limits applied to every step invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    #[serde(with = "duration_millis", default = "default_initial_interval")]
    pub initial_interval: Duration,
    /// Growth factor between consecutive delays.
    #[serde(default = "default_backoff_coefficient")]
    pub backoff_coefficient: f64,
    /// Upper bound on any single delay.
    #[serde(with = "duration_millis", default = "default_max_backoff_interval")]
    pub max_backoff_interval: Duration,
    /// Maximum calls including the first. `None` retries until cancelled.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Jitter strategy.
    #[serde(default)]
    pub jitter: JitterStrategy,
}

fn default_initial_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_backoff_coefficient() -> f64 {
    2.0
}

fn default_max_backoff_interval() -> Duration {
    Duration::from_secs(5)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: default_initial_interval(),
            backoff_coefficient: default_backoff_coefficient(),
            max_backoff_interval: default_max_backoff_interval(),
            max_attempts: None,
            jitter: JitterStrategy::None,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the default unbounded curve.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that makes a single call and never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::default().with_max_attempts(1)
    }

    /// Sets the initial interval.
    #[must_use]
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Sets the backoff coefficient.
    #[must_use]
    pub fn with_backoff_coefficient(mut self, coefficient: f64) -> Self {
        self.backoff_coefficient = coefficient;
        self
    }

    /// Sets the maximum backoff interval.
    #[must_use]
    pub fn with_max_backoff_interval(mut self, interval: Duration) -> Self {
        self.max_backoff_interval = interval;
        self
    }

    /// Bounds the number of calls.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Removes the attempt bound.
    #[must_use]
    pub fn unbounded(mut self) -> Self {
        self.max_attempts = None;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter = strategy;
        self
    }

    /// Checks that the curve is well formed.
    pub fn validate(&self) -> Result<(), ExpiryflowError> {
        if !self.backoff_coefficient.is_finite() || self.backoff_coefficient < 1.0 {
            return Err(ExpiryflowError::Config(format!(
                "backoff_coefficient must be >= 1.0, got {}",
                self.backoff_coefficient
            )));
        }
        if self.max_backoff_interval < self.initial_interval {
            return Err(ExpiryflowError::Config(
                "max_backoff_interval must not be shorter than initial_interval".to_string(),
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(ExpiryflowError::Config(
                "max_attempts must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns true if `attempts` calls have used up the budget.
    #[must_use]
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }

    /// The delay before retry number `retry` (1-based) without jitter.
    #[must_use]
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        let capped = secs.min(self.max_backoff_interval.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_backoff_interval)
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// No more attempts remain.
    GiveUp,
    /// The error is not retryable.
    NotRetryable,
}

/// Per-step retry bookkeeping.
#[derive(Debug, Default)]
pub struct RetryState {
    /// Calls made so far.
    pub attempts: u32,
    previous_delay: Option<Duration>,
}

impl RetryState {
    /// Creates a new retry state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a call is about to be made.
    pub fn record_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    /// Decides what to do after a failed call.
    pub fn decide(&mut self, policy: &RetryPolicy, error: &StepError) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::NotRetryable;
        }
        if policy.is_exhausted(self.attempts) {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry(self.next_delay(policy))
    }

    /// Calculates the delay before the next retry.
    fn next_delay(&mut self, policy: &RetryPolicy) -> Duration {
        let delay = policy.base_delay(self.attempts);
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);

        let jittered = match policy.jitter {
            JitterStrategy::None => millis,
            JitterStrategy::Full => {
                if millis == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=millis)
                }
            }
            JitterStrategy::Equal => {
                let half = millis / 2;
                if half == 0 {
                    millis
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
            JitterStrategy::Decorrelated => {
                let base = u64::try_from(policy.initial_interval.as_millis()).unwrap_or(u64::MAX);
                let max = u64::try_from(policy.max_backoff_interval.as_millis()).unwrap_or(u64::MAX);
                let prev = self
                    .previous_delay
                    .map_or(base, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
                let upper = prev.saturating_mul(3).min(max);
                if upper <= base {
                    base
                } else {
                    rand::thread_rng().gen_range(base..=upper)
                }
            }
        };

        let delay = Duration::from_millis(jittered);
        self.previous_delay = Some(delay);
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_unbounded_with_five_second_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, None);
        assert_eq!(policy.max_backoff_interval, Duration::from_secs(5));
        assert_eq!(policy.jitter, JitterStrategy::None);
        assert!(!policy.is_exhausted(u32::MAX));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_policy_builder() {
        let policy = RetryPolicy::new()
            .with_initial_interval(Duration::from_millis(100))
            .with_backoff_coefficient(3.0)
            .with_max_backoff_interval(Duration::from_secs(2))
            .with_max_attempts(4)
            .with_jitter(JitterStrategy::Equal);

        assert_eq!(policy.initial_interval, Duration::from_millis(100));
        assert_eq!(policy.max_attempts, Some(4));
        assert!(policy.is_exhausted(4));
        assert!(!policy.is_exhausted(3));
        assert_eq!(policy.unbounded().max_attempts, None);
    }

    #[test]
    fn test_base_delay_curve_capped() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = (1..=5).map(|n| policy.base_delay(n)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(5),
                Duration::from_secs(5),
            ]
        );
        assert_eq!(policy.base_delay(10_000), Duration::from_secs(5));
    }

    #[test]
    fn test_validate_rejects_bad_curves() {
        assert!(RetryPolicy::new().with_backoff_coefficient(0.5).validate().is_err());
        assert!(RetryPolicy::new()
            .with_backoff_coefficient(f64::NAN)
            .validate()
            .is_err());
        assert!(RetryPolicy::new()
            .with_initial_interval(Duration::from_secs(10))
            .validate()
            .is_err());
        assert!(RetryPolicy::new().with_max_attempts(0).validate().is_err());
    }

    #[test]
    fn test_decide_non_retryable() {
        let mut state = RetryState::new();
        state.record_attempt();
        let decision = state.decide(&RetryPolicy::default(), &StepError::non_retryable("nope"));
        assert_eq!(decision, RetryDecision::NotRetryable);
    }

    #[test]
    fn test_decide_gives_up_when_exhausted() {
        let policy = RetryPolicy::new().with_max_attempts(2);
        let mut state = RetryState::new();
        let error = StepError::transient("busy");

        state.record_attempt();
        assert_eq!(state.decide(&policy, &error), RetryDecision::Retry(Duration::from_secs(1)));
        state.record_attempt();
        assert_eq!(state.decide(&policy, &error), RetryDecision::GiveUp);
    }

    #[test]
    fn test_full_jitter_within_curve() {
        let policy = RetryPolicy::new().with_jitter(JitterStrategy::Full);
        let mut state = RetryState::new();
        state.record_attempt();
        for _ in 0..20 {
            match state.decide(&policy, &StepError::transient("busy")) {
                RetryDecision::Retry(delay) => assert!(delay <= Duration::from_secs(1)),
                other => panic!("unexpected decision: {other:?}"),
            }
        }
    }

    #[test]
    fn test_decorrelated_jitter_within_bounds() {
        let policy = RetryPolicy::new().with_jitter(JitterStrategy::Decorrelated);
        let mut state = RetryState::new();
        for _ in 0..20 {
            state.record_attempt();
            match state.decide(&policy, &StepError::transient("busy")) {
                RetryDecision::Retry(delay) => {
                    assert!(delay >= Duration::from_secs(1));
                    assert!(delay <= Duration::from_secs(5));
                }
                other => panic!("unexpected decision: {other:?}"),
            }
        }
    }

    #[test]
    fn test_policy_serde_defaults() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"max_backoff_interval": 2000, "max_attempts": 3}"#).unwrap();
        assert_eq!(policy.max_backoff_interval, Duration::from_secs(2));
        assert_eq!(policy.initial_interval, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, Some(3));
    }
}
