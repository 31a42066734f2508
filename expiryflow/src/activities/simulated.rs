//! A collaborator that simulates remote payment services with fixed latency.

use crate::errors::StepError;
use crate::pipeline::PaymentActivities;
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

/// Amounts at or above this value fail validation.
pub const MAX_VALID_AMOUNT: f64 = 10_000.0;

/// Amounts above this value are flagged as fraudulent.
pub const FRAUD_THRESHOLD: f64 = 5_000.0;

/// Simulated payment services.
///
/// Each call sleeps for the configured latency before answering:
/// - validation passes iff `0 < amount < 10000`
/// - fraud is flagged iff `amount > 5000`
/// - acceptance returns `TXN-{id}-{amount in cents}`
#[derive(Debug, Clone)]
pub struct SimulatedPaymentActivities {
    latency: Duration,
}

impl Default for SimulatedPaymentActivities {
    fn default() -> Self {
        Self {
            latency: Duration::from_secs(1),
        }
    }
}

impl SimulatedPaymentActivities {
    /// Creates services with one second of latency per call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the latency of every call.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// The latency of every call.
    #[must_use]
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Validation rule.
    #[must_use]
    pub fn is_valid_amount(amount: f64) -> bool {
        amount > 0.0 && amount < MAX_VALID_AMOUNT
    }

    /// Fraud rule. Returns true when the payment is NOT fraudulent.
    #[must_use]
    pub fn is_clean_amount(amount: f64) -> bool {
        amount <= FRAUD_THRESHOLD
    }

    /// Transaction id issued on acceptance.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn transaction_id(payment_id: &str, amount: f64) -> String {
        let cents = (amount * 100.0) as i64;
        format!("TXN-{payment_id}-{cents}")
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl PaymentActivities for SimulatedPaymentActivities {
    async fn validate(&self, payment_id: &str, amount: f64) -> Result<bool, StepError> {
        info!(payment_id = %payment_id, amount, "Validating payment");
        self.delay().await;
        Ok(Self::is_valid_amount(amount))
    }

    async fn check_fraud(&self, payment_id: &str, amount: f64) -> Result<bool, StepError> {
        info!(payment_id = %payment_id, amount, "Checking payment for fraud");
        self.delay().await;
        Ok(Self::is_clean_amount(amount))
    }

    async fn accept(&self, payment_id: &str, amount: f64) -> Result<String, StepError> {
        info!(payment_id = %payment_id, amount, "Accepting payment");
        self.delay().await;
        Ok(Self::transaction_id(payment_id, amount))
    }

    async fn notify(&self, payment_id: &str, transaction_id: &str) -> Result<(), StepError> {
        info!(
            payment_id = %payment_id,
            transaction_id = %transaction_id,
            "Sending payment notification"
        );
        self.delay().await;
        Ok(())
    }
}
