//! Samples a run's status from a separate task.

use crate::core::PaymentStatus;
use crate::tracker::StatusQuery;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Polls a [`StatusQuery`] at a fixed interval until the run is terminal.
#[derive(Debug)]
pub struct StatusRecorder {
    handle: JoinHandle<Vec<PaymentStatus>>,
}

impl StatusRecorder {
    /// Starts sampling `query` every `interval`.
    #[must_use]
    pub fn spawn(query: StatusQuery, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut samples = Vec::new();
            loop {
                let status = query.get_status();
                samples.push(status);
                if status.is_terminal() {
                    return samples;
                }
                tokio::time::sleep(interval).await;
            }
        });
        Self { handle }
    }

    /// Waits for the run to terminate and returns every sample taken.
    pub async fn finish(self) -> Vec<PaymentStatus> {
        self.handle.await.unwrap_or_default()
    }
}
