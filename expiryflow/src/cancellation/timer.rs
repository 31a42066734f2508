//! One-shot, cancellable deadline timer.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const ARMED: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// A countdown that fires exactly once unless cancelled first.
///
/// The timer is a single scheduled sleep on its own task. Firing and
/// cancelling both claim the timer through one compare-and-swap, so after
/// [`DeadlineTimer::cancel`] succeeds the timer is permanently inert.
pub struct DeadlineTimer {
    duration: Duration,
    state: Arc<AtomicU8>,
    fired_rx: Option<oneshot::Receiver<()>>,
    handle: JoinHandle<()>,
}

impl DeadlineTimer {
    /// Arms a timer that fires after `duration`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(duration: Duration) -> Self {
        let state = Arc::new(AtomicU8::new(ARMED));
        let (fired_tx, fired_rx) = oneshot::channel();

        let task_state = state.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if task_state
                .compare_exchange(ARMED, FIRED, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                info!(duration_secs = duration.as_secs_f64(), "Deadline timer fired");
                let _ = fired_tx.send(());
            }
        });

        debug!(duration_secs = duration.as_secs_f64(), "Deadline timer armed");

        Self {
            duration,
            state,
            fired_rx: Some(fired_rx),
            handle,
        }
    }

    /// Returns the configured duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Returns true once the timer has fired.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.state.load(Ordering::SeqCst) == FIRED
    }

    /// Returns true if the timer was cancelled before firing.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::SeqCst) == CANCELLED
    }

    /// Cancels the timer.
    ///
    /// Returns true if this call prevented the timer from firing. Cancelling a
    /// timer that already fired, or was already cancelled, is a no-op.
    pub fn cancel(&self) -> bool {
        let prevented = self
            .state
            .compare_exchange(ARMED, CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if prevented {
            self.handle.abort();
            debug!("Deadline timer cancelled");
        }
        prevented
    }

    /// Completes when the timer fires.
    ///
    /// Never completes for a cancelled timer. After it has completed once,
    /// further calls complete immediately.
    pub async fn fired(&mut self) {
        if let Some(rx) = self.fired_rx.as_mut() {
            if rx.await.is_ok() {
                self.fired_rx = None;
                return;
            }
            // Sender dropped without firing: the timer was cancelled.
            std::future::pending::<()>().await;
        }
        if !self.is_fired() {
            std::future::pending::<()>().await;
        }
    }
}

impl Drop for DeadlineTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl std::fmt::Debug for DeadlineTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeadlineTimer")
            .field("duration", &self.duration)
            .field("fired", &self.is_fired())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
