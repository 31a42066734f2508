//! Run state with a single writer and any number of non-blocking readers.
//!
//! [`RunState::create`] hands out exactly one [`StatusWriter`] and a clonable
//! [`StatusQuery`]. The writer is not `Clone`; whoever owns it is the only
//! party able to change the run's status. Readers load an atomic and never
//! wait on the writer.
//!
//! The terminal result is stored before the terminal status is published, so
//! a reader that observes a terminal status always finds the result.

use crate::core::{PaymentResult, PaymentStatus};
use crate::errors::ExpiryflowError;
use crate::utils::{now_utc, Timestamp};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error};

/// Message recorded when a writer is dropped before the run terminated.
pub const UNRESOLVED_MESSAGE: &str = "Workflow completed unexpectedly";

/// Shared state of one payment run.
#[derive(Debug)]
pub struct RunState {
    id: String,
    started_at: Timestamp,
    status: AtomicU8,
    result: OnceLock<PaymentResult>,
}

impl RunState {
    /// Creates the state for a run and returns its writer and a reader.
    #[must_use]
    pub fn create(id: impl Into<String>) -> (StatusWriter, StatusQuery) {
        let state = Arc::new(Self {
            id: id.into(),
            started_at: now_utc(),
            status: AtomicU8::new(PaymentStatus::Pending.as_u8()),
            result: OnceLock::new(),
        });
        (
            StatusWriter {
                state: state.clone(),
            },
            StatusQuery { state },
        )
    }

    fn load_status(&self) -> PaymentStatus {
        PaymentStatus::from_u8(self.status.load(Ordering::Acquire))
    }
}

/// A consistent point-in-time view of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSnapshot {
    /// The run identifier.
    pub id: String,
    /// When the run state was created.
    pub started_at: Timestamp,
    /// Latest committed status.
    pub status: PaymentStatus,
    /// True if and only if the status is `Expired`.
    pub expired: bool,
    /// The terminal result, present once the status is terminal.
    pub result: Option<PaymentResult>,
}

/// The only handle allowed to change a run's status.
#[derive(Debug)]
pub struct StatusWriter {
    state: Arc<RunState>,
}

impl StatusWriter {
    /// The run identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.state.id
    }

    /// The status currently recorded.
    #[must_use]
    pub fn status(&self) -> PaymentStatus {
        self.state.load_status()
    }

    /// Records progress along the happy path.
    ///
    /// Writing the current status again is a no-op. Terminal statuses must be
    /// recorded with [`StatusWriter::finish`].
    pub fn advance(&mut self, next: PaymentStatus) -> Result<(), ExpiryflowError> {
        let current = self.status();
        if current.is_terminal() {
            return Err(ExpiryflowError::AlreadyTerminal(current));
        }
        if current == next {
            return Ok(());
        }
        if next.is_terminal() || !current.can_transition_to(next) {
            return Err(ExpiryflowError::InvalidTransition { from: current, to: next });
        }
        self.state.status.store(next.as_u8(), Ordering::Release);
        debug!(payment_id = %self.state.id, from = %current, to = %next, "Status advanced");
        Ok(())
    }

    /// Records the terminal result and releases the writer.
    ///
    /// The result's id is replaced by the run's id. On error the writer is
    /// still consumed and the run is closed as unresolved.
    pub fn finish(self, mut result: PaymentResult) -> Result<PaymentResult, ExpiryflowError> {
        let current = self.status();
        if current.is_terminal() {
            return Err(ExpiryflowError::AlreadyTerminal(current));
        }
        if !result.status.is_terminal() || !current.can_transition_to(result.status) {
            return Err(ExpiryflowError::InvalidTransition {
                from: current,
                to: result.status,
            });
        }
        result.id.clone_from(&self.state.id);
        self.commit(result.clone())?;
        Ok(result)
    }

    fn commit(&self, result: PaymentResult) -> Result<(), ExpiryflowError> {
        let status = result.status;
        self.state
            .result
            .set(result)
            .map_err(|_| ExpiryflowError::AlreadyTerminal(self.status()))?;
        self.state.status.store(status.as_u8(), Ordering::Release);
        debug!(payment_id = %self.state.id, status = %status, "Terminal status recorded");
        Ok(())
    }
}

impl Drop for StatusWriter {
    fn drop(&mut self) {
        let current = self.status();
        if current.is_terminal() {
            return;
        }
        error!(
            payment_id = %self.state.id,
            status = %current,
            "Run writer released without a terminal result"
        );
        let result = PaymentResult::new(
            self.state.id.clone(),
            PaymentStatus::Unresolved,
            UNRESOLVED_MESSAGE,
        );
        let _ = self.commit(result);
    }
}

/// Read-only view of a run, callable at any time during or after it.
#[derive(Debug, Clone)]
pub struct StatusQuery {
    state: Arc<RunState>,
}

impl StatusQuery {
    /// The run identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.state.id
    }

    /// When the run state was created.
    #[must_use]
    pub fn started_at(&self) -> Timestamp {
        self.state.started_at
    }

    /// Latest committed status.
    #[must_use]
    pub fn get_status(&self) -> PaymentStatus {
        self.state.load_status()
    }

    /// Returns true if the run expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.get_status() == PaymentStatus::Expired
    }

    /// Returns true once a terminal result is recorded.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.get_status().is_terminal()
    }

    /// The terminal result, if recorded.
    #[must_use]
    pub fn result(&self) -> Option<PaymentResult> {
        if self.is_terminal() {
            self.state.result.get().cloned()
        } else {
            None
        }
    }

    /// A consistent snapshot of status, expiry flag and result.
    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        let status = self.get_status();
        let result = if status.is_terminal() {
            self.state.result.get().cloned()
        } else {
            None
        };
        RunSnapshot {
            id: self.state.id.clone(),
            started_at: self.state.started_at,
            status,
            expired: status == PaymentStatus::Expired,
            result,
        }
    }
}
