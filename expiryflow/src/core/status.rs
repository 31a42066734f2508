//! Payment run status and its transition table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The observable status of a payment run.
///
/// The happy path moves linearly from `Pending` to `Completed`. A run can be
/// diverted to `Cancelled` by a business rejection, to `Expired` when the
/// deadline wins the race, or to one of the fallback statuses `Failed` and
/// `Unresolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Run created, no step started yet.
    Pending,
    /// The validation step is in flight.
    Validating,
    /// The fraud check step is in flight.
    FraudCheck,
    /// The accept step is in flight.
    Accepted,
    /// The customer notification step is in flight.
    Notified,
    /// Every step succeeded.
    Completed,
    /// A business rule rejected the payment.
    Cancelled,
    /// The deadline elapsed before the pipeline finished.
    Expired,
    /// A step failed with a non-retryable error or exhausted its attempts.
    Failed,
    /// Neither path produced a terminal outcome.
    Unresolved,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Validating => write!(f, "VALIDATING"),
            Self::FraudCheck => write!(f, "FRAUD_CHECK"),
            Self::Accepted => write!(f, "ACCEPTED"),
            Self::Notified => write!(f, "NOTIFIED"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Unresolved => write!(f, "UNRESOLVED"),
        }
    }
}

impl PaymentStatus {
    const ALL: [Self; 10] = [
        Self::Pending,
        Self::Validating,
        Self::FraudCheck,
        Self::Accepted,
        Self::Notified,
        Self::Completed,
        Self::Cancelled,
        Self::Expired,
        Self::Failed,
        Self::Unresolved,
    ];

    /// Returns true if no further writes are permitted once recorded.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Cancelled | Self::Expired | Self::Failed | Self::Unresolved
        )
    }

    /// Returns true for statuses on the linear happy path.
    #[must_use]
    pub fn is_progress(&self) -> bool {
        self.progress_rank().is_some()
    }

    /// Position on the happy path, `None` for diverted statuses.
    #[must_use]
    pub fn progress_rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Validating => Some(1),
            Self::FraudCheck => Some(2),
            Self::Accepted => Some(3),
            Self::Notified => Some(4),
            Self::Completed => Some(5),
            _ => None,
        }
    }

    /// Returns true if `next` may be recorded after `self`.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Cancelled => matches!(self, Self::Validating | Self::FraudCheck),
            Self::Expired | Self::Failed | Self::Unresolved => true,
            _ => match (self.progress_rank(), next.progress_rank()) {
                (Some(current), Some(target)) => target == current + 1,
                _ => false,
            },
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .unwrap_or(Self::Unresolved)
    }
}
