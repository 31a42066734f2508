//! Reference payment collaborators.

mod simulated;

pub use simulated::{SimulatedPaymentActivities, FRAUD_THRESHOLD, MAX_VALID_AMOUNT};
