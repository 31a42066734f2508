//! Test assertions for payment results and status sequences.

use crate::core::{PaymentResult, PaymentStatus};
use crate::tracker::StatusQuery;

/// Asserts that the result has the expected status.
pub fn assert_result_status(result: &PaymentResult, expected: PaymentStatus) {
    assert_eq!(
        result.status, expected,
        "Expected status {:?}, got {:?} ({})",
        expected, result.status, result.message
    );
}

/// Asserts that the result message contains `fragment`.
pub fn assert_message_contains(result: &PaymentResult, fragment: &str) {
    assert!(
        result.message.contains(fragment),
        "Expected message to contain '{}', got '{}'",
        fragment,
        result.message
    );
}

/// Asserts that sampled statuses never move backwards along the happy path.
pub fn assert_monotonic(samples: &[PaymentStatus]) {
    let ranks: Vec<u8> = samples.iter().filter_map(PaymentStatus::progress_rank).collect();
    assert!(
        ranks.windows(2).all(|pair| pair[0] <= pair[1]),
        "Status regressed: {samples:?}"
    );
    let terminal: Vec<_> = samples.iter().filter(|s| s.is_terminal()).collect();
    assert!(
        terminal.windows(2).all(|pair| pair[0] == pair[1]),
        "More than one terminal status observed: {samples:?}"
    );
}

/// Asserts that repeated reads of a finished run return identical values.
pub fn assert_stable_terminal(query: &StatusQuery, reads: usize) {
    let first = query.snapshot();
    assert!(first.status.is_terminal(), "Run is not terminal: {:?}", first.status);
    for _ in 0..reads {
        assert_eq!(query.snapshot(), first);
        assert_eq!(query.get_status(), first.status);
        assert_eq!(query.is_expired(), first.expired);
    }
}
