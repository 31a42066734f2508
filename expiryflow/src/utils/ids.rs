//! Identifier generation.

use uuid::Uuid;

/// Generates a new UUID v4.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Generates a payment id of the form `PAY-xxxxxxxx`.
///
/// The suffix is the first eight hex characters of a fresh UUID v4.
#[must_use]
pub fn generate_payment_id() -> String {
    let simple = generate_uuid().simple().to_string();
    format!("PAY-{}", &simple[..8])
}
