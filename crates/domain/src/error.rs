//! Domain validation errors.

use thiserror::Error;

/// Errors raised while validating order input.
///
/// These are synchronous, caller-facing failures; nothing that fails
/// validation is ever enqueued.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// Order quantity must be at least 1.
    #[error("Invalid quantity: {got} (must be at least 1)")]
    InvalidQuantity { got: u32 },

    /// Purchase price must not be negative.
    #[error("Invalid price: {cents} cents (must not be negative)")]
    NegativePrice { cents: i64 },
}
