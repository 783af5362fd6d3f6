use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventValidationError {
    #[error("Product name must not be blank")]
    BlankName,

    #[error("Product price must not be negative, got {0}")]
    NegativePrice(Decimal),
}

/// Failure to turn raw message bytes into a valid event
#[derive(Debug, Error)]
pub enum EventDecodeError {
    #[error("Malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid event: {0}")]
    Invalid(#[from] EventValidationError),
}
