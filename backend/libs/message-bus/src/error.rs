//! Error types for the message bus.

use thiserror::Error;

/// Result type alias for broker operations.
pub type BusResult<T> = Result<T, BusError>;

/// Errors that can occur while talking to the broker.
#[derive(Error, Debug)]
pub enum BusError {
    /// Client-level Kafka error (configuration, poll, commit)
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// A record could not be delivered after the client's own retries
    #[error("Send to {topic} failed: {reason}")]
    Send { topic: String, reason: String },

    /// Buffered records were still in flight when the flush timeout expired
    #[error("Flush failed: {0}")]
    Flush(String),

    /// The consumer has been closed
    #[error("Consumer closed")]
    Closed,

    /// Commit rejected by the broker
    #[error("Commit failed: {0}")]
    Commit(String),
}
