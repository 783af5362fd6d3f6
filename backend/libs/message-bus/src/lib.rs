//! # Message Bus
//!
//! Broker seams for services that exchange keyed, header-carrying messages.
//!
//! ## Components
//!
//! - [`MessageEnvelope`]: key, payload bytes and ordered [`Headers`]
//! - [`EnvelopeProducer`] / [`EnvelopeConsumer`]: async traits the services are written against
//! - [`KafkaEnvelopeProducer`] / [`KafkaEnvelopeConsumer`]: rdkafka adapters
//! - [`InMemoryBroker`]: partitioned in-process broker with per-group committed offsets
//!
//! ## Consumer contract
//!
//! Offsets are never committed automatically. A consumer reads one message at a
//! time and calls [`EnvelopeConsumer::commit`] once it has reached a terminal
//! outcome for it. Anything not committed is redelivered to the next member of
//! the group.
//!
//! ## Example
//!
//! ```rust,no_run
//! use message_bus::{EnvelopeProducer, KafkaEnvelopeProducer, MessageEnvelope, ProducerSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let producer = KafkaEnvelopeProducer::new(&ProducerSettings::new("localhost:9092"))?;
//!
//!     let envelope = MessageEnvelope::new("42", br#"{"productId":42}"#.to_vec());
//!     producer.send("catalog.product.updated", &envelope).await?;
//!
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use std::time::Duration;

mod envelope;
pub mod env_utils;
mod error;
pub mod kafka;
pub mod memory;

pub use envelope::{Delivery, Headers, MessageEnvelope, Polled, ReceivedMessage};
pub use env_utils::EnvError;
pub use error::{BusError, BusResult};
pub use kafka::{ConsumerSettings, KafkaEnvelopeConsumer, KafkaEnvelopeProducer, ProducerSettings};
pub use memory::{CommittedOffset, InMemoryBroker, InMemoryConsumer, InMemoryProducer};

/// Sends envelopes to a topic.
///
/// Implementations perform their own client-level retries; an `Err` from
/// [`send`](EnvelopeProducer::send) means the record was not delivered.
#[async_trait]
pub trait EnvelopeProducer: Send + Sync {
    async fn send(&self, topic: &str, envelope: &MessageEnvelope) -> BusResult<Delivery>;

    /// Block until buffered records are delivered or `timeout` expires
    async fn flush(&self, timeout: Duration) -> BusResult<()>;
}

/// Pulls envelopes for a single subscription with manual offset commits.
#[async_trait]
pub trait EnvelopeConsumer: Send + Sync {
    async fn poll(&mut self) -> BusResult<Polled>;

    /// Commit `message.offset + 1` for the message's partition
    async fn commit(&self, message: &ReceivedMessage) -> BusResult<()>;

    /// Leave the subscription; later commits fail with [`BusError::Closed`]
    async fn close(&mut self) -> BusResult<()>;
}
