//! Dead-letter routing
//!
//! Messages that cannot be processed are republished unchanged (same key, same
//! payload) to the dead-letter topic with a `reason` header. Publishing is
//! retried under its own policy; when that is exhausted too the failure is
//! logged and swallowed so the consumer can move on.

use message_bus::{Delivery, EnvelopeProducer, Headers, MessageEnvelope};
use resilience::{Attempt, RetryError, RetryPolicy};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Header carrying the human-readable failure reason
pub const REASON_HEADER: &str = "reason";

/// Reason recorded for payloads that could not be decoded
pub const DESERIALIZATION_FAILED: &str = "Deserialization failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadLetterOutcome {
    Published(Delivery),
    /// Every publish attempt failed; the message is lost
    Failed,
    /// Shutdown interrupted publishing
    Cancelled,
}

pub struct DeadLetterRouter<P> {
    producer: P,
    topic: String,
    policy: RetryPolicy,
    flush_timeout: Duration,
}

impl<P: EnvelopeProducer> DeadLetterRouter<P> {
    pub fn new(
        producer: P,
        topic: impl Into<String>,
        policy: RetryPolicy,
        flush_timeout: Duration,
    ) -> Self {
        Self {
            producer,
            topic: topic.into(),
            policy,
            flush_timeout,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Republish `original` with `reason` attached. Never fails.
    pub async fn route(
        &self,
        original: &MessageEnvelope,
        reason: &str,
        cancel: &CancellationToken,
    ) -> DeadLetterOutcome {
        let envelope = MessageEnvelope {
            key: original.key.clone(),
            value: original.value.clone(),
            headers: Headers::new().with(REASON_HEADER, reason),
        };

        let result = self
            .policy
            .execute(cancel, |_| {
                let envelope = &envelope;
                async move { Attempt::from(self.producer.send(&self.topic, envelope).await) }
            })
            .await;

        match result {
            Ok(delivery) => {
                warn!(
                    key = %envelope.key,
                    topic = %self.topic,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    reason = %reason,
                    "Message sent to dead-letter topic"
                );
                DeadLetterOutcome::Published(delivery)
            }
            Err(RetryError::Cancelled { attempts }) => {
                info!(
                    key = %envelope.key,
                    attempts = attempts,
                    "Dead-letter publish cancelled"
                );
                DeadLetterOutcome::Cancelled
            }
            Err(err) => {
                error!(
                    key = %envelope.key,
                    topic = %self.topic,
                    reason = %reason,
                    error = %err,
                    "Failed to send message to dead-letter topic, message dropped"
                );
                DeadLetterOutcome::Failed
            }
        }
    }

    /// Drain buffered dead-letter sends, waiting at most the flush timeout
    pub async fn flush(&self) {
        if let Err(err) = self.producer.flush(self.flush_timeout).await {
            warn!(
                topic = %self.topic,
                timeout = ?self.flush_timeout,
                error = %err,
                "Dead-letter flush timed out, buffered messages may be lost"
            );
        }
    }
}
