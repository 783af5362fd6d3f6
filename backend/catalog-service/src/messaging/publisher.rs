//! Product update publisher
//!
//! Sends a `ProductUpdatedEvent` to the update topic keyed by product id, so
//! every update for one product lands on the same partition and is consumed in
//! order. Transient send failures are retried by the idempotent producer
//! itself; whatever still fails is returned to the caller.

use crate::config::KafkaConfig;
use crate::error::PublishError;
use event_schema::ProductUpdatedEvent;
use message_bus::{BusResult, EnvelopeProducer, KafkaEnvelopeProducer, MessageEnvelope};
use std::time::Duration;
use tracing::{error, info, warn};

pub struct ProductUpdatePublisher<P> {
    producer: P,
    topic: String,
    flush_timeout: Duration,
}

impl ProductUpdatePublisher<KafkaEnvelopeProducer> {
    /// Idempotent Kafka publisher for the configured update topic
    pub fn from_config(config: &KafkaConfig) -> BusResult<Self> {
        let producer = KafkaEnvelopeProducer::new(&config.producer_settings())?;
        Ok(Self::new(
            producer,
            config.product_update_topic.clone(),
            config.flush_timeout(),
        ))
    }
}

impl<P: EnvelopeProducer> ProductUpdatePublisher<P> {
    pub fn new(producer: P, topic: impl Into<String>, flush_timeout: Duration) -> Self {
        Self {
            producer,
            topic: topic.into(),
            flush_timeout,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn publish(&self, event: &ProductUpdatedEvent) -> Result<(), PublishError> {
        let payload = event.encode()?;
        let envelope = MessageEnvelope::new(event.partition_key(), payload);

        let delivery = self
            .producer
            .send(&self.topic, &envelope)
            .await
            .map_err(|err| {
                error!(
                    product_id = event.product_id(),
                    topic = %self.topic,
                    error = %err,
                    "Failed to publish product update"
                );
                PublishError::Send(err)
            })?;

        info!(
            product_id = event.product_id(),
            topic = %self.topic,
            partition = delivery.partition,
            offset = delivery.offset,
            "Product update published"
        );
        Ok(())
    }

    /// Drain buffered sends, waiting at most the configured flush timeout
    pub async fn shutdown(&self) {
        match self.producer.flush(self.flush_timeout).await {
            Ok(()) => info!(topic = %self.topic, "Product update publisher flushed"),
            Err(err) => warn!(
                topic = %self.topic,
                timeout = ?self.flush_timeout,
                error = %err,
                "Flush timed out, buffered product updates may be lost"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use message_bus::{BusError, InMemoryBroker};
    use rust_decimal::Decimal;
    use tokio_test::{assert_err, assert_ok};

    const TOPIC: &str = "catalog.product.updated";

    fn widget() -> ProductUpdatedEvent {
        ProductUpdatedEvent::new(42, "Widget", Decimal::new(999, 2), None).unwrap()
    }

    #[tokio::test]
    async fn test_publish_keys_by_product_id() {
        let broker = InMemoryBroker::default();
        let publisher = ProductUpdatePublisher::new(broker.producer(), TOPIC, Duration::from_secs(10));

        assert_ok!(publisher.publish(&widget()).await);

        let records = broker.records(TOPIC);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].envelope.key, "42");
        assert_eq!(records[0].partition, broker.partition_for("42"));
        assert_eq!(
            ProductUpdatedEvent::decode(&records[0].envelope.value).unwrap(),
            widget()
        );
    }

    #[tokio::test]
    async fn test_send_failure_surfaces() {
        let broker = InMemoryBroker::default();
        broker.fail_sends(TOPIC, 1);
        let publisher = ProductUpdatePublisher::new(broker.producer(), TOPIC, Duration::from_secs(10));

        let err = assert_err!(publisher.publish(&widget()).await);

        assert!(matches!(err, PublishError::Send(BusError::Send { .. })));
        assert!(broker.records(TOPIC).is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_flushes_producer() {
        let broker = InMemoryBroker::default();
        let publisher = ProductUpdatePublisher::new(broker.producer(), TOPIC, Duration::from_secs(10));

        publisher.shutdown().await;

        assert_eq!(broker.flush_count(), 1);
    }

    #[test]
    fn test_from_config_targets_configured_topic() {
        let config = KafkaConfig {
            brokers: "localhost:9092".to_string(),
            product_update_topic: "products".to_string(),
            message_send_max_retries: 3,
            retry_backoff_ms: 100,
            producer_flush_timeout_secs: 5,
        };

        let publisher = assert_ok!(ProductUpdatePublisher::from_config(&config));

        assert_eq!(publisher.topic(), "products");
        assert_eq!(publisher.flush_timeout, Duration::from_secs(5));
    }
}
