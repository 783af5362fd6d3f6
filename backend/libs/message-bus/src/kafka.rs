//! rdkafka adapters for the bus traits.

use crate::{
    BusError, BusResult, Delivery, EnvelopeConsumer, EnvelopeProducer, Headers, MessageEnvelope,
    Polled, ReceivedMessage,
};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{BorrowedMessage, Header, Headers as _, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::{Offset, TopicPartitionList};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Producer configuration
#[derive(Debug, Clone)]
pub struct ProducerSettings {
    /// Kafka broker addresses (comma-separated)
    pub brokers: String,
    /// Client-level retries for a failed send (`message.send.max.retries`)
    pub message_send_max_retries: u32,
    /// Pause between client-level retries (`retry.backoff.ms`)
    pub retry_backoff: Duration,
    /// How long a send may wait for space in the local queue
    pub queue_timeout: Duration,
}

impl ProducerSettings {
    pub fn new(brokers: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            message_send_max_retries: 3,
            retry_backoff: Duration::from_millis(100),
            queue_timeout: Duration::from_secs(30),
        }
    }

    /// Idempotent producer settings:
    /// - `acks = all`: Waits for all in-sync replicas
    /// - `enable.idempotence = true`: Broker drops duplicates caused by client retries
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set(
                "message.send.max.retries",
                self.message_send_max_retries.to_string(),
            )
            .set("retry.backoff.ms", self.retry_backoff.as_millis().to_string());
        config
    }
}

/// Consumer configuration
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    /// Kafka broker addresses (comma-separated)
    pub brokers: String,
    /// Consumer group ID
    pub group_id: String,
    /// Topic to consume from
    pub topic: String,
}

impl ConsumerSettings {
    pub fn new(
        brokers: impl Into<String>,
        group_id: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            brokers: brokers.into(),
            group_id: group_id.into(),
            topic: topic.into(),
        }
    }

    /// Manual commits, start from the earliest offset when the group has none,
    /// and report partition EOF so an idle consumer can back off.
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "true")
            .set("session.timeout.ms", "30000");
        config
    }
}

/// Offset commits are enqueued with librdkafka and never block the calling task
const COMMIT_MODE: CommitMode = CommitMode::Async;

/// Key to put on the wire; the empty key stands for a keyless record
fn record_key(envelope: &MessageEnvelope) -> Option<&str> {
    if envelope.key.is_empty() {
        None
    } else {
        Some(envelope.key.as_str())
    }
}

/// `EnvelopeProducer` over an idempotent `FutureProducer`
pub struct KafkaEnvelopeProducer {
    producer: FutureProducer,
    queue_timeout: Duration,
}

impl KafkaEnvelopeProducer {
    pub fn new(settings: &ProducerSettings) -> BusResult<Self> {
        let producer: FutureProducer = settings.client_config().create()?;

        info!(
            brokers = %settings.brokers,
            max_retries = settings.message_send_max_retries,
            "Kafka producer created with idempotence enabled"
        );

        Ok(Self {
            producer,
            queue_timeout: settings.queue_timeout,
        })
    }
}

#[async_trait]
impl EnvelopeProducer for KafkaEnvelopeProducer {
    async fn send(&self, topic: &str, envelope: &MessageEnvelope) -> BusResult<Delivery> {
        let mut headers = OwnedHeaders::new_with_capacity(envelope.headers.len());
        for (key, value) in envelope.headers.iter() {
            headers = headers.insert(Header {
                key,
                value: Some(value),
            });
        }

        let mut record = FutureRecord::to(topic)
            .payload(&envelope.value)
            .headers(headers);
        if let Some(key) = record_key(envelope) {
            record = record.key(key);
        }

        match self.producer.send(record, self.queue_timeout).await {
            Ok((partition, offset)) => {
                debug!(
                    topic = %topic,
                    key = %envelope.key,
                    partition = partition,
                    offset = offset,
                    "Record delivered"
                );
                Ok(Delivery { partition, offset })
            }
            Err((err, _)) => Err(BusError::Send {
                topic: topic.to_string(),
                reason: err.to_string(),
            }),
        }
    }

    async fn flush(&self, timeout: Duration) -> BusResult<()> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || {
            producer.flush(timeout).map_err(|err| {
                BusError::Flush(format!(
                    "{} record(s) still in flight: {}",
                    producer.in_flight_count(),
                    err
                ))
            })
        })
        .await
        .map_err(|err| BusError::Flush(err.to_string()))?
    }
}

/// `EnvelopeConsumer` over a `StreamConsumer` subscribed to one topic
pub struct KafkaEnvelopeConsumer {
    consumer: StreamConsumer,
    topic: String,
    closed: bool,
}

impl KafkaEnvelopeConsumer {
    pub fn new(settings: &ConsumerSettings) -> BusResult<Self> {
        let consumer: StreamConsumer = settings.client_config().create()?;
        consumer.subscribe(&[&settings.topic])?;

        info!(
            brokers = %settings.brokers,
            group_id = %settings.group_id,
            topic = %settings.topic,
            "Subscribed to Kafka topic"
        );

        Ok(Self {
            consumer,
            topic: settings.topic.clone(),
            closed: false,
        })
    }
}

#[async_trait]
impl EnvelopeConsumer for KafkaEnvelopeConsumer {
    async fn poll(&mut self) -> BusResult<Polled> {
        if self.closed {
            return Err(BusError::Closed);
        }

        match self.consumer.recv().await {
            Ok(message) => Ok(Polled::Message(to_received(&message))),
            Err(KafkaError::PartitionEOF(partition)) => Ok(Polled::PartitionEof {
                topic: self.topic.clone(),
                partition,
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn commit(&self, message: &ReceivedMessage) -> BusResult<()> {
        if self.closed {
            return Err(BusError::Closed);
        }

        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )?;
        self.consumer.commit(&tpl, COMMIT_MODE)?;
        Ok(())
    }

    async fn close(&mut self) -> BusResult<()> {
        if self.closed {
            return Ok(());
        }
        self.consumer.unsubscribe();
        self.closed = true;
        info!(topic = %self.topic, "Kafka consumer unsubscribed");
        Ok(())
    }
}

fn to_received(message: &BorrowedMessage<'_>) -> ReceivedMessage {
    let mut headers = Headers::new();
    if let Some(kafka_headers) = message.headers() {
        for header in kafka_headers.iter() {
            headers.insert(header.key, header.value.unwrap_or_default());
        }
    }

    let key = match message.key() {
        Some(key) => String::from_utf8_lossy(key).into_owned(),
        None => {
            warn!(
                topic = message.topic(),
                partition = message.partition(),
                offset = message.offset(),
                "Received Kafka message with no key"
            );
            String::new()
        }
    };

    // A null payload (tombstone) arrives as an empty value
    ReceivedMessage {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        envelope: MessageEnvelope {
            key,
            value: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            headers,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producer_settings_defaults() {
        let settings = ProducerSettings::new("localhost:9092");
        assert_eq!(settings.message_send_max_retries, 3);
        assert_eq!(settings.retry_backoff, Duration::from_millis(100));
    }

    #[test]
    fn test_producer_is_idempotent() {
        let mut settings = ProducerSettings::new("localhost:9092");
        settings.message_send_max_retries = 5;
        settings.retry_backoff = Duration::from_millis(250);

        let config = settings.client_config();
        assert_eq!(config.get("acks"), Some("all"));
        assert_eq!(config.get("enable.idempotence"), Some("true"));
        assert_eq!(config.get("message.send.max.retries"), Some("5"));
        assert_eq!(config.get("retry.backoff.ms"), Some("250"));
    }

    #[test]
    fn test_consumer_commits_manually() {
        let settings = ConsumerSettings::new("localhost:9092", "cart-service", "catalog.product.updated");

        let config = settings.client_config();
        assert_eq!(config.get("group.id"), Some("cart-service"));
        assert_eq!(config.get("enable.auto.commit"), Some("false"));
        assert_eq!(config.get("auto.offset.reset"), Some("earliest"));
        assert_eq!(config.get("enable.partition.eof"), Some("true"));
    }

    #[test]
    fn test_commits_do_not_block() {
        assert!(matches!(COMMIT_MODE, CommitMode::Async));
    }

    #[test]
    fn test_empty_key_is_sent_keyless() {
        let keyed = MessageEnvelope::new("42", b"{}".to_vec());
        let keyless = MessageEnvelope::new("", b"{}".to_vec());

        assert_eq!(record_key(&keyed), Some("42"));
        assert_eq!(record_key(&keyless), None);
    }
}
