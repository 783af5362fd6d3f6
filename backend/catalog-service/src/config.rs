/// Configuration management for Catalog Service
///
/// Loads the product-update producer configuration from environment variables.
use anyhow::Result;
use event_schema::topics;
use message_bus::env_utils::{parse_or, required};
use message_bus::ProducerSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Kafka producer configuration for product updates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaConfig {
    /// Kafka broker addresses (comma-separated)
    pub brokers: String,
    /// Topic product updates are published to
    #[serde(default = "default_product_update_topic")]
    pub product_update_topic: String,
    /// Client-level send retries
    #[serde(default = "default_message_send_max_retries")]
    pub message_send_max_retries: u32,
    /// Pause between client-level send retries
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// How long shutdown waits for buffered sends
    #[serde(default = "default_producer_flush_timeout_secs")]
    pub producer_flush_timeout_secs: u64,
}

// Default values
fn default_product_update_topic() -> String {
    topics::PRODUCT_UPDATED.to_string()
}

fn default_message_send_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}

fn default_producer_flush_timeout_secs() -> u64 {
    10
}

impl KafkaConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(KafkaConfig {
            brokers: required(&lookup, "KAFKA_BROKERS")?,
            product_update_topic: lookup("KAFKA_PRODUCT_UPDATE_TOPIC")
                .unwrap_or_else(default_product_update_topic),
            message_send_max_retries: parse_or(
                &lookup,
                "KAFKA_MESSAGE_SEND_MAX_RETRIES",
                default_message_send_max_retries,
            )?,
            retry_backoff_ms: parse_or(&lookup, "KAFKA_RETRY_BACKOFF_MS", default_retry_backoff_ms)?,
            producer_flush_timeout_secs: parse_or(
                &lookup,
                "KAFKA_PRODUCER_FLUSH_TIMEOUT_SECS",
                default_producer_flush_timeout_secs,
            )?,
        })
    }

    pub fn producer_settings(&self) -> ProducerSettings {
        let mut settings = ProducerSettings::new(self.brokers.clone());
        settings.message_send_max_retries = self.message_send_max_retries;
        settings.retry_backoff = Duration::from_millis(self.retry_backoff_ms);
        settings
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_secs(self.producer_flush_timeout_secs)
    }
}
