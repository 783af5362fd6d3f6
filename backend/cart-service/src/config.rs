/// Configuration management for Cart Service
///
/// Loads configuration from environment variables.
use anyhow::Result;
use event_schema::topics;
use message_bus::env_utils::{parse_or, required};
use message_bus::{ConsumerSettings, ProducerSettings};
use resilience::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Product update consumer configuration
    pub kafka: KafkaConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Product update consumer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaConfig {
    /// Kafka broker addresses (comma-separated)
    pub brokers: String,
    /// Consumer group ID
    #[serde(default = "default_consumer_group_id")]
    pub consumer_group_id: String,
    /// Topic to consume product updates from
    #[serde(default = "default_product_update_topic")]
    pub product_update_topic: String,
    /// Topic for messages that could not be processed
    #[serde(default = "default_dead_letter_topic")]
    pub dead_letter_topic: String,
    /// Handler retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for handler retries
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Dead-letter publish retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_dlq_retries: u32,
    /// Base delay for dead-letter publish retries
    #[serde(default = "default_retry_delay_ms")]
    pub dlq_retry_delay_ms: u64,
    /// How long shutdown waits for buffered dead-letter sends
    #[serde(default = "default_producer_flush_timeout_secs")]
    pub producer_flush_timeout_secs: u64,
    /// Pause after a partition EOF or a poll error
    #[serde(default = "default_idle_poll_delay_ms")]
    pub idle_poll_delay_ms: u64,
}

// Default values
fn default_max_connections() -> u32 {
    10
}

fn default_consumer_group_id() -> String {
    "cart-service".to_string()
}

fn default_product_update_topic() -> String {
    topics::PRODUCT_UPDATED.to_string()
}

fn default_dead_letter_topic() -> String {
    topics::PRODUCT_UPDATED_DLQ.to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_producer_flush_timeout_secs() -> u64 {
    10
}

fn default_idle_poll_delay_ms() -> u64 {
    100
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database = DatabaseConfig {
            url: required(&lookup, "DATABASE_URL")?,
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", default_max_connections)?,
        };

        Ok(Config {
            database,
            kafka: KafkaConfig::from_lookup(lookup)?,
        })
    }
}

impl KafkaConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(KafkaConfig {
            brokers: required(&lookup, "KAFKA_BROKERS")?,
            consumer_group_id: lookup("KAFKA_CONSUMER_GROUP_ID")
                .unwrap_or_else(default_consumer_group_id),
            product_update_topic: lookup("KAFKA_PRODUCT_UPDATE_TOPIC")
                .unwrap_or_else(default_product_update_topic),
            dead_letter_topic: lookup("KAFKA_DEAD_LETTER_TOPIC")
                .unwrap_or_else(default_dead_letter_topic),
            max_retries: parse_or(&lookup, "KAFKA_MAX_RETRIES", default_max_retries)?,
            retry_delay_ms: parse_or(&lookup, "KAFKA_RETRY_DELAY_MS", default_retry_delay_ms)?,
            max_dlq_retries: parse_or(&lookup, "KAFKA_MAX_DLQ_RETRIES", default_max_retries)?,
            dlq_retry_delay_ms: parse_or(
                &lookup,
                "KAFKA_DLQ_RETRY_DELAY_MS",
                default_retry_delay_ms,
            )?,
            producer_flush_timeout_secs: parse_or(
                &lookup,
                "KAFKA_PRODUCER_FLUSH_TIMEOUT_SECS",
                default_producer_flush_timeout_secs,
            )?,
            idle_poll_delay_ms: parse_or(
                &lookup,
                "KAFKA_IDLE_POLL_DELAY_MS",
                default_idle_poll_delay_ms,
            )?,
        })
    }

    pub fn processing_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_delay_ms))
    }

    pub fn dead_letter_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_dlq_retries,
            Duration::from_millis(self.dlq_retry_delay_ms),
        )
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_secs(self.producer_flush_timeout_secs)
    }

    pub fn idle_poll_delay(&self) -> Duration {
        Duration::from_millis(self.idle_poll_delay_ms)
    }

    pub fn consumer_settings(&self) -> ConsumerSettings {
        ConsumerSettings::new(
            self.brokers.clone(),
            self.consumer_group_id.clone(),
            self.product_update_topic.clone(),
        )
    }

    /// Dead-letter producer settings; client-level retries stay at their defaults
    pub fn dead_letter_producer_settings(&self) -> ProducerSettings {
        ProducerSettings::new(self.brokers.clone())
    }
}
