//! Cart-side half of the product-update pipeline.
//!
//! [`messaging::ProductUpdateConsumer`] keeps cart line items in step with
//! catalog edits: it consumes `ProductUpdatedEvent`s, applies them through a
//! [`messaging::ProductUpdateHandler`] with bounded retries, and parks anything
//! it cannot process on a dead-letter topic.

pub mod config;
pub mod messaging;
pub mod repository;

pub use config::{Config, DatabaseConfig, KafkaConfig};
pub use repository::{CartItemRepository, PgCartItemRepository};
