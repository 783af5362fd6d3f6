//! Catalog-side half of the product-update pipeline.
//!
//! Editing a product goes through [`services::ProductUpdateService`], which
//! persists the change and hands a `ProductUpdatedEvent` to the
//! [`messaging::ProductUpdatePublisher`] for delivery to the cart service.

pub mod config;
pub mod error;
pub mod messaging;
pub mod services;

pub use config::KafkaConfig;
pub use error::{CatalogError, PublishError};
pub use messaging::ProductUpdatePublisher;
pub use services::{Product, ProductCatalog, ProductUpdateService};
