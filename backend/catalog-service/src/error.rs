use event_schema::EventValidationError;
use message_bus::BusError;
use thiserror::Error;

/// Failure to hand a product update to the broker
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Failed to serialize product update: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The client gave up after its own retries
    #[error("Failed to publish product update: {0}")]
    Send(#[from] BusError),
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Product {0} not found")]
    ProductNotFound(i32),

    #[error("Category {0} does not exist")]
    InvalidCategory(i32),

    #[error("Invalid product: {0}")]
    InvalidProduct(#[from] EventValidationError),

    #[error("Catalog storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error(transparent)]
    Publish(#[from] PublishError),
}
