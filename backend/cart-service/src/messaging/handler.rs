//! Product update handler
//!
//! The consumer loop hands every decoded event to a [`ProductUpdateHandler`].
//! Handlers classify their own failures: a [`HandlerError::Transient`] is
//! retried with backoff, a [`HandlerError::Permanent`] goes straight to the
//! dead-letter topic.

use crate::repository::CartItemRepository;
use async_trait::async_trait;
use event_schema::ProductUpdatedEvent;
use resilience::Attempt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Error, Debug)]
pub enum HandlerError {
    /// Worth retrying, e.g. the database was unreachable
    #[error("{0:#}")]
    Transient(anyhow::Error),

    /// Retrying cannot help, e.g. the event violates a business rule
    #[error("{0:#}")]
    Permanent(anyhow::Error),
}

impl HandlerError {
    pub fn transient(err: impl Into<anyhow::Error>) -> Self {
        HandlerError::Transient(err.into())
    }

    pub fn permanent(err: impl Into<anyhow::Error>) -> Self {
        HandlerError::Permanent(err.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, HandlerError::Transient(_))
    }
}

/// Map a handler result onto the retry executor's outcome
pub fn classify<T>(result: Result<T, HandlerError>) -> Attempt<T, HandlerError> {
    match result {
        Ok(value) => Attempt::Success(value),
        Err(err) if err.is_transient() => Attempt::Retryable(err),
        Err(err) => Attempt::Fatal(err),
    }
}

/// Applies a product update to carts
#[async_trait]
pub trait ProductUpdateHandler: Send + Sync {
    /// `cancel` fires when the consumer is shutting down; long-running
    /// handlers should stop early and return.
    async fn handle_product_update(
        &self,
        event: &ProductUpdatedEvent,
        cancel: &CancellationToken,
    ) -> Result<(), HandlerError>;
}

/// Copies the new product data onto every cart line item holding the product
pub struct CartItemSync<R> {
    repository: R,
}

impl<R: CartItemRepository> CartItemSync<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl<R: CartItemRepository> ProductUpdateHandler for CartItemSync<R> {
    async fn handle_product_update(
        &self,
        event: &ProductUpdatedEvent,
        _cancel: &CancellationToken,
    ) -> Result<(), HandlerError> {
        let updated = self
            .repository
            .update_product_details(
                event.product_id(),
                event.name(),
                event.price(),
                event.image_url(),
            )
            .await
            .map_err(HandlerError::Transient)?;

        info!(
            product_id = event.product_id(),
            cart_items = updated,
            "Successfully updated cart items"
        );
        Ok(())
    }
}
