/// Product update workflow
///
/// Validates an edited product against the catalog, persists it, then
/// publishes the change so carts holding the product can refresh their copy.
use crate::error::CatalogError;
use crate::messaging::ProductUpdatePublisher;
use anyhow::Result;
use async_trait::async_trait;
use event_schema::ProductUpdatedEvent;
use message_bus::EnvelopeProducer;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub category_id: i32,
}

/// Catalog persistence the workflow depends on
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn find_product(&self, id: i32) -> Result<Option<Product>>;

    async fn category_exists(&self, category_id: i32) -> Result<bool>;

    async fn save_product(&self, product: &Product) -> Result<()>;
}

pub struct ProductUpdateService<C, P> {
    catalog: C,
    publisher: ProductUpdatePublisher<P>,
}

impl<C, P> ProductUpdateService<C, P>
where
    C: ProductCatalog,
    P: EnvelopeProducer,
{
    pub fn new(catalog: C, publisher: ProductUpdatePublisher<P>) -> Self {
        Self { catalog, publisher }
    }

    pub fn publisher(&self) -> &ProductUpdatePublisher<P> {
        &self.publisher
    }

    /// Apply an edit to an existing product and announce it.
    ///
    /// A publish failure is returned after the product has been saved; the
    /// caller decides whether to retry or compensate.
    pub async fn update_product(&self, product: Product) -> Result<Product, CatalogError> {
        if self.catalog.find_product(product.id).await?.is_none() {
            return Err(CatalogError::ProductNotFound(product.id));
        }

        if !self.catalog.category_exists(product.category_id).await? {
            warn!(
                product_id = product.id,
                category_id = product.category_id,
                "Rejected product update with unknown category"
            );
            return Err(CatalogError::InvalidCategory(product.category_id));
        }

        let event = ProductUpdatedEvent::new(
            product.id,
            product.name.clone(),
            product.price,
            product.image_url.clone(),
        )?;

        self.catalog.save_product(&product).await?;
        debug!(product_id = product.id, "Product saved");

        self.publisher.publish(&event).await?;
        Ok(product)
    }
}
