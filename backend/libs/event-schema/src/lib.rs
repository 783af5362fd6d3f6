/// Event schema for the catalog → cart product-update topic
///
/// Catalog publishes a `ProductUpdatedEvent` whenever a product is edited; the
/// cart service consumes it to refresh denormalized cart line items. Events are
/// flat camelCase JSON keyed by the product id, so every update for one product
/// lands on the same partition.
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

mod error;

pub use error::{EventDecodeError, EventValidationError};

/// Default topic names shared by producer and consumer
pub mod topics {
    pub const PRODUCT_UPDATED: &str = "catalog.product.updated";
    pub const PRODUCT_UPDATED_DLQ: &str = "catalog.product.updated.dlq";
}

/// A product's new display data
///
/// Fields are private so a constructed event is always valid: non-blank name,
/// non-negative price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdatedEvent {
    product_id: i32,
    name: String,
    price: Decimal,
    image_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireProductUpdated {
    product_id: i32,
    name: String,
    price: Decimal,
    #[serde(default)]
    image_url: Option<String>,
}

impl ProductUpdatedEvent {
    pub fn new(
        product_id: i32,
        name: impl Into<String>,
        price: Decimal,
        image_url: Option<String>,
    ) -> Result<Self, EventValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EventValidationError::BlankName);
        }
        if price < Decimal::ZERO {
            return Err(EventValidationError::NegativePrice(price));
        }

        Ok(Self {
            product_id,
            name,
            price,
            image_url,
        })
    }

    /// Parse and validate a message payload
    pub fn decode(payload: &[u8]) -> Result<Self, EventDecodeError> {
        let wire: WireProductUpdated = serde_json::from_slice(payload)?;
        let event = Self::new(wire.product_id, wire.name, wire.price, wire.image_url)?;
        Ok(event)
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Message key: the stringified product id
    pub fn partition_key(&self) -> String {
        self.product_id.to_string()
    }

    pub fn product_id(&self) -> i32 {
        self.product_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }
}
