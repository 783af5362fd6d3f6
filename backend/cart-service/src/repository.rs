/// Cart line-item persistence
use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

/// Storage for the product data copied onto cart line items
#[async_trait]
pub trait CartItemRepository: Send + Sync {
    /// Overwrite name, price and image of every line item for `product_id`,
    /// returning how many rows changed
    async fn update_product_details(
        &self,
        product_id: i32,
        name: &str,
        price: Decimal,
        image_url: Option<&str>,
    ) -> Result<u64>;
}

pub struct PgCartItemRepository {
    pool: PgPool,
}

impl PgCartItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartItemRepository for PgCartItemRepository {
    async fn update_product_details(
        &self,
        product_id: i32,
        name: &str,
        price: Decimal,
        image_url: Option<&str>,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE cart_items SET name = $2, price = $3, image_url = $4 WHERE product_id = $1",
        )
        .bind(product_id)
        .bind(name)
        .bind(price)
        .bind(image_url)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to update cart items for product {}", product_id))?;

        Ok(result.rows_affected())
    }
}
