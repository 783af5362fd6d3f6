/// Integration tests for the catalog product update workflow
use anyhow::Result;
use async_trait::async_trait;
use catalog_service::{
    CatalogError, Product, ProductCatalog, ProductUpdatePublisher, ProductUpdateService,
    PublishError,
};
use event_schema::{EventValidationError, ProductUpdatedEvent};
use message_bus::{InMemoryBroker, InMemoryProducer};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

const TOPIC: &str = "catalog.product.updated";

/// Catalog backed by plain maps
struct FakeCatalog {
    products: Mutex<HashMap<i32, Product>>,
    categories: HashSet<i32>,
}

impl FakeCatalog {
    fn with(products: Vec<Product>, categories: &[i32]) -> Self {
        Self {
            products: Mutex::new(products.into_iter().map(|p| (p.id, p)).collect()),
            categories: categories.iter().copied().collect(),
        }
    }

    fn stored(&self, id: i32) -> Option<Product> {
        self.products.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl ProductCatalog for FakeCatalog {
    async fn find_product(&self, id: i32) -> Result<Option<Product>> {
        Ok(self.stored(id))
    }

    async fn category_exists(&self, category_id: i32) -> Result<bool> {
        Ok(self.categories.contains(&category_id))
    }

    async fn save_product(&self, product: &Product) -> Result<()> {
        self.products
            .lock()
            .unwrap()
            .insert(product.id, product.clone());
        Ok(())
    }
}

fn product(id: i32, name: &str, price: Decimal) -> Product {
    Product {
        id,
        name: name.to_string(),
        price,
        image_url: None,
        category_id: 1,
    }
}

fn service(
    broker: &InMemoryBroker,
    catalog: FakeCatalog,
) -> ProductUpdateService<FakeCatalog, InMemoryProducer> {
    let publisher =
        ProductUpdatePublisher::new(broker.producer(), TOPIC, Duration::from_secs(10));
    ProductUpdateService::new(catalog, publisher)
}

// ==================== Happy Path Tests ====================

#[tokio::test]
async fn test_update_saves_and_publishes() {
    let broker = InMemoryBroker::default();
    let service = service(
        &broker,
        FakeCatalog::with(vec![product(42, "Old Widget", Decimal::ONE)], &[1]),
    );

    let mut edited = product(42, "Widget", Decimal::new(999, 2));
    edited.image_url = Some("https://cdn.example.com/widget.png".to_string());
    assert_ok!(service.update_product(edited.clone()).await);

    let records = broker.records(TOPIC);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].envelope.key, "42");

    let event = ProductUpdatedEvent::decode(&records[0].envelope.value).unwrap();
    assert_eq!(event.product_id(), 42);
    assert_eq!(event.name(), "Widget");
    assert_eq!(event.price(), Decimal::new(999, 2));
    assert_eq!(event.image_url(), Some("https://cdn.example.com/widget.png"));
}

// ==================== Validation Tests ====================

#[tokio::test]
async fn test_unknown_product_is_rejected() {
    let broker = InMemoryBroker::default();
    let service = service(&broker, FakeCatalog::with(vec![], &[1]));

    let err = assert_err!(
        service
            .update_product(product(7, "Widget", Decimal::ONE))
            .await
    );

    assert!(matches!(err, CatalogError::ProductNotFound(7)));
    assert!(broker.records(TOPIC).is_empty());
}

#[tokio::test]
async fn test_unknown_category_is_rejected() {
    let broker = InMemoryBroker::default();
    let service = service(
        &broker,
        FakeCatalog::with(vec![product(42, "Widget", Decimal::ONE)], &[1]),
    );

    let mut edited = product(42, "Widget", Decimal::ONE);
    edited.category_id = 99;
    let err = assert_err!(service.update_product(edited).await);

    assert!(matches!(err, CatalogError::InvalidCategory(99)));
    assert!(broker.records(TOPIC).is_empty());
}

#[tokio::test]
async fn test_negative_price_is_not_saved() {
    let broker = InMemoryBroker::default();
    let catalog = FakeCatalog::with(vec![product(42, "Widget", Decimal::ONE)], &[1]);
    let service = service(&broker, catalog);

    let err = assert_err!(
        service
            .update_product(product(42, "Widget", Decimal::new(-5, 0)))
            .await
    );

    assert!(matches!(
        err,
        CatalogError::InvalidProduct(EventValidationError::NegativePrice(_))
    ));
    assert!(broker.records(TOPIC).is_empty());
}

// ==================== Publish Failure Tests ====================

#[tokio::test]
async fn test_publish_failure_surfaces_to_caller() {
    let broker = InMemoryBroker::default();
    broker.fail_sends(TOPIC, 1);
    let service = service(
        &broker,
        FakeCatalog::with(vec![product(42, "Widget", Decimal::ONE)], &[1]),
    );

    let err = assert_err!(
        service
            .update_product(product(42, "Widget v2", Decimal::ONE))
            .await
    );

    assert!(matches!(err, CatalogError::Publish(PublishError::Send(_))));
    assert!(broker.records(TOPIC).is_empty());
}
