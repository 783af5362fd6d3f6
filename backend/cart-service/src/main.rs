use anyhow::{Context, Result};
use cart_service::messaging::{CartItemSync, DeadLetterRouter, ProductUpdateConsumer};
use cart_service::{Config, PgCartItemRepository};
use message_bus::{KafkaEnvelopeConsumer, KafkaEnvelopeProducer};
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "cart_service=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    info!("🔧 Starting cart-service");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        brokers = %config.kafka.brokers,
        group_id = %config.kafka.consumer_group_id,
        topic = %config.kafka.product_update_topic,
        dead_letter_topic = %config.kafka.dead_letter_topic,
        "✅ Configuration loaded"
    );

    // Initialize database pool
    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pg_pool)
        .await
        .context("Failed to run database migrations")?;
    info!("✅ Database pool created and migrations completed");

    // Kafka consumer and dead-letter producer
    let consumer = KafkaEnvelopeConsumer::new(&config.kafka.consumer_settings())
        .context("Failed to create product update consumer")?;
    let dead_letter_producer =
        KafkaEnvelopeProducer::new(&config.kafka.dead_letter_producer_settings())
            .context("Failed to create dead-letter producer")?;
    let dead_letters = DeadLetterRouter::new(
        dead_letter_producer,
        config.kafka.dead_letter_topic.clone(),
        config.kafka.dead_letter_retry_policy(),
        config.kafka.flush_timeout(),
    );

    let product_updates = ProductUpdateConsumer::new(
        consumer,
        dead_letters,
        CartItemSync::new(PgCartItemRepository::new(pg_pool.clone())),
        config.kafka.processing_retry_policy(),
        config.kafka.idle_poll_delay(),
    );

    let cancel = CancellationToken::new();
    let consumer_task = tokio::spawn(product_updates.run(cancel.clone()));
    info!("✅ Product update consumer started");

    shutdown_signal().await;
    info!("Shutdown signal received, stopping product update consumer");
    cancel.cancel();

    if let Err(err) = consumer_task.await {
        error!(error = %err, "Product update consumer task failed");
    }

    pg_pool.close().await;
    info!("cart-service stopped");
    Ok(())
}
