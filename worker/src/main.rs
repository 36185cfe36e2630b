//! Catalink worker binary.
//!
//! Consumes transition events from Kafka and deactivates the
//! product-biller link behind every failed transition. Writes go to
//! Postgres, mutual exclusion across worker replicas comes from a
//! Redis-backed distributed lock, and a Prometheus scrape endpoint
//! exposes processing counters.

mod config;
mod consumer;

use catalink_core::{DistributedLock, TransitionProcessor};
use catalink_postgres::PgLinkRepository;
use catalink_redis::RedisLockStore;
use metrics_exporter_prometheus::PrometheusBuilder;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::WorkerConfig;
use crate::consumer::TransitionConsumer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    tracing::info!(
        brokers = %config.kafka.brokers,
        group_id = %config.kafka.group_id,
        topic = %config.kafka.topic,
        metrics_port = config.metrics_port,
        "Starting catalink worker"
    );

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.metrics_port))
        .install()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.postgres.max_connections)
        .acquire_timeout(config.postgres.connect_timeout)
        .connect(&config.postgres.url)
        .await?;
    tracing::info!("Connected to Postgres");

    let lock_store = RedisLockStore::connect(&config.redis.url).await?;
    tracing::info!("Connected to Redis");

    let lock = DistributedLock::new(lock_store, config.lock.to_lock_config());
    let processor = TransitionProcessor::new(lock, PgLinkRepository::new(pool));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %error, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received");
        shutdown_tx.send(true).ok();
    });

    let consumer = TransitionConsumer::new(&config.kafka, processor, shutdown_rx)?;
    consumer.run().await;

    tracing::info!("Catalink worker stopped");
    Ok(())
}
