use std::sync::Arc;

use anyhow::{Context, Result};
use tracemirror_config::Config;
use tracemirror_core::{
    infrastructure::{
        lightstep::LightstepCatalogClient, postgres::PostgresRegistryStore,
        redis_channel::RedisWorkChannel,
    },
    ports::{CatalogClient, RegistryStore, WorkChannel},
    sync::SyncDriver,
};
use tracing::info;

/// Connect to PostgreSQL and bring the schema up to date.
pub async fn connect_registry(
    config: &Config,
) -> Result<Arc<PostgresRegistryStore>> {
    let url = config
        .database
        .url
        .as_deref()
        .context("DATABASE_URL is not configured")?;

    let store =
        PostgresRegistryStore::connect(url, config.database.max_connections)
            .await
            .context("failed to connect to PostgreSQL")?;
    store
        .initialize_schema()
        .await
        .context("failed to apply registry migrations")?;
    info!("Registry schema is up to date");

    Ok(Arc::new(store))
}

pub fn build_catalog(config: &Config) -> Result<Arc<dyn CatalogClient>> {
    let settings = config.lightstep.settings().with_context(|| {
        format!(
            "Lightstep credentials missing: {}",
            config.lightstep.missing_credentials().join(", ")
        )
    })?;
    let client = LightstepCatalogClient::new(&settings)
        .context("failed to build Lightstep client")?;
    Ok(Arc::new(client))
}

pub async fn connect_channel(config: &Config) -> Result<Arc<dyn WorkChannel>> {
    let redis = config
        .redis
        .as_ref()
        .context("REDIS_URL is not configured")?;
    let channel = RedisWorkChannel::connect(&redis.url)
        .await
        .context("failed to connect to Redis")?;
    Ok(Arc::new(channel))
}

/// Build the driver with every collaborator injected. Connections are
/// opened here and live as long as the returned driver.
pub async fn build_driver(
    config: &Config,
    registry: Arc<dyn RegistryStore>,
) -> Result<Arc<SyncDriver>> {
    let catalog = build_catalog(config)?;
    let channel = connect_channel(config).await?;

    let driver =
        SyncDriver::from_config(&config.sync, catalog, registry, channel)
            .context("invalid synchronization schedule")?;
    Ok(Arc::new(driver))
}
