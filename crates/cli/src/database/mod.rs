//! Application migrations, seeders and the connection they run on

pub mod migrations;
pub mod seeders;

use std::sync::Arc;

use anyhow::Context;
use plinth_core::DatabaseConfig;
use plinth_orm::{DatabaseBackend, DatabaseBackendType, DatabasePool, DatabasePoolConfig, MySqlBackend};

/// Open a pool for the configured database
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Arc<dyn DatabasePool>> {
    let scheme = config.url.split("://").next().unwrap_or_default();
    let backend_type: DatabaseBackendType = scheme.parse().map_err(anyhow::Error::msg)?;

    let pool_config = DatabasePoolConfig {
        max_connections: config.max_connections,
        ..DatabasePoolConfig::default()
    };

    let pool = match backend_type {
        DatabaseBackendType::MySQL => MySqlBackend::new().create_pool(&config.url, pool_config).await,
    }
    .with_context(|| format!("could not connect to {} database", backend_type))?;

    let latency = pool.health_check().await?;
    tracing::debug!(backend = %backend_type, ?latency, "database pool ready");
    Ok(pool)
}
