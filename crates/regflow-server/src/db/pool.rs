//! PostgreSQL pool management.

use crate::config::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Type alias for the PostgreSQL connection pool.
pub type DbPool = PgPool;

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout))
}

/// Create a connected pool.
///
/// # Errors
///
/// Returns an error if the first connection cannot be established.
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let pool = pool_options(config)
        .connect_with(config.connect_options())
        .await?;

    tracing::info!(
        host = %config.host,
        port = %config.port,
        database = %config.database,
        max_connections = config.max_connections,
        "Database connection pool created"
    );

    Ok(pool)
}

/// Create a pool that only connects when a query first needs a connection.
///
/// Used by router tests, where validation failures must never reach the
/// database.
pub fn create_lazy_pool(config: &DatabaseConfig) -> DbPool {
    pool_options(config)
        .min_connections(0)
        .connect_lazy_with(config.connect_options())
}

/// Check if the database answers a trivial query.
pub async fn health_check(pool: &DbPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}
