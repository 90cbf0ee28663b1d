//! Schema bootstrap for the regflow tables.

use crate::db::DbPool;
use crate::error::AppResult;

/// Schema that holds every regflow table.
pub const SCHEMA_NAME: &str = "regflow";

/// Tables the service needs to operate.
pub const REQUIRED_TABLES: [&str; 2] = ["main_db", "application_logs"];

/// DDL applied by [`init_schema`]. Every statement is idempotent.
pub const SCHEMA_DDL: &str = include_str!("schema.sql");

/// Create the schema, tables and indexes if they don't exist.
pub async fn init_schema(pool: &DbPool) -> AppResult<()> {
    sqlx::raw_sql(SCHEMA_DDL).execute(pool).await?;
    tracing::info!(schema = SCHEMA_NAME, "Database schema initialized");
    Ok(())
}

/// List the regflow tables present in the database.
pub async fn existing_tables(pool: &DbPool) -> AppResult<Vec<String>> {
    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT table_name::text FROM information_schema.tables WHERE table_schema = $1",
    )
    .bind(SCHEMA_NAME)
    .fetch_all(pool)
    .await?;

    Ok(tables)
}

/// Required tables absent from `existing`.
pub fn missing_tables(existing: &[String]) -> Vec<String> {
    REQUIRED_TABLES
        .iter()
        .filter(|t| !existing.iter().any(|e| e == *t))
        .map(|t| t.to_string())
        .collect()
}
