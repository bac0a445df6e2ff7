//! Database wiring: pool creation and schema.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

const SCHEMA: &str = include_str!("../migrations/0001_ai_jobs.sql");

/// Connect a pool to `database_url`.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Create tables and indexes if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    info!("database schema ensured");
    Ok(())
}
