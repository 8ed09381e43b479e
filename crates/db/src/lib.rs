//! Persistence gateway for the tandem collaboration core.
//!
//! Exposes the Postgres pool helpers, row models, zero-sized repositories,
//! and the [`Gateway`] trait that the dispatcher depends on. Two gateways
//! are provided: [`PgGateway`] over a shared database, and
//! [`MemoryGateway`] for single-process deployments and tests.

use sqlx::postgres::PgPoolOptions;

pub mod error;
pub mod gateway;
pub mod memory;
pub mod models;
pub mod repositories;

pub use error::{StoreError, StoreResult};
pub use gateway::{Gateway, PgGateway};
pub use memory::MemoryGateway;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Run a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
