//! PostgreSQL storage for Rapport contacts.
//!
//! [`PgContactStore`] plugs the `contacts` table into the import pipeline's
//! [`rapport_core::ContactStore`] seam.

pub mod contact_store;
pub mod models;
pub mod repositories;

use sqlx::postgres::PgPoolOptions;

pub use contact_store::PgContactStore;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to prove the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations in `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
