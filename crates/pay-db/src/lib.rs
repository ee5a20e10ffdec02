//! # pay-db
//!
//! Postgres persistence for users, payments and products.
//! Schema lives in `migrations/` and is applied on connect.

pub mod store;

pub use store::PgStore;

use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing::info;

/// Open a connection pool and run pending migrations.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgStore, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database connected, migrations applied");

    Ok(PgStore::new(pool))
}
