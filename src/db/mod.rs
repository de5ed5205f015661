//! Database pool initialization.
//!
//! SYSTEM CONTEXT
//! ==============
//! Startup creates the shared SQLx pool before accepting API traffic. The
//! schema (`accounts`, `sessions`, `password_resets`, `portfolios`,
//! `positions`, `watchlist`) is owned by the deployment's migration tooling;
//! this service only reads and writes rows.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Connect the `PostgreSQL` pool.
///
/// # Errors
///
/// Returns an error if the initial connection fails.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
