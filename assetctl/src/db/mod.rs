//! Database layer for data persistence and access.
//!
//! Data access goes through SQLx and SQLite, following the repository
//! pattern: each table has a repository in [`handlers`] wrapping a
//! connection, consuming request structs from [`models`] and returning
//! response structs from the same module. [`errors`] categorizes sqlx
//! failures into a [`errors::DbError`] application code can match on.
//!
//! Multi-statement writes always run inside a transaction; single-statement
//! operations use the plain connection. The schema enforces the invariants
//! the services rely on: `(customer_id, name)` unique on assets, 1:1 user to
//! role, 1:1 owner to customer, and cascading foreign keys.
//!
//! Migrations live in `migrations/` and are embedded at compile time via
//! [`MIGRATOR`].

pub mod errors;
pub mod handlers;
pub mod models;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

pub type DbPool = sqlx::SqlitePool;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Open a pool on the configured database URL, creating the file if needed.
pub async fn connect(url: &str) -> anyhow::Result<DbPool> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    Ok(pool)
}
