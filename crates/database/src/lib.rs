//! SQLite persistence layer for the Cartwheel client.
//!
//! The durable client state is a handful of independent slots (profile blob,
//! message list, message-id counter, product cache, has-searched flag), each
//! written wholesale on every mutation. They live in a single key-value
//! table; [`state`] provides the typed accessors.
//!
//! # Example
//!
//! ```no_run
//! use database::{state, Database, StateKey};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("sqlite:cartwheel.db?mode=rwc").await?;
//!
//!     let profile = state::load_profile(db.pool()).await?;
//!     state::save_profile(db.pool(), &profile).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod state;

pub use error::{DatabaseError, Result};
pub use state::StateKey;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS client_state (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
";

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size. The client is a single user, so a handful of
    /// connections covers interleaved background work.
    const DEFAULT_POOL_SIZE: u32 = 5;

    /// Connect to a SQLite database and apply the schema.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `sqlite::memory:` for tests.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        tracing::info!("Connected to database: {} (pool size: {})", url, pool_size);

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
