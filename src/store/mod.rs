//! Storage layer for the chain indexing core.
//!
//! ## Architecture overview
//!
//! The store is a single SQLite database, opened in WAL mode, shared by
//! one writer and any number of readers through a connection pool. Every
//! mutating operation — ingest, stabilization, height reset — runs inside
//! its own `sqlx` transaction and is atomic; reads run outside any
//! transaction and see the last committed state.
//!
//! ## Components
//!
//! - [`schema`] — table and index DDL.
//! - [`ingest`] — `save_block_and_txs`, the ingestion engine.
//! - [`stabilize`] — promotion and cleanup, plus `reset_to_height`.
//! - [`query`] — the paginated query engine.
//! - [`diagnostics`] — counts and height summaries.

pub mod diagnostics;
pub mod ingest;
pub mod query;
pub mod schema;
pub mod stabilize;

use crate::config::StoreConfig;
use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

/// Handle owning the storage pool for the lifetime of the process: the
/// core's only piece of global mutable state.
#[derive(Clone)]
pub struct ChainIndexStore {
    pub(crate) pool: SqlitePool,
    pub(crate) config: StoreConfig,
}

impl ChainIndexStore {
    /// Open (or create) the SQLite database described by `config`.
    pub async fn open(config: StoreConfig) -> Result<Self> {
        let options = if config.database_path == ":memory:" {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            SqliteConnectOptions::from_str(&format!("sqlite:{}", config.database_path))?
                .create_if_missing(true)
        }
        .journal_mode(SqliteJournalMode::Wal)
        .page_size(config.page_size);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await?;

        schema::init_schema(&pool).await?;
        info!(database_path = %config.database_path, "chain index store opened");

        Ok(ChainIndexStore { pool, config })
    }

    /// Open an ephemeral, in-memory database. Intended for tests.
    pub async fn open_in_memory() -> Result<Self> {
        let mut config = StoreConfig::default();
        config.database_path = ":memory:".to_string();
        config.max_connections = 1;
        Self::open(config).await
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_creates_schema() {
        let store = ChainIndexStore::open_in_memory().await.unwrap();
        // Querying a pending table that only exists if init_schema ran.
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_blocks")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
