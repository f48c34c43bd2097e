//! SQLite pool behind the version ledger and the persisted chunk table.
//!
//! ## Database Schema
//!
//! ```sql
//! -- Version ledger: one row per tracked document
//! CREATE TABLE versions (
//!     doc_id TEXT PRIMARY KEY,         -- normalized relative path
//!     version_hash BLOB NOT NULL,      -- blake3 hash (32 bytes)
//!     last_indexed_at INTEGER NOT NULL,-- unix seconds
//!     chunk_count INTEGER NOT NULL
//! );
//!
//! -- Chunks with embeddings, the dense index's backing store
//! CREATE TABLE chunks (
//!     chunk_id TEXT PRIMARY KEY,
//!     doc_id TEXT NOT NULL,
//!     title TEXT NOT NULL,
//!     source_path TEXT NOT NULL,
//!     doc_type TEXT NOT NULL,
//!     version_hash BLOB NOT NULL,
//!     chunk_index INTEGER NOT NULL,
//!     page INTEGER,                    -- PDF page, NULL otherwise
//!     content TEXT NOT NULL,
//!     embedding BLOB                   -- f16 vector
//! );
//! ```
//!
//! WAL mode keeps concurrent readers off the writer's back; transactions give
//! the atomic-write guarantee the ledger contract requires (a crash mid-write
//! leaves either the old row or the new row, never a torn one).

use crate::error::EngineError;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::path::Path;

/// Shared handle to the engine's SQLite database.
#[derive(Clone, Debug)]
pub struct StoreHandle {
    pool: SqlitePool,
}

impl StoreHandle {
    /// Open (or create) the persistent database at `db_path`.
    ///
    /// A database that exists but cannot be opened or initialized surfaces as
    /// [`EngineError::VersionStoreCorruption`]; deleting the file and running
    /// a full reindex rebuilds it.
    pub async fn open(db_path: &Path) -> Result<Self, EngineError> {
        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(db_path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
                .create_if_missing(true),
        )
        .await
        .map_err(|source| EngineError::VersionStoreCorruption {
            path: db_path.to_path_buf(),
            source,
        })?;

        Self::create_tables(&pool)
            .await
            .map_err(|source| EngineError::VersionStoreCorruption {
                path: db_path.to_path_buf(),
                source,
            })?;

        Ok(Self { pool })
    }

    /// Open an in-memory database, for tests.
    pub async fn open_memory() -> Result<Self, EngineError> {
        let pool = SqlitePool::connect("sqlite::memory:").await.map_err(|source| {
            EngineError::VersionStoreCorruption {
                path: ":memory:".into(),
                source,
            }
        })?;
        Self::create_tables(&pool)
            .await
            .map_err(|source| EngineError::VersionStoreCorruption {
                path: ":memory:".into(),
                source,
            })?;
        Ok(Self { pool })
    }

    async fn create_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS versions (
                doc_id TEXT PRIMARY KEY,
                version_hash BLOB NOT NULL,
                last_indexed_at INTEGER NOT NULL,
                chunk_count INTEGER NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                chunk_id TEXT PRIMARY KEY,
                doc_id TEXT NOT NULL,
                title TEXT NOT NULL,
                source_path TEXT NOT NULL,
                doc_type TEXT NOT NULL,
                version_hash BLOB NOT NULL,
                chunk_index INTEGER NOT NULL,
                page INTEGER,
                content TEXT NOT NULL,
                embedding BLOB
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_doc_id ON chunks(doc_id)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// The underlying connection pool, shared by the version store and the
    /// dense index.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
