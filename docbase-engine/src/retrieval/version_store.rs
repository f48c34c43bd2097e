//! The version ledger: per-document record of what has been indexed.
//!
//! One row per `doc_id` holding the content hash, the last-indexed
//! timestamp, and the chunk count. The indexer is the only writer; status
//! readers may query concurrently. Every write is a single SQLite statement
//! or transaction, so a crash leaves either the old record or the new one,
//! never a torn row.

use crate::storage::{VersionHash, VersionRecord};
use anyhow::Result;
use sqlx::{Row, SqlitePool};

/// Ledger operations over the shared SQLite pool.
#[derive(Clone, Debug)]
pub struct VersionStore {
    pool: SqlitePool,
}

impl VersionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch the record for one document, if tracked.
    pub async fn get_version(&self, doc_id: &str) -> Result<Option<VersionRecord>> {
        let row = sqlx::query(
            "SELECT doc_id, version_hash, last_indexed_at, chunk_count
             FROM versions WHERE doc_id = ?1",
        )
        .bind(doc_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_record).transpose()
    }

    /// True when the document is untracked or its stored hash differs.
    pub async fn has_changed(&self, doc_id: &str, content_hash: &VersionHash) -> Result<bool> {
        Ok(match self.get_version(doc_id).await? {
            Some(record) => record.version_hash != *content_hash,
            None => true,
        })
    }

    /// Insert or update the record for a document.
    pub async fn upsert(
        &self,
        doc_id: &str,
        content_hash: &VersionHash,
        chunk_count: usize,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO versions (doc_id, version_hash, last_indexed_at, chunk_count)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(doc_id) DO UPDATE SET
                version_hash = excluded.version_hash,
                last_indexed_at = excluded.last_indexed_at,
                chunk_count = excluded.chunk_count
            "#,
        )
        .bind(doc_id)
        .bind(&content_hash[..])
        .bind(chrono::Utc::now().timestamp())
        .bind(chunk_count as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove a document's record. Returns whether a record existed.
    pub async fn remove(&self, doc_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM versions WHERE doc_id = ?1")
            .bind(doc_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All tracked documents, ordered by `doc_id`.
    pub async fn list_all(&self) -> Result<Vec<VersionRecord>> {
        let rows = sqlx::query(
            "SELECT doc_id, version_hash, last_indexed_at, chunk_count
             FROM versions ORDER BY doc_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_record).collect()
    }

    /// Drop every record. Used by a full reindex.
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM versions").execute(&self.pool).await?;
        Ok(())
    }

    /// Number of tracked documents.
    pub async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM versions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<VersionRecord> {
    let hash_bytes: Vec<u8> = row.get("version_hash");
    let version_hash: VersionHash = hash_bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("version_hash blob is not 32 bytes"))?;
    Ok(VersionRecord {
        doc_id: row.get("doc_id"),
        version_hash,
        last_indexed_at: row.get("last_indexed_at"),
        chunk_count: row.get::<i64, _>("chunk_count") as usize,
    })
}
