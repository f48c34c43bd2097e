//! Dense (embedding) index over the persisted chunk table.
//!
//! Embeddings are stored as f16 blobs next to the chunk text and metadata.
//! Search is a cosine-similarity scan over the stored vectors, which holds
//! up at knowledge-base scale and keeps deletion exact: removing a document
//! is one `DELETE ... WHERE doc_id = ?`, no approximate-index bookkeeping.
//!
//! The embedder that produced the vectors is external; this index is
//! metric-and-storage only.

use crate::storage::{Chunk, ChunkMeta, DocType};
use anyhow::Result;
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// One dense search result.
#[derive(Debug, Clone)]
pub struct DenseHit {
    pub chunk_id: String,
    /// Cosine similarity of the query to this chunk, in [-1, 1].
    pub score: f32,
    pub text: String,
    pub meta: ChunkMeta,
}

/// Embedding store and nearest-neighbor search, SQLite-backed.
#[derive(Clone, Debug)]
pub struct DenseIndex {
    pool: SqlitePool,
}

impl DenseIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a batch of chunks (normally one document's worth) in a single
    /// transaction, so readers see the document appear atomically.
    pub async fn add(&self, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for chunk in chunks {
            insert_chunk(&mut tx, chunk).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Swap a document's chunks for a new set inside one transaction: the
    /// old rows are deleted and the new ones inserted before the commit, so
    /// a concurrent search never sees the document absent or half-replaced,
    /// and a crash rolls the whole swap back.
    ///
    /// Returns how many old chunks were deleted.
    pub async fn replace_document(&self, doc_id: &str, chunks: &[Chunk]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM chunks WHERE doc_id = ?1")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?
            .rows_affected() as usize;
        for chunk in chunks {
            insert_chunk(&mut tx, chunk).await?;
        }
        tx.commit().await?;
        debug!(doc_id, removed, inserted = chunks.len(), "replaced document chunks");
        Ok(removed)
    }

    /// Cosine-similarity search over every stored embedding.
    ///
    /// Scores decrease monotonically with distance; ties are broken by
    /// `chunk_id` so identical inputs always rank identically.
    pub async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<DenseHit>> {
        let rows = sqlx::query(
            "SELECT chunk_id, doc_id, title, source_path, doc_type, version_hash,
                    chunk_index, page, content, embedding
             FROM chunks WHERE embedding IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let chunk = row_to_chunk(row)?;
            let Some(embedding) = &chunk.embedding else {
                continue;
            };
            let score = cosine_similarity(query_embedding, embedding);
            hits.push(DenseHit {
                chunk_id: chunk.chunk_id,
                score,
                text: chunk.text,
                meta: chunk.meta,
            });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Delete every chunk belonging to exactly this document.
    pub async fn delete_by_doc_id(&self, doc_id: &str) -> Result<usize> {
        let result = sqlx::query("DELETE FROM chunks WHERE doc_id = ?1")
            .bind(doc_id)
            .execute(&self.pool)
            .await?;
        let removed = result.rows_affected() as usize;
        debug!(doc_id, removed, "deleted chunks from dense index");
        Ok(removed)
    }

    /// Drop every chunk. Used by a full reindex.
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM chunks").execute(&self.pool).await?;
        Ok(())
    }

    /// Every stored chunk, used to rehydrate the sparse index on startup.
    pub async fn all_chunks(&self) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT chunk_id, doc_id, title, source_path, doc_type, version_hash,
                    chunk_index, page, content, embedding
             FROM chunks ORDER BY chunk_id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_chunk).collect()
    }

    /// Number of stored chunks.
    pub async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

async fn insert_chunk(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    chunk: &Chunk,
) -> Result<()> {
    let embedding_bytes = chunk
        .embedding
        .as_ref()
        .map(|e| bytemuck::cast_slice::<half::f16, u8>(e));

    sqlx::query(
        r#"
        INSERT OR REPLACE INTO chunks
        (chunk_id, doc_id, title, source_path, doc_type, version_hash,
         chunk_index, page, content, embedding)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&chunk.chunk_id)
    .bind(&chunk.meta.doc_id)
    .bind(&chunk.meta.title)
    .bind(&chunk.meta.source_path)
    .bind(chunk.meta.doc_type.as_str())
    .bind(&chunk.meta.version_hash[..])
    .bind(chunk.meta.chunk_index as i64)
    .bind(chunk.meta.page.map(|p| p as i64))
    .bind(&chunk.text)
    .bind(embedding_bytes)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn row_to_chunk(row: sqlx::sqlite::SqliteRow) -> Result<Chunk> {
    let doc_type_str: String = row.get("doc_type");
    let doc_type = DocType::parse(&doc_type_str)
        .ok_or_else(|| anyhow::anyhow!("unknown doc_type in chunk row: {doc_type_str}"))?;
    let hash_bytes: Vec<u8> = row.get("version_hash");
    let version_hash = hash_bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("version_hash blob is not 32 bytes"))?;
    let embedding_bytes: Option<Vec<u8>> = row.get("embedding");
    let embedding =
        embedding_bytes.map(|bytes| bytemuck::cast_slice::<u8, half::f16>(&bytes).to_vec());

    Ok(Chunk {
        chunk_id: row.get("chunk_id"),
        text: row.get("content"),
        meta: ChunkMeta {
            doc_id: row.get("doc_id"),
            title: row.get("title"),
            source_path: row.get("source_path"),
            doc_type,
            version_hash,
            chunk_index: row.get::<i64, _>("chunk_index") as usize,
            page: row.get::<Option<i64>, _>("page").map(|p| p as u32),
        },
        embedding,
    })
}

/// Cosine similarity between an f32 query and a stored f16 vector.
fn cosine_similarity(query: &[f32], stored: &[half::f16]) -> f32 {
    if query.len() != stored.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_q = 0.0f32;
    let mut norm_s = 0.0f32;
    for (q, s) in query.iter().zip(stored.iter()) {
        let s = f32::from(*s);
        dot += q * s;
        norm_q += q * q;
        norm_s += s * s;
    }
    if norm_q == 0.0 || norm_s == 0.0 {
        return 0.0;
    }
    dot / (norm_q.sqrt() * norm_s.sqrt())
}
