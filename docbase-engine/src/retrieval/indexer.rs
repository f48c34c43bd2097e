//! Ingestion orchestrator: scan, diff, parse, chunk, embed, index.
//!
//! `ingest_incremental` is the heart of the engine. Each run scans the
//! document root, diffs content hashes against the version ledger, and
//! processes only what changed. Per-document failures are captured in the
//! report and never abort the run. The ledger row for a document is written
//! strictly after its chunks are indexed, so a crash mid-run leaves the
//! document marked stale and the next run redoes it.

use crate::config::EngineConfig;
use crate::retrieval::dense_index::DenseIndex;
use crate::retrieval::hybrid::HybridRetriever;
use crate::retrieval::parser::DocumentParser;
use crate::retrieval::scanner::{FileScanner, ScannedDocument};
use crate::retrieval::sparse_index::SparseIndex;
use crate::retrieval::version_store::VersionStore;
use crate::storage::sqlite::StoreHandle;
use crate::storage::{Chunk, ChunkMeta, VersionRecord};
use anyhow::Result;
use docbase_context::TextChunker;
use docbase_embed::EmbeddingProvider;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Pipeline stage where a per-document failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStage {
    Scan,
    Parse,
    Embed,
    Index,
}

/// One document the run could not process. The document's previous indexed
/// state, if any, is left untouched.
#[derive(Debug, Clone, Serialize)]
pub struct IngestFailure {
    pub doc_id: String,
    pub stage: IngestStage,
    pub message: String,
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub new_documents: usize,
    pub updated_documents: usize,
    pub removed_documents: usize,
    /// Chunks in the index after the run.
    pub total_chunks: usize,
    pub elapsed_ms: u64,
    pub failures: Vec<IngestFailure>,
}

/// The ingestion and retrieval engine.
///
/// Owns the ledger, both indexes, and the processing pipeline. Construct with
/// [`open`](Self::open) against a persistent database, or
/// [`open_memory`](Self::open_memory) for tests and throwaway sessions.
pub struct KbIndexer {
    config: EngineConfig,
    versions: VersionStore,
    dense: DenseIndex,
    sparse: Arc<RwLock<SparseIndex>>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: TextChunker,
    parser: DocumentParser,
    scanner: FileScanner,
}

impl KbIndexer {
    /// Open the engine against the configured ledger path, creating the
    /// database if needed. The sparse index is rebuilt from the persisted
    /// chunks, so search works immediately after a restart.
    pub async fn open(
        config: EngineConfig,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let store = StoreHandle::open(&config.ledger_path()).await?;
        Self::from_store(config, store, embedder).await
    }

    /// In-memory variant: same engine, nothing touches disk but the scanned
    /// documents themselves.
    pub async fn open_memory(
        config: EngineConfig,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let store = StoreHandle::open_memory().await?;
        Self::from_store(config, store, embedder).await
    }

    async fn from_store(
        config: EngineConfig,
        store: StoreHandle,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let versions = VersionStore::new(store.pool().clone());
        let dense = DenseIndex::new(store.pool().clone());

        let mut sparse = SparseIndex::new();
        for chunk in dense.all_chunks().await? {
            sparse.add_chunk(&chunk.chunk_id, &chunk.text, chunk.meta);
        }
        if !sparse.is_empty() {
            info!(chunks = sparse.len(), "rehydrated sparse index from storage");
        }

        let chunker = TextChunker::new(config.chunking()?);
        let scanner = FileScanner::new(&config.root);
        Ok(Self {
            config,
            versions,
            dense,
            sparse: Arc::new(RwLock::new(sparse)),
            embedder,
            chunker,
            parser: DocumentParser::new(),
            scanner,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A retriever sharing this engine's indexes. Cheap to create; queries
    /// observe ingestion as it lands.
    pub fn retriever(&self) -> HybridRetriever {
        HybridRetriever::new(
            self.dense.clone(),
            Arc::clone(&self.sparse),
            Arc::clone(&self.embedder),
            self.config.dense_weight,
            self.config.sparse_weight,
            self.config.no_hit_threshold,
            self.config.top_k_default,
        )
    }

    /// Current ledger contents, ordered by document id.
    pub async fn version_status(&self) -> Result<Vec<VersionRecord>> {
        self.versions.list_all().await
    }

    /// Scan the root and bring the index up to date with it.
    ///
    /// Unchanged documents are skipped entirely. A document that fails at any
    /// stage keeps its previously indexed state and appears in
    /// [`IngestReport::failures`].
    pub async fn ingest_incremental(&self) -> Result<IngestReport> {
        let started = Instant::now();
        let mut report = IngestReport {
            new_documents: 0,
            updated_documents: 0,
            removed_documents: 0,
            total_chunks: 0,
            elapsed_ms: 0,
            failures: Vec::new(),
        };

        let outcome = self.scanner.scan().await?;
        for skipped in outcome.skipped {
            report.failures.push(IngestFailure {
                doc_id: skipped.path.display().to_string(),
                stage: IngestStage::Scan,
                message: skipped.message,
            });
        }

        // Documents in the ledger but no longer on disk.
        let present: HashSet<&str> = outcome
            .documents
            .iter()
            .map(|d| d.doc_id.as_str())
            .collect();
        for record in self.versions.list_all().await? {
            if present.contains(record.doc_id.as_str()) {
                continue;
            }
            self.remove_document(&record).await?;
            report.removed_documents += 1;
        }

        for document in &outcome.documents {
            let existing = self.versions.get_version(&document.doc_id).await?;
            if existing
                .as_ref()
                .is_some_and(|r| r.version_hash == document.version_hash)
            {
                debug!(doc_id = document.doc_id, "unchanged, skipping");
                continue;
            }

            match self.index_document(document, existing.as_ref()).await {
                Ok(chunk_count) => {
                    if existing.is_some() {
                        report.updated_documents += 1;
                    } else {
                        report.new_documents += 1;
                    }
                    info!(
                        doc_id = document.doc_id,
                        chunks = chunk_count,
                        update = existing.is_some(),
                        "indexed document"
                    );
                }
                Err(failure) => {
                    warn!(
                        doc_id = failure.doc_id,
                        stage = ?failure.stage,
                        message = failure.message,
                        "document failed, keeping previous state"
                    );
                    report.failures.push(failure);
                }
            }
        }

        report.total_chunks = self.dense.count().await?;
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            new = report.new_documents,
            updated = report.updated_documents,
            removed = report.removed_documents,
            total_chunks = report.total_chunks,
            failures = report.failures.len(),
            elapsed_ms = report.elapsed_ms,
            "ingestion run complete"
        );
        Ok(report)
    }

    /// Discard the ledger and both indexes, then ingest everything from
    /// scratch. The recovery path for a corrupt or doubted index.
    pub async fn reindex_full(&self) -> Result<IngestReport> {
        info!("full reindex requested, clearing all state");
        self.dense.clear().await?;
        self.sparse.write().await.clear();
        self.versions.clear().await?;
        self.ingest_incremental().await
    }

    /// Run one document through parse, chunk, embed, index. The ledger row is
    /// written only after everything else succeeded.
    async fn index_document(
        &self,
        document: &ScannedDocument,
        existing: Option<&VersionRecord>,
    ) -> std::result::Result<usize, IngestFailure> {
        let fail = |stage: IngestStage, message: String| IngestFailure {
            doc_id: document.doc_id.clone(),
            stage,
            message,
        };

        let parsed = self
            .parser
            .parse(&document.absolute_path, document.doc_type)
            .await
            .map_err(|e| fail(IngestStage::Parse, e.to_string()))?;

        // Chunk page by page; the ordinal runs across the whole document.
        let mut chunks: Vec<Chunk> = Vec::new();
        for page in &parsed.pages {
            for span in self.chunker.chunk(&page.text) {
                let chunk_index = chunks.len();
                let meta = ChunkMeta {
                    doc_id: document.doc_id.clone(),
                    title: parsed.title.clone(),
                    source_path: document.doc_id.clone(),
                    doc_type: document.doc_type,
                    version_hash: document.version_hash,
                    chunk_index,
                    page: page.page,
                };
                chunks.push(Chunk {
                    chunk_id: Chunk::id_for(&document.doc_id, page.page, chunk_index),
                    text: span.text,
                    meta,
                    embedding: None,
                });
            }
        }

        if !chunks.is_empty() {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let batch = self
                .embedder
                .embed_batch(&texts)
                .await
                .map_err(|e| fail(IngestStage::Embed, e.to_string()))?;
            if batch.len() != chunks.len() {
                return Err(fail(
                    IngestStage::Embed,
                    format!(
                        "provider returned {} embeddings for {} chunks",
                        batch.len(),
                        chunks.len()
                    ),
                ));
            }
            for (chunk, embedding) in chunks.iter_mut().zip(batch.embeddings) {
                chunk.embedding =
                    Some(embedding.into_iter().map(half::f16::from_f32).collect());
            }
        }

        // One transaction swaps old chunks for new, so concurrent searches
        // never see the document absent mid-update and a crash rolls the
        // whole swap back.
        let removed = self
            .dense
            .replace_document(&document.doc_id, &chunks)
            .await
            .map_err(|e| fail(IngestStage::Index, e.to_string()))?;
        if let Some(record) = existing
            && removed != record.chunk_count
        {
            warn!(
                doc_id = document.doc_id,
                expected = record.chunk_count,
                removed,
                "ledger chunk count disagreed with the index"
            );
        }
        {
            let mut sparse = self.sparse.write().await;
            sparse.delete_by_doc_id(&document.doc_id);
            for chunk in &chunks {
                sparse.add_chunk(&chunk.chunk_id, &chunk.text, chunk.meta.clone());
            }
        }

        self.versions
            .upsert(&document.doc_id, &document.version_hash, chunks.len())
            .await
            .map_err(|e| fail(IngestStage::Index, e.to_string()))?;
        Ok(chunks.len())
    }

    async fn remove_document(&self, record: &VersionRecord) -> Result<()> {
        let removed = self.dense.delete_by_doc_id(&record.doc_id).await?;
        if removed != record.chunk_count {
            warn!(
                doc_id = record.doc_id,
                expected = record.chunk_count,
                removed,
                "ledger chunk count disagreed with the index"
            );
        }
        self.sparse.write().await.delete_by_doc_id(&record.doc_id);
        self.versions.remove(&record.doc_id).await?;
        info!(doc_id = record.doc_id, chunks = removed, "removed document");
        Ok(())
    }
}
