//! # docbase-engine
//!
//! Incremental knowledge-base ingestion and hybrid retrieval over a
//! directory of documents (Markdown, plain text, PDF).
//!
//! The engine scans a document root, detects changed files by content hash,
//! chunks and embeds what changed, and answers queries by fusing a dense
//! (embedding) signal with a sparse (BM25) signal. Everything persistent
//! lives in one SQLite database: the version ledger and the chunk table with
//! its embeddings. The sparse index is in memory and is rebuilt from the
//! chunk table on startup.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use docbase_embed::HashedEmbeddingProvider;
//! use docbase_engine::{EngineConfig, KbIndexer};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = EngineConfig::new("/srv/kb/docs");
//! let embedder = Arc::new(HashedEmbeddingProvider::new(256)?);
//! let indexer = KbIndexer::open(config, embedder).await?;
//!
//! // Bring the index up to date with the directory.
//! let report = indexer.ingest_incremental().await?;
//! println!("{} new, {} updated", report.new_documents, report.updated_documents);
//!
//! // Query it.
//! let retriever = indexer.retriever();
//! let outcome = retriever.search("how do deployments work", None).await?;
//! for hit in outcome.hits() {
//!     println!("{:.3} {} ({})", hit.score, hit.chunk_id, hit.meta.title);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`config`]: [`EngineConfig`], built in code or loaded from TOML
//! - [`storage`]: the shared data model and the SQLite store
//! - [`retrieval`]: the pipeline: scanner, parser, version store, both
//!   indexes, the hybrid retriever, and the [`KbIndexer`] orchestrator
//! - [`error`]: fatal engine conditions
//!
//! Chunking lives in the `docbase-context` crate; the embedder contract and
//! the deterministic local provider live in `docbase-embed`.

pub mod config;
pub mod error;
pub mod retrieval;
pub mod storage;

pub use config::EngineConfig;
pub use error::EngineError;
pub use retrieval::hybrid::{HybridRetriever, SearchHit, SearchOutcome};
pub use retrieval::indexer::{IngestFailure, IngestReport, IngestStage, KbIndexer};
pub use storage::{Chunk, ChunkMeta, DocType, VersionRecord};
