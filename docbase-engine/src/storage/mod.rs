//! Shared data model and SQLite storage for the engine.
//!
//! Every entity the pipeline passes around is a fixed struct with named,
//! typed fields: document identity, chunk metadata, and version records are
//! never loosely-typed maps. Optional attributes (a PDF page number) are
//! `Option`, not absent keys.
//!
//! ## Key types
//!
//! - **DocType**: supported source formats
//! - **ChunkMeta** / **Chunk**: the indexed unit and its provenance
//! - **VersionRecord**: one ledger entry per document
//! - **[`sqlite::StoreHandle`]**: the shared SQLite pool behind the version
//!   ledger and the persisted chunk table

use serde::{Deserialize, Serialize};

pub mod sqlite;

/// Blake3 hash of a document's byte content (32 bytes).
pub type VersionHash = [u8; 32];

/// Supported document formats, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Pdf,
    Txt,
    Md,
}

impl DocType {
    /// Map an extension (case-insensitive) to a doc type.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Txt),
            "md" => Some(Self::Md),
            _ => None,
        }
    }

    /// Doc type for a path, if the extension is supported.
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Txt => "txt",
            Self::Md => "md",
        }
    }

    /// Inverse of [`as_str`](Self::as_str), used when reading rows back.
    pub fn parse(s: &str) -> Option<Self> {
        Self::from_extension(s)
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance carried by every chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    /// Stable document identifier (normalized relative path).
    pub doc_id: String,
    /// Document title (PDF metadata or filename-derived).
    pub title: String,
    /// Path of the source file relative to the document root.
    pub source_path: String,
    pub doc_type: DocType,
    /// Content hash of the document version this chunk was cut from.
    pub version_hash: VersionHash,
    /// 0-based ordinal of this chunk within the document.
    pub chunk_index: usize,
    /// Source page for PDF chunks.
    pub page: Option<u32>,
}

/// One indexed segment of a document.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Unique, deterministic id: `"{doc_id}:{chunk_index}"`, or
    /// `"{doc_id}#p{page}:{chunk_index}"` for PDF chunks.
    pub chunk_id: String,
    pub text: String,
    pub meta: ChunkMeta,
    /// f16 embedding vector, present once the embedder has run.
    pub embedding: Option<Vec<half::f16>>,
}

impl Chunk {
    /// Derive the chunk id from its document, page, and ordinal.
    pub fn id_for(doc_id: &str, page: Option<u32>, chunk_index: usize) -> String {
        match page {
            Some(page) => format!("{doc_id}#p{page}:{chunk_index}"),
            None => format!("{doc_id}:{chunk_index}"),
        }
    }
}

/// One ledger entry: the last successfully indexed version of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub doc_id: String,
    pub version_hash: VersionHash,
    /// Unix timestamp (seconds) of the last successful indexing.
    pub last_indexed_at: i64,
    /// Number of chunks the document produced.
    pub chunk_count: usize,
}

impl VersionRecord {
    /// Hash rendered as hex, for logs and status output.
    pub fn version_hex(&self) -> String {
        hex::encode(self.version_hash)
    }
}
