//! # docbase-context
//!
//! Deterministic text segmentation for the docbase retrieval engine.
//!
//! Documents are split into overlapping fixed-size windows of *characters*
//! (never bytes), so a chunk boundary can never land inside a multi-byte
//! character. The same `(text, chunk_size, overlap)` input always produces a
//! byte-identical list of chunks, which is what makes re-ingesting unchanged
//! content a no-op upstream.
//!
//! ## Quick Start
//!
//! ```
//! use docbase_context::{ChunkingConfig, TextChunker};
//!
//! let config = ChunkingConfig::new(20, 5).unwrap();
//! let chunker = TextChunker::new(config);
//!
//! let spans = chunker.chunk("The deployment process requires admin privileges.");
//! assert!(!spans.is_empty());
//! assert_eq!(spans[0].sequence, 0);
//! ```
//!
//! Invalid window geometry (`overlap >= chunk_size`, or a zero-sized window)
//! is rejected when the [`ChunkingConfig`] is constructed, not when chunking
//! runs.

pub mod text;

pub use text::{ChunkingConfig, ChunkingError, TextChunker, TextSpan};
