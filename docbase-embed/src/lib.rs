//! # docbase-embed
//!
//! The embedder boundary of the docbase retrieval engine. The engine is
//! handed an [`EmbeddingProvider`] and never chooses or owns the embedding
//! model itself; this crate defines that contract plus a deterministic local
//! provider for setups that have no model available.
//!
//! ## Quick Start
//!
//! ```
//! use docbase_embed::{EmbeddingProvider, HashedEmbeddingProvider};
//!
//! # async fn example() -> docbase_embed::Result<()> {
//! let provider = HashedEmbeddingProvider::new(256)?;
//!
//! let texts = vec!["Hello world".to_string(), "How are you?".to_string()];
//! let batch = provider.embed_batch(&texts).await?;
//!
//! assert_eq!(batch.len(), 2);
//! assert_eq!(batch.dimension, 256);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`provider`]: the [`EmbeddingProvider`] trait, [`EmbeddingBatch`], and
//!   the feature-hashing [`HashedEmbeddingProvider`]
//! - [`error`]: [`EmbedError`] and the crate [`Result`] alias
//!
//! Real model backends (ONNX, remote APIs) live outside the engine and plug
//! in through the same trait.

pub mod error;
pub mod provider;

pub use error::{EmbedError, Result};
pub use provider::{EmbeddingBatch, EmbeddingProvider, HashedEmbeddingProvider};
