//! Embedding provider trait and the deterministic local provider.

use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use fnv::FnvHasher;
use std::hash::Hasher;

/// Result of embedding generation.
#[derive(Debug, Clone)]
pub struct EmbeddingBatch {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Vec<f32>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingBatch {
    /// Create a batch, inferring the dimension from the first vector.
    pub fn new(embeddings: Vec<Vec<f32>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    /// Number of embedding vectors in this batch.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// `true` if this batch contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Trait for embedding providers that can generate embeddings from text.
///
/// The retrieval engine is injected with a provider and never owns the model
/// itself; anything that can turn a batch of texts into fixed-dimension
/// vectors qualifies.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for multiple texts (batch processing)
    async fn embed_batch(&self, texts: &[String]) -> Result<EmbeddingBatch>;

    /// Generate an embedding for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let batch = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        batch
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::invalid_config("provider returned an empty batch"))
    }

    /// Get the dimension of embeddings produced by this provider
    fn embedding_dimension(&self) -> usize;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;
}

/// Deterministic feature-hashing embedder.
///
/// Tokens are lowercased, hashed with FNV into one of `dimension` buckets,
/// and accumulated with a hash-derived sign before L2 normalization, the
/// classic hashing trick. Two texts sharing vocabulary land near each other,
/// which is enough for smoke setups and tests; semantic similarity requires a
/// real model behind [`EmbeddingProvider`].
#[derive(Debug, Clone)]
pub struct HashedEmbeddingProvider {
    dimension: usize,
}

impl HashedEmbeddingProvider {
    /// Create a provider producing vectors of the given dimension.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(EmbedError::invalid_config(
                "embedding dimension must be greater than zero",
            ));
        }
        Ok(Self { dimension })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            let mut hasher = FnvHasher::default();
            hasher.write(token.as_bytes());
            let hash = hasher.finish();
            let bucket = (hash % self.dimension as u64) as usize;
            // A second hash bit decides the sign so collisions tend to cancel
            // rather than pile up.
            let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashedEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        let embeddings = texts.iter().map(|t| self.embed_one(t)).collect();
        Ok(EmbeddingBatch {
            embeddings,
            dimension: self.dimension,
        })
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "hashed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashed_provider_is_deterministic() -> Result<()> {
        let provider = HashedEmbeddingProvider::new(64)?;
        let a = provider.embed_text("deployment requires admin privileges").await?;
        let b = provider.embed_text("deployment requires admin privileges").await?;
        assert_eq!(a, b);
        Ok(())
    }

    #[tokio::test]
    async fn vectors_are_normalized_and_sized() -> Result<()> {
        let provider = HashedEmbeddingProvider::new(32)?;
        let batch = provider
            .embed_batch(&[
                "coffee machines on the third floor".to_string(),
                "deployment process".to_string(),
            ])
            .await?;
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.dimension, 32);
        for embedding in &batch.embeddings {
            assert_eq!(embedding.len(), 32);
            let norm: f32 = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5, "expected unit norm, got {norm}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn shared_vocabulary_scores_higher_than_disjoint() -> Result<()> {
        let provider = HashedEmbeddingProvider::new(128)?;
        let query = provider.embed_text("deployment privileges").await?;
        let related = provider
            .embed_text("the deployment process requires admin privileges")
            .await?;
        let unrelated = provider
            .embed_text("coffee machines are on the third floor")
            .await?;

        let dot = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
        assert!(dot(&query, &related) > dot(&query, &unrelated));
        Ok(())
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(HashedEmbeddingProvider::new(0).is_err());
    }

    #[tokio::test]
    async fn empty_text_embeds_to_zero_vector() -> Result<()> {
        let provider = HashedEmbeddingProvider::new(16)?;
        let v = provider.embed_text("").await?;
        assert!(v.iter().all(|x| *x == 0.0));
        Ok(())
    }
}
