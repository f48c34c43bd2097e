//! Weighted fusion of the dense and sparse signals.
//!
//! Each query fans out to both indexes for an over-fetched candidate set,
//! then the two scores are merged per chunk:
//!
//! - the dense signal is cosine similarity against unit-ish vectors, already
//!   bounded; negative similarity is clamped to zero
//! - BM25 is unbounded, so it is min-max normalized within the candidate set
//!
//! The final score is the weighted mean of the two, which keeps it in
//! `[0, 1]` and lets an absolute no-hit threshold mean something. Normalizing
//! the dense signal min-max as well would pin the best candidate at 1.0 for
//! every query, making "nothing here is relevant" undetectable.

use crate::retrieval::dense_index::DenseIndex;
use crate::retrieval::sparse_index::SparseIndex;
use crate::storage::ChunkMeta;
use anyhow::Result;
use docbase_embed::EmbeddingProvider;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Over-fetch factor: each index is asked for this many times `top_k`
/// candidates so fusion can promote chunks that rank mid-list in one signal
/// but high in the other.
const CANDIDATE_MULTIPLIER: usize = 4;

/// One fused search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub text: String,
    pub meta: ChunkMeta,
    /// Clamped cosine similarity, `[0, 1]`.
    pub dense_score: f32,
    /// BM25 score min-max normalized within this query's candidates.
    pub sparse_score: f32,
    /// Weighted mean of the two signals.
    pub score: f32,
}

/// Outcome of a query: ranked hits, or an explicit signal that nothing in
/// the knowledge base cleared the relevance threshold.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "hits", rename_all = "snake_case")]
pub enum SearchOutcome {
    Hits(Vec<SearchHit>),
    NoHit,
}

impl SearchOutcome {
    pub fn hits(&self) -> &[SearchHit] {
        match self {
            Self::Hits(hits) => hits,
            Self::NoHit => &[],
        }
    }

    pub fn is_no_hit(&self) -> bool {
        matches!(self, Self::NoHit)
    }
}

/// Hybrid dense + sparse retriever over a shared pair of indexes.
#[derive(Clone)]
pub struct HybridRetriever {
    dense: DenseIndex,
    sparse: Arc<RwLock<SparseIndex>>,
    embedder: Arc<dyn EmbeddingProvider>,
    dense_weight: f32,
    sparse_weight: f32,
    no_hit_threshold: f32,
    top_k_default: usize,
}

impl HybridRetriever {
    pub fn new(
        dense: DenseIndex,
        sparse: Arc<RwLock<SparseIndex>>,
        embedder: Arc<dyn EmbeddingProvider>,
        dense_weight: f32,
        sparse_weight: f32,
        no_hit_threshold: f32,
        top_k_default: usize,
    ) -> Self {
        Self {
            dense,
            sparse,
            embedder,
            dense_weight,
            sparse_weight,
            no_hit_threshold,
            top_k_default,
        }
    }

    /// Run a query against both indexes and fuse the results.
    ///
    /// `top_k: None` uses the configured default. Returns
    /// [`SearchOutcome::NoHit`] when the best fused score falls below the
    /// threshold; otherwise the full truncated list comes back, including
    /// weaker tail results.
    pub async fn search(&self, query: &str, top_k: Option<usize>) -> Result<SearchOutcome> {
        let top_k = top_k.unwrap_or(self.top_k_default);
        if top_k == 0 || query.trim().is_empty() {
            return Ok(SearchOutcome::NoHit);
        }
        let candidate_k = top_k.saturating_mul(CANDIDATE_MULTIPLIER);

        let query_embedding = self.embedder.embed_text(query).await?;
        let dense_hits = self.dense.search(&query_embedding, candidate_k).await?;
        let sparse_hits = {
            let sparse = self.sparse.read().await;
            sparse.search(query, candidate_k)
        };
        debug!(
            query,
            dense_candidates = dense_hits.len(),
            sparse_candidates = sparse_hits.len(),
            "gathered hybrid candidates"
        );

        // chunk_id -> (dense clamped, sparse raw, text, meta)
        let mut candidates: HashMap<String, (f32, f32, String, ChunkMeta)> = HashMap::new();
        for hit in dense_hits {
            candidates.insert(hit.chunk_id, (hit.score.max(0.0), 0.0, hit.text, hit.meta));
        }
        for hit in sparse_hits {
            candidates
                .entry(hit.chunk_id)
                .and_modify(|entry| entry.1 = hit.score)
                .or_insert((0.0, hit.score, hit.text, hit.meta));
        }
        if candidates.is_empty() {
            return Ok(SearchOutcome::NoHit);
        }

        let sparse_max = candidates
            .values()
            .map(|c| c.1)
            .fold(f32::NEG_INFINITY, f32::max);
        let sparse_min = candidates.values().map(|c| c.1).fold(f32::INFINITY, f32::min);
        let normalize_sparse = |raw: f32| -> f32 {
            if raw <= 0.0 {
                0.0
            } else if (sparse_max - sparse_min).abs() < f32::EPSILON {
                1.0
            } else {
                (raw - sparse_min) / (sparse_max - sparse_min)
            }
        };

        let weight_sum = self.dense_weight + self.sparse_weight;
        let mut hits: Vec<SearchHit> = candidates
            .into_iter()
            .map(|(chunk_id, (dense_score, sparse_raw, text, meta))| {
                let sparse_score = normalize_sparse(sparse_raw);
                let score = (self.dense_weight * dense_score
                    + self.sparse_weight * sparse_score)
                    / weight_sum;
                SearchHit {
                    chunk_id,
                    text,
                    meta,
                    dense_score,
                    sparse_score,
                    score,
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(top_k);

        // The threshold judges the best candidate only: a strong top hit
        // carries its weaker tail, while a weak top hit means the corpus has
        // nothing relevant at all.
        match hits.first().map(|best| best.score) {
            Some(best) if best >= self.no_hit_threshold => Ok(SearchOutcome::Hits(hits)),
            _ => Ok(SearchOutcome::NoHit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::StoreHandle;
    use crate::storage::{Chunk, DocType};
    use async_trait::async_trait;
    use docbase_embed::{EmbedError, EmbeddingBatch};

    /// Embedder with a fixed vocabulary: known texts map to fixed axes, so
    /// cosine scores in tests are exact.
    struct StaticEmbedder;

    impl StaticEmbedder {
        fn vector_for(text: &str) -> Vec<f32> {
            let lower = text.to_lowercase();
            // "deployment" and "rollout" share an axis: lexically disjoint,
            // semantically neighbors as far as this embedder is concerned.
            if lower.contains("deployment") || lower.contains("rollout") {
                vec![1.0, 0.0, 0.0]
            } else if lower.contains("coffee") {
                vec![0.0, 1.0, 0.0]
            } else {
                vec![0.0, 0.0, 1.0]
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for StaticEmbedder {
        async fn embed_batch(
            &self,
            texts: &[String],
        ) -> std::result::Result<EmbeddingBatch, EmbedError> {
            Ok(EmbeddingBatch::new(
                texts.iter().map(|t| Self::vector_for(t)).collect(),
            ))
        }

        fn embedding_dimension(&self) -> usize {
            3
        }

        fn provider_name(&self) -> &str {
            "static"
        }
    }

    fn meta(doc_id: &str) -> ChunkMeta {
        ChunkMeta {
            doc_id: doc_id.to_string(),
            title: doc_id.to_string(),
            source_path: doc_id.to_string(),
            doc_type: DocType::Md,
            version_hash: [0; 32],
            chunk_index: 0,
            page: None,
        }
    }

    async fn retriever_with(corpus: &[(&str, &str)]) -> Result<HybridRetriever> {
        retriever_with_params(corpus, 0.6, 0.4, 0.25).await
    }

    async fn retriever_with_params(
        corpus: &[(&str, &str)],
        dense_weight: f32,
        sparse_weight: f32,
        no_hit_threshold: f32,
    ) -> Result<HybridRetriever> {
        let handle = StoreHandle::open_memory().await?;
        let dense = DenseIndex::new(handle.pool().clone());
        let mut sparse = SparseIndex::new();

        let mut chunks = Vec::new();
        for (doc_id, text) in corpus {
            let chunk_id = Chunk::id_for(doc_id, None, 0);
            sparse.add_chunk(&chunk_id, text, meta(doc_id));
            chunks.push(Chunk {
                chunk_id,
                text: text.to_string(),
                meta: meta(doc_id),
                embedding: Some(
                    StaticEmbedder::vector_for(text)
                        .into_iter()
                        .map(half::f16::from_f32)
                        .collect(),
                ),
            });
        }
        dense.add(&chunks).await?;

        Ok(HybridRetriever::new(
            dense,
            Arc::new(RwLock::new(sparse)),
            Arc::new(StaticEmbedder),
            dense_weight,
            sparse_weight,
            no_hit_threshold,
            8,
        ))
    }

    #[tokio::test]
    async fn relevant_document_ranks_first() -> Result<()> {
        let retriever = retriever_with(&[
            ("a.md", "The deployment process requires admin privileges."),
            ("b.md", "Coffee machines are on the third floor."),
        ])
        .await?;

        let outcome = retriever
            .search("how do I get deployment privileges", None)
            .await?;
        let hits = outcome.hits();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].meta.doc_id, "a.md");
        assert!(hits[0].dense_score > 0.9);
        assert!(hits[0].sparse_score > 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn unrelated_query_is_a_no_hit() -> Result<()> {
        let retriever = retriever_with(&[(
            "a.md",
            "The deployment process requires admin privileges.",
        )])
        .await?;

        let outcome = retriever.search("quarterly tax filings", None).await?;
        assert!(outcome.is_no_hit());
        Ok(())
    }

    #[tokio::test]
    async fn empty_query_is_a_no_hit() -> Result<()> {
        let retriever = retriever_with(&[("a.md", "deployment notes")]).await?;
        assert!(retriever.search("   ", None).await?.is_no_hit());
        Ok(())
    }

    #[tokio::test]
    async fn top_k_truncates_the_result_list() -> Result<()> {
        let retriever = retriever_with(&[
            ("a.md", "deployment one"),
            ("b.md", "deployment two"),
            ("c.md", "deployment three"),
        ])
        .await?;

        let outcome = retriever.search("deployment", Some(2)).await?;
        assert_eq!(outcome.hits().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn scores_stay_within_unit_interval() -> Result<()> {
        let retriever = retriever_with(&[
            ("a.md", "The deployment process requires admin privileges."),
            ("b.md", "Deployment checklists and deployment runbooks."),
        ])
        .await?;

        let outcome = retriever.search("deployment", None).await?;
        for hit in outcome.hits() {
            assert!((0.0..=1.0).contains(&hit.score), "score {}", hit.score);
            assert!((0.0..=1.0).contains(&hit.dense_score));
            assert!((0.0..=1.0).contains(&hit.sparse_score));
        }
        Ok(())
    }

    #[tokio::test]
    async fn paraphrased_query_wins_on_the_dense_signal_alone() -> Result<()> {
        let retriever = retriever_with(&[
            ("rollout.md", "Rollout procedures for new services."),
            ("coffee.md", "Coffee machines are on the third floor."),
        ])
        .await?;

        // No token of the query appears in either document; only the
        // embedding space connects "deployment" to the rollout text.
        let outcome = retriever.search("deployment", None).await?;
        let hits = outcome.hits();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].meta.doc_id, "rollout.md");
        assert!(hits[0].dense_score > 0.9);
        assert_eq!(hits[0].sparse_score, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn strong_top_hit_carries_its_sub_threshold_tail() -> Result<()> {
        // Sparse-only weights: both documents match the query, the second
        // far more weakly. A list is judged by its best hit, so the weak
        // tail result still comes back.
        let retriever = retriever_with_params(
            &[
                ("a.md", "deployment deployment deployment"),
                ("b.md", "deployment mentioned once among other words"),
            ],
            0.0,
            1.0,
            0.5,
        )
        .await?;

        let outcome = retriever.search("deployment", None).await?;
        let hits = outcome.hits();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].meta.doc_id, "a.md");
        assert!(hits[0].score >= 0.5);
        assert!(hits[1].score < 0.5);
        Ok(())
    }

    #[tokio::test]
    async fn hits_serialize_for_api_consumers() -> Result<()> {
        let retriever = retriever_with(&[(
            "a.md",
            "The deployment process requires admin privileges.",
        )])
        .await?;

        let outcome = retriever.search("deployment", None).await?;
        let json = serde_json::to_value(&outcome)?;
        assert_eq!(json["outcome"], "hits");
        assert_eq!(json["hits"][0]["meta"]["doc_id"], "a.md");

        let no_hit = serde_json::to_value(SearchOutcome::NoHit)?;
        assert_eq!(no_hit["outcome"], "no_hit");
        Ok(())
    }
}
