//! In-memory BM25 index over chunk text.
//!
//! Rebuilt from the persisted chunk table on startup, then kept in lockstep
//! with the dense index by the indexer. Tokenization is deliberately plain:
//! lowercase runs of alphanumeric characters, no stemming, no stop words.
//! Ranking uses the standard BM25 parameters k1 = 1.2, b = 0.75.

use crate::storage::ChunkMeta;
use std::collections::HashMap;

const K1: f32 = 1.2;
const B: f32 = 0.75;

/// One sparse search result.
#[derive(Debug, Clone)]
pub struct SparseHit {
    pub chunk_id: String,
    /// Raw BM25 score, unbounded above.
    pub score: f32,
    pub text: String,
    pub meta: ChunkMeta,
}

#[derive(Debug, Clone)]
struct IndexedChunk {
    meta: ChunkMeta,
    text: String,
    term_freqs: HashMap<String, u32>,
    len: u32,
}

/// BM25 keyword index, fully in memory.
#[derive(Debug, Default)]
pub struct SparseIndex {
    chunks: HashMap<String, IndexedChunk>,
    /// chunk ids per document, for exact per-document deletion.
    doc_chunks: HashMap<String, Vec<String>>,
    /// Number of chunks containing each term.
    doc_freqs: HashMap<String, u32>,
    total_len: u64,
}

impl SparseIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index one chunk. Re-adding an existing `chunk_id` replaces it.
    pub fn add_chunk(&mut self, chunk_id: &str, text: &str, meta: ChunkMeta) {
        if self.chunks.contains_key(chunk_id) {
            self.remove_chunk(chunk_id);
        }

        let tokens = tokenize(text);
        let len = tokens.len() as u32;
        let mut term_freqs: HashMap<String, u32> = HashMap::new();
        for token in tokens {
            *term_freqs.entry(token).or_insert(0) += 1;
        }
        for term in term_freqs.keys() {
            *self.doc_freqs.entry(term.clone()).or_insert(0) += 1;
        }
        self.total_len += u64::from(len);
        self.doc_chunks
            .entry(meta.doc_id.clone())
            .or_default()
            .push(chunk_id.to_string());
        self.chunks.insert(
            chunk_id.to_string(),
            IndexedChunk {
                meta,
                text: text.to_string(),
                term_freqs,
                len,
            },
        );
    }

    /// BM25 search. Chunks sharing no term with the query are not returned.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<SparseHit> {
        let query_terms = tokenize(query);
        if query_terms.is_empty() || self.chunks.is_empty() {
            return Vec::new();
        }

        let n = self.chunks.len() as f32;
        let avg_len = self.total_len as f32 / n;

        let mut hits = Vec::new();
        for (chunk_id, chunk) in &self.chunks {
            let mut score = 0.0f32;
            for term in &query_terms {
                let Some(&tf) = chunk.term_freqs.get(term) else {
                    continue;
                };
                let df = *self.doc_freqs.get(term).unwrap_or(&0) as f32;
                let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                let tf = tf as f32;
                let dl = chunk.len as f32;
                let tf_component =
                    (tf * (K1 + 1.0)) / (tf + K1 * (1.0 - B) + K1 * B * dl / avg_len);
                score += idf * tf_component;
            }
            if score > 0.0 {
                hits.push(SparseHit {
                    chunk_id: chunk_id.clone(),
                    score,
                    text: chunk.text.clone(),
                    meta: chunk.meta.clone(),
                });
            }
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(top_k);
        hits
    }

    /// Remove every chunk belonging to exactly this document.
    pub fn delete_by_doc_id(&mut self, doc_id: &str) -> usize {
        let Some(chunk_ids) = self.doc_chunks.remove(doc_id) else {
            return 0;
        };
        let removed = chunk_ids.len();
        for chunk_id in chunk_ids {
            self.remove_chunk_stats(&chunk_id);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.doc_chunks.clear();
        self.doc_freqs.clear();
        self.total_len = 0;
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn remove_chunk(&mut self, chunk_id: &str) {
        let Some(doc_id) = self.chunks.get(chunk_id).map(|c| c.meta.doc_id.clone()) else {
            return;
        };
        if let Some(ids) = self.doc_chunks.get_mut(&doc_id) {
            ids.retain(|id| id != chunk_id);
            if ids.is_empty() {
                self.doc_chunks.remove(&doc_id);
            }
        }
        self.remove_chunk_stats(chunk_id);
    }

    /// Drop one chunk and undo its contribution to the corpus statistics.
    fn remove_chunk_stats(&mut self, chunk_id: &str) {
        let Some(chunk) = self.chunks.remove(chunk_id) else {
            return;
        };
        self.total_len -= u64::from(chunk.len);
        for term in chunk.term_freqs.keys() {
            if let Some(df) = self.doc_freqs.get_mut(term) {
                *df -= 1;
                if *df == 0 {
                    self.doc_freqs.remove(term);
                }
            }
        }
    }
}

/// Lowercased runs of alphanumeric characters.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}
