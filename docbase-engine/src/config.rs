//! Engine configuration.
//!
//! All knobs the surrounding application can turn live here: the document
//! root, the ledger location, chunking geometry, hybrid weights, the no-hit
//! threshold, and the default result count. Configs are built in code with
//! the `with_*` methods or loaded from a TOML file.

use anyhow::{Context, Result};
use docbase_context::{ChunkingConfig, ChunkingError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_chunk_size() -> usize {
    800
}
fn default_chunk_overlap() -> usize {
    120
}
fn default_dense_weight() -> f32 {
    0.6
}
fn default_sparse_weight() -> f32 {
    0.4
}
fn default_no_hit_threshold() -> f32 {
    0.25
}
fn default_top_k() -> usize {
    8
}

/// Configuration for the ingestion and retrieval engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory tree to scan for documents.
    pub root: PathBuf,
    /// Location of the SQLite ledger; defaults to `<root>/.docbase.db`.
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,
    /// Characters per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Weight of the dense (embedding) signal in the hybrid merge.
    #[serde(default = "default_dense_weight")]
    pub dense_weight: f32,
    /// Weight of the sparse (BM25) signal in the hybrid merge.
    #[serde(default = "default_sparse_weight")]
    pub sparse_weight: f32,
    /// Final scores below this return a no-hit instead of weak results.
    #[serde(default = "default_no_hit_threshold")]
    pub no_hit_threshold: f32,
    /// Result count used when a query does not specify one.
    #[serde(default = "default_top_k")]
    pub top_k_default: usize,
}

impl EngineConfig {
    /// Create a configuration for the given document root with defaults for
    /// everything else.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ledger_path: None,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            dense_weight: default_dense_weight(),
            sparse_weight: default_sparse_weight(),
            no_hit_threshold: default_no_hit_threshold(),
            top_k_default: default_top_k(),
        }
    }

    /// Load a configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_ledger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ledger_path = Some(path.into());
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_chunk_overlap(mut self, overlap: usize) -> Self {
        self.chunk_overlap = overlap;
        self
    }

    pub fn with_weights(mut self, dense: f32, sparse: f32) -> Self {
        self.dense_weight = dense;
        self.sparse_weight = sparse;
        self
    }

    pub fn with_no_hit_threshold(mut self, threshold: f32) -> Self {
        self.no_hit_threshold = threshold;
        self
    }

    pub fn with_top_k_default(mut self, top_k: usize) -> Self {
        self.top_k_default = top_k;
        self
    }

    /// Resolved ledger location.
    pub fn ledger_path(&self) -> PathBuf {
        self.ledger_path
            .clone()
            .unwrap_or_else(|| self.root.join(".docbase.db"))
    }

    /// Chunking geometry, validated.
    pub fn chunking(&self) -> std::result::Result<ChunkingConfig, ChunkingError> {
        ChunkingConfig::new(self.chunk_size, self.chunk_overlap)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.chunking()
            .map_err(|e| anyhow::anyhow!("invalid chunking configuration: {e}"))?;
        if self.dense_weight < 0.0 || self.sparse_weight < 0.0 {
            anyhow::bail!("retrieval weights must be non-negative");
        }
        if self.dense_weight + self.sparse_weight <= 0.0 {
            anyhow::bail!("at least one retrieval weight must be positive");
        }
        if self.top_k_default == 0 {
            anyhow::bail!("top_k_default must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::new("/tmp/docs");
        assert!(config.validate().is_ok());
        assert_eq!(config.ledger_path(), PathBuf::from("/tmp/docs/.docbase.db"));
    }

    #[test]
    fn overlap_at_least_chunk_size_is_rejected() {
        let config = EngineConfig::new("/tmp/docs")
            .with_chunk_size(100)
            .with_chunk_overlap(100);
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_weights_are_rejected() {
        let config = EngineConfig::new("/tmp/docs").with_weights(0.0, 0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_partial_toml_with_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("docbase.toml");
        std::fs::write(
            &path,
            r#"
root = "/srv/kb/docs"
chunk_size = 500
no_hit_threshold = 0.4
"#,
        )?;
        let config = EngineConfig::from_toml_file(&path)?;
        assert_eq!(config.root, PathBuf::from("/srv/kb/docs"));
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, default_chunk_overlap());
        assert!((config.no_hit_threshold - 0.4).abs() < f32::EPSILON);
        Ok(())
    }
}
