//! Engine-level error types.
//!
//! Per-document failures (unreadable files, corrupt PDFs, embedding errors)
//! are recovered locally and aggregated into the ingestion report; they never
//! appear here. This module covers the conditions that must reach the
//! operator instead of being swallowed.

use std::path::PathBuf;

/// Fatal engine conditions.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The version ledger could not be opened or queried. Continuing with an
    /// unreadable ledger would let the indexed chunks drift from the source
    /// documents permanently, so this is surfaced instead of recovered.
    /// `reindex_full` is the prescribed recovery path.
    #[error("version ledger at {path} is unusable: {source}; run a full reindex to rebuild it")]
    VersionStoreCorruption {
        path: PathBuf,
        #[source]
        source: sqlx::Error,
    },
}
