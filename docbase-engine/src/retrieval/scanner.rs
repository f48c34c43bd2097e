//! Recursive document-root scanning with content hashing.
//!
//! The scanner walks the document root, hashes every supported file with
//! blake3, and derives each document's stable id from its relative path.
//! Change detection upstream compares hashes only; filesystem mtimes are
//! never consulted, so results are identical across platforms and across
//! copies of the same tree.

use crate::storage::{DocType, VersionHash};
use anyhow::Result;
use ignore::WalkBuilder;
use itertools::Itertools;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One supported file found under the root.
#[derive(Debug, Clone)]
pub struct ScannedDocument {
    /// Stable identifier: the relative path with components joined by `/`.
    pub doc_id: String,
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    pub doc_type: DocType,
    /// blake3 of the file's byte content.
    pub version_hash: VersionHash,
}

/// A file the scanner had to skip, with the reason.
#[derive(Debug, Clone)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Result of one scan: the documents found plus any skipped files.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub documents: Vec<ScannedDocument>,
    pub skipped: Vec<ScanFailure>,
}

/// Walks a document root and hashes every supported file.
#[derive(Debug, Clone)]
pub struct FileScanner {
    root: PathBuf,
}

impl FileScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scan the root recursively.
    ///
    /// Unreadable files land in `skipped` and are logged; they never abort
    /// the scan. Documents come back sorted by `doc_id`.
    pub async fn scan(&self) -> Result<ScanOutcome> {
        let mut outcome = ScanOutcome::default();

        let mut candidates: Vec<(PathBuf, DocType)> = Vec::new();
        for entry in WalkBuilder::new(&self.root).build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    outcome.skipped.push(ScanFailure {
                        path: self.root.clone(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            if let Some(doc_type) = DocType::from_path(entry.path()) {
                candidates.push((entry.into_path(), doc_type));
            }
        }
        // Walk order depends on the filesystem; sort for determinism.
        candidates.sort_by(|a, b| a.0.cmp(&b.0));

        for (path, doc_type) in candidates {
            let relative_path = match path.strip_prefix(&self.root) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => {
                    warn!(path = %path.display(), "file outside scan root, skipping");
                    continue;
                }
            };
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    let version_hash = *blake3::hash(&bytes).as_bytes();
                    let doc_id = doc_id_from_relative(&relative_path);
                    debug!(doc_id, bytes = bytes.len(), "scanned document");
                    outcome.documents.push(ScannedDocument {
                        doc_id,
                        relative_path,
                        absolute_path: path,
                        doc_type,
                        version_hash,
                    });
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable file");
                    outcome.skipped.push(ScanFailure {
                        path,
                        message: e.to_string(),
                    });
                }
            }
        }

        outcome.documents.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));
        Ok(outcome)
    }
}

/// Derive a document id from a relative path: components joined with `/`
/// regardless of the platform separator. Pure function of the path.
pub fn doc_id_from_relative(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .join("/")
}
