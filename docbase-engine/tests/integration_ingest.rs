//! End-to-end tests: a real directory, the full pipeline, real queries.

use std::sync::Arc;

use anyhow::Result;
use docbase_embed::HashedEmbeddingProvider;
use docbase_engine::{EngineConfig, KbIndexer};
use tempfile::tempdir;

async fn open_memory(root: &std::path::Path) -> Result<KbIndexer> {
    let config = EngineConfig::new(root);
    let embedder = Arc::new(HashedEmbeddingProvider::new(256)?);
    KbIndexer::open_memory(config, embedder).await
}

#[tokio::test]
async fn ingest_query_delete_requery() -> Result<()> {
    let dir = tempdir()?;
    tokio::fs::write(
        dir.path().join("a.md"),
        "The deployment process requires admin privileges.",
    )
    .await?;
    tokio::fs::write(
        dir.path().join("b.md"),
        "Coffee machines are on the third floor.",
    )
    .await?;

    let indexer = open_memory(dir.path()).await?;
    let report = indexer.ingest_incremental().await?;
    assert_eq!(report.new_documents, 2);

    let retriever = indexer.retriever();
    let outcome = retriever
        .search("How do I get admin privileges for deployment?", None)
        .await?;
    let hits = outcome.hits();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].meta.doc_id, "a.md");

    // Remove the coffee document and re-ingest.
    tokio::fs::remove_file(dir.path().join("b.md")).await?;
    let report = indexer.ingest_incremental().await?;
    assert_eq!(
        (
            report.new_documents,
            report.updated_documents,
            report.removed_documents
        ),
        (0, 0, 1)
    );

    // Nothing left knows about coffee.
    let outcome = retriever.search("coffee", None).await?;
    assert!(outcome.is_no_hit());
    Ok(())
}

#[tokio::test]
async fn reingesting_an_unchanged_tree_changes_nothing() -> Result<()> {
    let dir = tempdir()?;
    tokio::fs::write(dir.path().join("a.md"), "stable content").await?;
    tokio::fs::create_dir_all(dir.path().join("guides")).await?;
    tokio::fs::write(dir.path().join("guides/b.txt"), "nested content").await?;

    let indexer = open_memory(dir.path()).await?;
    let first = indexer.ingest_incremental().await?;
    assert_eq!(first.new_documents, 2);

    let second = indexer.ingest_incremental().await?;
    assert_eq!(
        (
            second.new_documents,
            second.updated_documents,
            second.removed_documents
        ),
        (0, 0, 0)
    );
    assert_eq!(second.total_chunks, first.total_chunks);
    Ok(())
}

#[tokio::test]
async fn touching_one_byte_updates_exactly_one_document() -> Result<()> {
    let dir = tempdir()?;
    tokio::fs::write(dir.path().join("a.md"), "release checklist v1").await?;
    tokio::fs::write(dir.path().join("b.md"), "unrelated notes").await?;

    let indexer = open_memory(dir.path()).await?;
    indexer.ingest_incremental().await?;

    tokio::fs::write(dir.path().join("a.md"), "release checklist v2").await?;
    let report = indexer.ingest_incremental().await?;
    assert_eq!(report.updated_documents, 1);
    assert_eq!(report.new_documents, 0);

    // The updated content is retrievable, the old content is not.
    let retriever = indexer.retriever();
    let outcome = retriever.search("release checklist", None).await?;
    assert!(outcome.hits().iter().any(|h| h.text.contains("v2")));
    assert!(!outcome.hits().iter().any(|h| h.text.contains("v1")));
    Ok(())
}

#[tokio::test]
async fn search_works_after_reopen_without_reingesting() -> Result<()> {
    let dir = tempdir()?;
    let docs = dir.path().join("docs");
    tokio::fs::create_dir_all(&docs).await?;
    tokio::fs::write(
        docs.join("runbook.md"),
        "Restart the ingestion service with systemctl.",
    )
    .await?;
    let ledger = dir.path().join("ledger.db");

    let embedder = Arc::new(HashedEmbeddingProvider::new(256)?);
    {
        let config = EngineConfig::new(&docs).with_ledger_path(&ledger);
        let indexer = KbIndexer::open(config, embedder.clone()).await?;
        indexer.ingest_incremental().await?;
    }

    // Fresh process: open against the same ledger, query immediately.
    let config = EngineConfig::new(&docs).with_ledger_path(&ledger);
    let indexer = KbIndexer::open(config, embedder).await?;
    let outcome = indexer
        .retriever()
        .search("restart the ingestion service", None)
        .await?;
    assert_eq!(outcome.hits().first().map(|h| h.meta.doc_id.as_str()), Some("runbook.md"));

    // And the ledger still knows nothing changed.
    let report = indexer.ingest_incremental().await?;
    assert_eq!(report.new_documents + report.updated_documents, 0);
    Ok(())
}

#[tokio::test]
async fn reindex_full_recovers_a_cleared_state() -> Result<()> {
    let dir = tempdir()?;
    tokio::fs::create_dir_all(dir.path().join("a/b")).await?;
    tokio::fs::write(dir.path().join("a/b/deep.md"), "deeply nested document").await?;
    tokio::fs::write(dir.path().join("top.txt"), "top level document").await?;

    let indexer = open_memory(dir.path()).await?;
    indexer.ingest_incremental().await?;

    let report = indexer.reindex_full().await?;
    assert_eq!(report.new_documents, 2);

    let records = indexer.version_status().await?;
    let ids: Vec<&str> = records.iter().map(|r| r.doc_id.as_str()).collect();
    assert_eq!(ids, vec!["a/b/deep.md", "top.txt"]);
    Ok(())
}

#[tokio::test]
async fn long_documents_chunk_with_overlap_and_stay_retrievable() -> Result<()> {
    let dir = tempdir()?;
    let body = "Kubernetes deployment rollout strategies. ".repeat(60);
    tokio::fs::write(dir.path().join("long.md"), &body).await?;

    let config = EngineConfig::new(dir.path())
        .with_chunk_size(200)
        .with_chunk_overlap(40);
    let embedder = Arc::new(HashedEmbeddingProvider::new(256)?);
    let indexer = KbIndexer::open_memory(config, embedder).await?;

    let report = indexer.ingest_incremental().await?;
    assert!(report.total_chunks > 5);

    let outcome = indexer
        .retriever()
        .search("kubernetes rollout strategies", Some(3))
        .await?;
    assert_eq!(outcome.hits().len(), 3);
    assert!(outcome.hits().iter().all(|h| h.meta.doc_id == "long.md"));
    // Deterministic ids: doc id plus ordinal.
    assert!(outcome.hits().iter().all(|h| h.chunk_id.starts_with("long.md:")));
    Ok(())
}

#[tokio::test]
async fn unsupported_files_are_invisible() -> Result<()> {
    let dir = tempdir()?;
    tokio::fs::write(dir.path().join("code.rs"), "fn main() {}").await?;
    tokio::fs::write(dir.path().join("data.json"), "{}").await?;
    tokio::fs::write(dir.path().join("real.md"), "actual document").await?;

    let indexer = open_memory(dir.path()).await?;
    let report = indexer.ingest_incremental().await?;
    assert_eq!(report.new_documents, 1);
    assert!(report.failures.is_empty());
    Ok(())
}
