//! The ingestion pipeline and both retrieval indexes.
//!
//! Modules mirror the pipeline order: [`scanner`] finds and hashes files,
//! [`parser`] extracts text, [`version_store`] decides what changed,
//! [`dense_index`] and [`sparse_index`] hold the indexed chunks, [`hybrid`]
//! fuses the two signals at query time, and [`indexer`] drives the whole
//! thing.

pub mod dense_index;
pub mod hybrid;
pub mod indexer;
pub mod parser;
pub mod scanner;
pub mod sparse_index;
pub mod version_store;
