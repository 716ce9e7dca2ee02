//! Dedup Indexer Library
//!
//! Builds a deduplication index of backup sets in a remote key-value store
//! and answers lookups against it.

pub mod client;
pub mod config;
pub mod indexer;
pub mod search;
pub mod source;
pub mod utils;

// Re-export commonly used types
pub use client::{StoreClient, StoreDatabase};
pub use config::Config;
pub use indexer::{IndexBuilder, Indices, RunSummary};
pub use search::Search;
pub use source::{BackupSet, BackupSetInfo, BackupSetSource};
pub use utils::errors::IndexerError;
pub type Result<T> = std::result::Result<T, IndexerError>;
