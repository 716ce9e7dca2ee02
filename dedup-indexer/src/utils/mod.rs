//! Utility modules for the indexer.

pub mod errors;
pub mod logger;

pub use errors::{IndexerError, Result};
