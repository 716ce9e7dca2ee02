//! Error types for the indexer and the store client.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexerError {
    /// Key or database absent (HTTP 4xx other than auth and bad input).
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 5xx from the store; safe to retry for reads.
    #[error("Server error: {0}")]
    Server(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    #[error("Invalid backup set basename: {0}")]
    InvalidBasename(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, IndexerError::NotFound(_))
    }

    /// Transient failures: server-side errors and transport hiccups.
    pub fn is_retryable(&self) -> bool {
        match self {
            IndexerError::Server(_) => true,
            IndexerError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;
