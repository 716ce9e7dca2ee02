//! Backup-set source reached over HTTP.
//!
//! `GET {url}/backupsets/{hostname}` lists backup sets,
//! `GET {url}/backupset/{basename}` returns one manifest.

use super::{BackupSet, BackupSetSource, ListingEntry};
use crate::utils::errors::{IndexerError, Result};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::info;

pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("dedup-indexer/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{}", self.url, path);
        let resp = self.client.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(IndexerError::NotFound(url));
        }
        let resp = resp.error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }
}

impl BackupSetSource for HttpSource {
    async fn list(&self, hostname: &str) -> Result<Vec<String>> {
        let body = self.get_bytes(&format!("backupsets/{hostname}")).await?;
        let entries: Vec<ListingEntry> = serde_json::from_slice(&body)?;
        info!("Source lists {} backup sets for {}", entries.len(), hostname);
        Ok(entries.into_iter().map(|e| e.basename).collect())
    }

    async fn fetch(&self, basename: &str) -> Result<BackupSet> {
        let body = self.get_bytes(&format!("backupset/{basename}")).await?;
        BackupSet::from_json(&body)
    }
}
