//! Read-only lookups against the indices.

use crate::client::{StoreClient, StoreDatabase};
use crate::config::DatabaseNames;
use crate::source::BackupSetInfo;
use crate::utils::errors::Result;
use futures_util::TryStreamExt;

/// A file's checksum history with the newest backup set holding each version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileVersion {
    pub checksum: String,
    pub backupset: Option<BackupSetInfo>,
}

pub struct Search {
    client: StoreClient,
    names: DatabaseNames,
}

impl Search {
    pub fn new(client: StoreClient, names: DatabaseNames) -> Self {
        Self { client, names }
    }

    /// Databases that were never created are treated as empty.
    async fn index(&self, name: &str) -> Result<Option<StoreDatabase>> {
        match self.client.attach(name).await {
            Ok(db) => Ok(Some(db)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Newest backup set containing `checksum`.
    pub async fn checksum(&self, checksum: &str) -> Result<Option<BackupSetInfo>> {
        match self.index(&self.names.checksum_index).await? {
            Some(db) => db.try_get(checksum).await,
            None => Ok(None),
        }
    }

    /// Every checksum `path` has had, oldest first.
    pub async fn file(&self, path: &str) -> Result<Option<Vec<String>>> {
        match self.index(&self.names.file_index).await? {
            Some(db) => db.try_get(path).await,
            None => Ok(None),
        }
    }

    /// [`file`](Self::file) with each checksum resolved through the checksum index.
    pub async fn file_versions(&self, path: &str) -> Result<Option<Vec<FileVersion>>> {
        let Some(checksums) = self.file(path).await? else {
            return Ok(None);
        };
        let checksum_index = self.index(&self.names.checksum_index).await?;
        let mut versions = Vec::with_capacity(checksums.len());
        for checksum in checksums {
            let backupset = match &checksum_index {
                Some(db) => db.try_get(&checksum).await?,
                None => None,
            };
            versions.push(FileVersion {
                checksum,
                backupset,
            });
        }
        Ok(Some(versions))
    }

    /// `(basename, completed_at)` for every logged backup set.
    pub async fn completed(&self) -> Result<Vec<(String, String)>> {
        let Some(db) = self.index(&self.names.progress_log).await? else {
            return Ok(Vec::new());
        };
        let mut entries: Vec<(String, String)> = db.items::<String>().await?.try_collect().await?;
        entries.sort();
        Ok(entries)
    }
}
