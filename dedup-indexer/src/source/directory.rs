//! Backup-set source backed by a directory of `<basename>.json` manifests.

use super::{BackupSet, BackupSetSource};
use crate::utils::errors::{IndexerError, Result};
use std::path::PathBuf;
use tracing::debug;

pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl BackupSetSource for DirectorySource {
    async fn list(&self, hostname: &str) -> Result<Vec<String>> {
        let prefix = format!("{hostname}_");
        let mut basenames = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(basename) = name.strip_suffix(".json") {
                if basename.starts_with(&prefix) {
                    basenames.push(basename.to_string());
                }
            }
        }
        basenames.sort();
        debug!("Found {} manifests for {} in {}", basenames.len(), hostname, self.dir.display());
        Ok(basenames)
    }

    async fn fetch(&self, basename: &str) -> Result<BackupSet> {
        let path = self.dir.join(format!("{basename}.json"));
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IndexerError::NotFound(path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        BackupSet::from_json(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lists_only_matching_host() {
        let tmp = tempfile::tempdir().unwrap();
        for name in [
            "nas01_daily_2017-01-02T00:00:00",
            "nas01_daily_2017-01-01T00:00:00",
            "web02_daily_2017-01-01T00:00:00",
        ] {
            let body = format!(r#"{{"basename": "{name}", "filedata": {{}}}}"#);
            std::fs::write(tmp.path().join(format!("{name}.json")), body).unwrap();
        }
        std::fs::write(tmp.path().join("notes.txt"), "x").unwrap();

        let source = DirectorySource::new(tmp.path());
        let listed = source.list("nas01").await.unwrap();
        assert_eq!(
            listed,
            vec!["nas01_daily_2017-01-01T00:00:00", "nas01_daily_2017-01-02T00:00:00"]
        );

        let set = source.fetch(&listed[0]).await.unwrap();
        assert_eq!(set.info.hostname, "nas01");
        assert!(set.filedata.is_empty());

        let missing = source.fetch("nas01_daily_2020-01-01T00:00:00").await.unwrap_err();
        assert!(missing.is_not_found());
    }
}
