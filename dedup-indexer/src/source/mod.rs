//! Backup sets and the systems that provide them.
//!
//! A backup set is named `hostname_tag_isoTimestamp`; its manifest maps
//! absolute file paths to content checksums.

pub mod directory;
pub mod http;

pub use directory::DirectorySource;
pub use http::HttpSource;

use crate::utils::errors::{IndexerError, Result};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;

/// Summary of a backup set. This is what the checksum index stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSetInfo {
    pub basename: String,
    pub hostname: String,
    pub tag: String,
    pub date: String,
    pub time: String,
    pub datetime: NaiveDateTime,
}

impl BackupSetInfo {
    /// Parse `hostname_tag_isoTimestamp`. Hostnames or tags containing `_`
    /// are rejected rather than guessed at.
    pub fn from_basename(basename: &str) -> Result<Self> {
        let invalid = |why: &str| IndexerError::InvalidBasename(format!("{basename}: {why}"));

        let fields: Vec<&str> = basename.split('_').collect();
        let [hostname, tag, stamp] = fields.as_slice() else {
            return Err(invalid("expected exactly three '_' separated fields"));
        };
        if hostname.is_empty() || tag.is_empty() {
            return Err(invalid("empty hostname or tag"));
        }
        let datetime = parse_timestamp(stamp).ok_or_else(|| invalid("unparsable timestamp"))?;

        Ok(Self {
            basename: basename.to_string(),
            hostname: hostname.to_string(),
            tag: tag.to_string(),
            date: datetime.format("%Y-%m-%d").to_string(),
            time: datetime.format("%H:%M:%S").to_string(),
            datetime,
        })
    }

    pub fn is_newer_than(&self, other: &BackupSetInfo) -> bool {
        self.datetime > other.datetime
    }
}

fn parse_timestamp(stamp: &str) -> Option<NaiveDateTime> {
    stamp
        .parse::<NaiveDateTime>()
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(stamp).ok().map(|dt| dt.naive_local()))
}

/// A full manifest. `filedata` iterates in path order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSet {
    pub info: BackupSetInfo,
    pub filedata: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawFileEntry {
    checksum: String,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    basename: String,
    #[serde(default)]
    filedata: BTreeMap<String, RawFileEntry>,
}

/// Listing entry as served by a source; extra fields are ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct ListingEntry {
    pub basename: String,
}

impl BackupSet {
    pub fn new(basename: &str, filedata: BTreeMap<String, String>) -> Result<Self> {
        Ok(Self {
            info: BackupSetInfo::from_basename(basename)?,
            filedata,
        })
    }

    /// Decode the source wire format:
    /// `{"basename": .., "filedata": {"/abs/path": {"checksum": ..}}}`.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let raw: RawManifest = serde_json::from_slice(bytes)?;
        let filedata = raw
            .filedata
            .into_iter()
            .map(|(path, entry)| (path, entry.checksum))
            .collect();
        Self::new(&raw.basename, filedata)
    }
}

/// External system that knows which backup sets exist and what they contain.
pub trait BackupSetSource: Send + Sync {
    /// Basenames of all backup sets belonging to `hostname`.
    fn list(&self, hostname: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Full manifest of one backup set.
    fn fetch(&self, basename: &str) -> impl Future<Output = Result<BackupSet>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basename() {
        let info = BackupSetInfo::from_basename("nas01_daily_2017-03-04T05:06:07").unwrap();
        assert_eq!(info.hostname, "nas01");
        assert_eq!(info.tag, "daily");
        assert_eq!(info.date, "2017-03-04");
        assert_eq!(info.time, "05:06:07");

        let frac = BackupSetInfo::from_basename("nas01_daily_2017-03-04T05:06:07.250000").unwrap();
        assert!(frac.is_newer_than(&info));
    }

    #[test]
    fn test_rejects_extra_underscores() {
        for bad in [
            "my_host_daily_2017-03-04T05:06:07",
            "nas01_2017-03-04T05:06:07",
            "nas01__2017-03-04T05:06:07",
            "nas01_daily_yesterday",
        ] {
            assert!(
                matches!(BackupSetInfo::from_basename(bad), Err(IndexerError::InvalidBasename(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_manifest_wire_format() {
        let json = br#"{
            "basename": "nas01_daily_2017-03-04T05:06:07",
            "size": 123,
            "filedata": {
                "/etc/hosts": {"checksum": "bbb", "size": 10},
                "/bin/ls": {"checksum": "aaa"}
            }
        }"#;
        let set = BackupSet::from_json(json).unwrap();
        assert_eq!(set.info.tag, "daily");
        let paths: Vec<&str> = set.filedata.keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["/bin/ls", "/etc/hosts"]);
        assert_eq!(set.filedata["/etc/hosts"], "bbb");
    }
}
