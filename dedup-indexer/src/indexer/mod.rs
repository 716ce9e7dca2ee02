//! Builds the deduplication indices from a host's backup sets.
//!
//! For each backup set not yet in the progress log, the manifest is fetched
//! and every (path, checksum) pair is fanned out to the workers. Once the
//! workers confirm the whole set has been applied, the set is recorded in the
//! progress log, so an interrupted run resumes where it stopped.

mod worker;

pub use worker::ShardStats;

use crate::client::{StoreClient, StoreDatabase};
use crate::config::DatabaseNames;
use crate::source::{BackupSetInfo, BackupSetSource};
use crate::utils::errors::{IndexerError, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use worker::WorkerPool;

/// The three databases the indexer maintains.
#[derive(Clone)]
pub struct Indices {
    /// absolute path → list of checksums, first-seen order
    pub file_index: Arc<StoreDatabase>,
    /// checksum → newest backup set containing it
    pub checksum_index: Arc<StoreDatabase>,
    /// basename → completion timestamp
    pub progress_log: Arc<StoreDatabase>,
}

impl Indices {
    /// Open (creating where missing) all three databases.
    pub async fn open(client: &StoreClient, names: &DatabaseNames) -> Result<Self> {
        Ok(Self {
            file_index: Arc::new(client.open(&names.file_index).await?),
            checksum_index: Arc::new(client.open(&names.checksum_index).await?),
            progress_log: Arc::new(client.open(&names.progress_log).await?),
        })
    }
}

/// What one run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Backup sets fully applied and logged by this run
    pub indexed: Vec<String>,
    /// Already in the progress log
    pub skipped: Vec<String>,
    /// Fetch or item failures; left out of the progress log for the next run
    pub incomplete: Vec<String>,
    /// Basenames that do not parse
    pub invalid: Vec<String>,
    pub items: ShardStats,
}

pub struct IndexBuilder<S> {
    source: S,
    indices: Indices,
    workers: usize,
}

impl<S: BackupSetSource> IndexBuilder<S> {
    pub fn new(source: S, indices: Indices, workers: usize) -> Self {
        Self {
            source,
            indices,
            workers: workers.max(1),
        }
    }

    pub fn indices(&self) -> &Indices {
        &self.indices
    }

    /// Index every backup set of `hostname` that the progress log does not
    /// list yet. Fails only if the backup sets cannot be enumerated or the
    /// progress log cannot be read; per-set problems land in the summary.
    pub async fn run(&self, hostname: &str) -> Result<RunSummary> {
        let started = Instant::now();
        let basenames = self.source.list(hostname).await?;
        let logged = self.indices.progress_log.keys().await?;
        info!(
            "{} backup sets for {}, {} already logged",
            basenames.len(),
            hostname,
            logged.len()
        );

        let mut summary = RunSummary::default();
        let mut pool = WorkerPool::start(self.workers, &self.indices);

        for basename in basenames {
            if logged.contains(&basename) {
                summary.skipped.push(basename);
                continue;
            }
            if let Err(e) = BackupSetInfo::from_basename(&basename) {
                warn!("Skipping backup set: {}", e);
                summary.invalid.push(basename);
                continue;
            }

            let stats = match self.index_backupset(&mut pool, &basename).await {
                Ok(stats) => stats,
                Err(e) => {
                    warn!("Could not index {}: {}", basename, e);
                    summary.incomplete.push(basename);
                    continue;
                }
            };
            summary.items += stats;

            if stats.failed > 0 {
                warn!(
                    "{}: {} of {} updates failed, not logging it",
                    basename,
                    stats.failed,
                    stats.applied + stats.failed
                );
                summary.incomplete.push(basename);
                continue;
            }

            match self.log_completion(&basename).await {
                Ok(()) => summary.indexed.push(basename),
                Err(e) => {
                    warn!("Could not log completion of {}: {}", basename, e);
                    summary.incomplete.push(basename);
                }
            }
        }

        pool.shutdown().await;
        info!(
            "Indexing {} finished in {:?}: {} indexed, {} skipped, {} incomplete, {} invalid",
            hostname,
            started.elapsed(),
            summary.indexed.len(),
            summary.skipped.len(),
            summary.incomplete.len(),
            summary.invalid.len()
        );
        Ok(summary)
    }

    async fn index_backupset(&self, pool: &mut WorkerPool, basename: &str) -> Result<ShardStats> {
        let set = self.source.fetch(basename).await?;
        if set.info.basename != basename {
            return Err(IndexerError::MalformedInput(format!(
                "manifest for {} names {}",
                basename, set.info.basename
            )));
        }

        info!("Indexing {} ({} files)", basename, set.filedata.len());
        let info = Arc::new(set.info);
        for (path, checksum) in set.filedata {
            pool.dispatch(path, checksum, &info);
        }
        Ok(pool.barrier().await)
    }

    async fn log_completion(&self, basename: &str) -> Result<()> {
        let log = &self.indices.progress_log;
        log.refresh().await;
        if log.contains(basename).await? {
            info!("{} was logged by another run", basename);
            return Ok(());
        }
        let finished = chrono::Local::now().to_rfc3339();
        log.set(basename, &finished).await?;
        info!("Logged {} as complete", basename);
        Ok(())
    }
}
