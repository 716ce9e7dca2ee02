//! Index workers.
//!
//! Every index key is owned by exactly one worker (`shard_for`), so the
//! read → merge → write sequence on a key never interleaves with another
//! writer from the same run.

use super::Indices;
use crate::client::StoreDatabase;
use crate::source::BackupSetInfo;
use crate::utils::errors::Result;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ops::AddAssign;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub(crate) enum Job {
    /// Add `checksum` to the history of `path`.
    File { path: String, checksum: String },
    /// Point `checksum` at `backupset` unless a newer one already holds it.
    Checksum {
        checksum: String,
        backupset: Arc<BackupSetInfo>,
    },
    /// Barrier marker: acknowledged once everything queued before it is applied.
    Flush(oneshot::Sender<ShardStats>),
    Stop,
}

/// Per-shard outcome counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShardStats {
    pub applied: usize,
    pub failed: usize,
}

impl AddAssign for ShardStats {
    fn add_assign(&mut self, other: Self) {
        self.applied += other.applied;
        self.failed += other.failed;
    }
}

/// Stable key → worker assignment.
pub(crate) fn shard_for(key: &str, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % shards.max(1) as u64) as usize
}

/// Append `checksum` keeping first-seen order. `None` if it is already there.
pub(crate) fn merge_checksum(mut history: Vec<String>, checksum: &str) -> Option<Vec<String>> {
    if history.iter().any(|c| c == checksum) {
        return None;
    }
    history.push(checksum.to_string());
    Some(history)
}

/// Newest backup set wins; ties keep what is stored.
pub(crate) fn should_replace(stored: Option<&BackupSetInfo>, candidate: &BackupSetInfo) -> bool {
    match stored {
        None => true,
        Some(stored) => candidate.is_newer_than(stored),
    }
}

struct Worker {
    id: usize,
    file_index: Arc<StoreDatabase>,
    checksum_index: Arc<StoreDatabase>,
    rx: mpsc::UnboundedReceiver<Job>,
}

impl Worker {
    async fn run(mut self) -> ShardStats {
        let mut total = ShardStats::default();
        let mut pending = ShardStats::default();

        while let Some(job) = self.rx.recv().await {
            match job {
                Job::File { path, checksum } => match self.apply_file(&path, &checksum).await {
                    Ok(()) => pending.applied += 1,
                    Err(e) => {
                        warn!("worker {}: dropped file index update for {}: {}", self.id, path, e);
                        pending.failed += 1;
                    }
                },
                Job::Checksum { checksum, backupset } => {
                    match self.apply_checksum(&checksum, &backupset).await {
                        Ok(()) => pending.applied += 1,
                        Err(e) => {
                            warn!(
                                "worker {}: dropped checksum index update for {}: {}",
                                self.id, checksum, e
                            );
                            pending.failed += 1;
                        }
                    }
                }
                Job::Flush(ack) => {
                    total += pending;
                    let _ = ack.send(std::mem::take(&mut pending));
                }
                Job::Stop => break,
            }
        }

        total += pending;
        debug!("worker {} stopped: {:?}", self.id, total);
        total
    }

    async fn apply_file(&self, path: &str, checksum: &str) -> Result<()> {
        match self.file_index.try_get::<Vec<String>>(path).await? {
            None => {
                info!("{} first appeared with checksum {}", path, checksum);
                self.file_index.append(path, &[checksum]).await
            }
            Some(history) => match merge_checksum(history, checksum) {
                Some(merged) => self.file_index.append(path, &merged).await,
                None => Ok(()),
            },
        }
    }

    async fn apply_checksum(&self, checksum: &str, backupset: &BackupSetInfo) -> Result<()> {
        let stored = self.checksum_index.try_get::<BackupSetInfo>(checksum).await?;
        if !should_replace(stored.as_ref(), backupset) {
            return Ok(());
        }
        if stored.is_none() {
            info!("{} first appeared in {}", checksum, backupset.basename);
        }
        self.checksum_index.set(checksum, backupset).await
    }
}

/// Fixed set of workers, one unbounded FIFO queue each.
pub(crate) struct WorkerPool {
    senders: Vec<mpsc::UnboundedSender<Job>>,
    handles: Vec<JoinHandle<ShardStats>>,
    lost: usize,
}

impl WorkerPool {
    pub(crate) fn start(workers: usize, indices: &Indices) -> Self {
        let workers = workers.max(1);
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let (tx, rx) = mpsc::unbounded_channel();
            let worker = Worker {
                id,
                file_index: Arc::clone(&indices.file_index),
                checksum_index: Arc::clone(&indices.checksum_index),
                rx,
            };
            senders.push(tx);
            handles.push(tokio::spawn(worker.run()));
        }
        debug!("Started {} index workers", workers);
        Self {
            senders,
            handles,
            lost: 0,
        }
    }

    fn send(&mut self, key: &str, job: Job) {
        let shard = shard_for(key, self.senders.len());
        if self.senders[shard].send(job).is_err() {
            warn!("worker {} is gone; dropping update for {}", shard, key);
            self.lost += 1;
        }
    }

    /// Queue both index updates for one (path, checksum) pair.
    pub(crate) fn dispatch(&mut self, path: String, checksum: String, backupset: &Arc<BackupSetInfo>) {
        let checksum_job = Job::Checksum {
            checksum: checksum.clone(),
            backupset: Arc::clone(backupset),
        };
        self.send(&checksum, checksum_job);
        let file_key = path.clone();
        self.send(&file_key, Job::File { path, checksum });
    }

    /// Wait until every queued job has been applied; returns what happened
    /// since the previous barrier.
    pub(crate) async fn barrier(&mut self) -> ShardStats {
        let mut acks = Vec::with_capacity(self.senders.len());
        let mut stats = ShardStats {
            applied: 0,
            failed: std::mem::take(&mut self.lost),
        };
        for (shard, tx) in self.senders.iter().enumerate() {
            let (ack_tx, ack_rx) = oneshot::channel();
            if tx.send(Job::Flush(ack_tx)).is_err() {
                warn!("worker {} is gone; barrier cannot confirm its work", shard);
                stats.failed += 1;
                continue;
            }
            acks.push(ack_rx);
        }
        for ack in acks {
            match ack.await {
                Ok(shard_stats) => stats += shard_stats,
                Err(_) => stats.failed += 1,
            }
        }
        stats
    }

    /// Send the stop sentinel to every worker and wait for them to exit.
    pub(crate) async fn shutdown(self) -> ShardStats {
        for tx in &self.senders {
            let _ = tx.send(Job::Stop);
        }
        let mut total = ShardStats::default();
        for handle in self.handles {
            match handle.await {
                Ok(stats) => total += stats,
                Err(e) => warn!("index worker panicked: {}", e),
            }
        }
        total
    }
}
