// src/pipeline/writeback.rs

//! Write-back of page state with one deferred retry.
//!
//! Each page's state is written once right after it is polled. A failed
//! write keeps its serialized payload, keyed by target path, and is retried
//! exactly once more at the end of the run. A second failure loses that
//! page's update for this run; the next run re-derives it from the live page.
//!
//! A URL migration rides along with its page's write and only counts as
//! done once that write has landed.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::storage::{Migration, StateStore};

/// A serialized state waiting to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    /// Target state file
    pub path: PathBuf,
    /// Serialized page state
    pub payload: String,
    /// URL move completed by this write
    pub migration: Option<Migration>,
}

/// Result of the first write attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitStatus {
    /// Written now; carries the URL move it completed, if any
    Written(Option<Migration>),
    Deferred,
}

/// Result of the end-of-run retry pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryReport {
    /// Deferred writes that succeeded on retry
    pub saved: usize,
    /// Targets whose update is lost for this run
    pub lost: Vec<PathBuf>,
    /// URL moves whose state landed on retry
    pub migrations: Vec<Migration>,
}

/// Run-scoped set of deferred writes.
#[derive(Debug, Default)]
pub struct WriteBack {
    deferred: BTreeMap<PathBuf, PendingWrite>,
}

impl WriteBack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of writes waiting for the retry pass.
    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }

    /// Attempt a write once; on failure keep it for the retry pass.
    pub async fn commit(&mut self, store: &dyn StateStore, write: PendingWrite) -> CommitStatus {
        let written = store.write(&write.path, write.payload.as_bytes()).await;
        match written {
            Ok(()) => {
                log::debug!("Data file {} updated", write.path.display());
                CommitStatus::Written(finish(store, write).await)
            }
            Err(e) => {
                log::info!(
                    "Couldn't update data file {}! Trying again later. {}",
                    write.path.display(),
                    e
                );
                self.deferred.insert(write.path.clone(), write);
                CommitStatus::Deferred
            }
        }
    }

    /// Retry every deferred write once, each independently.
    pub async fn retry_deferred(&mut self, store: &dyn StateStore) -> RetryReport {
        let mut report = RetryReport::default();
        if self.deferred.is_empty() {
            return report;
        }

        log::info!(
            "Now trying to save unsaved changes ({}) again",
            self.deferred.len()
        );

        for (path, write) in std::mem::take(&mut self.deferred) {
            let written = store.write(&path, write.payload.as_bytes()).await;
            match written {
                Ok(()) => {
                    log::info!("Previously failed data file {} saved now", path.display());
                    report.saved += 1;
                    if let Some(migration) = finish(store, write).await {
                        report.migrations.push(migration);
                    }
                }
                Err(e) => {
                    log::warn!("Cannot save data file {}! {}", path.display(), e);
                    report.lost.push(path);
                }
            }
        }

        report
    }
}

/// Remove the superseded file of a migrated page; absence is fine.
async fn finish(store: &dyn StateStore, write: PendingWrite) -> Option<Migration> {
    let migration = write.migration?;
    if migration.removes_old_file() {
        let old = &migration.old_path;
        match store.remove(old).await {
            Ok(()) => log::debug!("Removed old data file {}", old.display()),
            Err(e) => log::debug!("Old data file {} not removed: {}", old.display(), e),
        }
    }
    Some(migration)
}
