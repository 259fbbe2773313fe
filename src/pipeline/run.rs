// src/pipeline/run.rs

//! One complete poller run: poll, notify, retry deferred writes.

use std::future::Future;

use chrono::DateTime;

use crate::context::RunContext;
use crate::error::Result;
use crate::models::Config;
use crate::pipeline::poll::{PollReport, poll_pages};
use crate::pipeline::writeback::{RetryReport, WriteBack};
use crate::services::{Notifier, PageFetcher, dispatch};
use crate::storage::{Migration, StateStore};

/// Everything a run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub report: PollReport,
    pub retry: RetryReport,
    /// URL moves whose state was written, on first attempt or on retry
    pub migrations: Vec<Migration>,
    /// Outcome of handing the batch to the notification sinks
    pub notified: Result<()>,
}

/// Run the poller once.
///
/// The batch is dispatched only when something changed. The retry pass for
/// deferred writes runs afterwards regardless of the dispatch outcome or an
/// interruption.
pub async fn run_poller(
    ctx: &RunContext,
    fetcher: &dyn PageFetcher,
    store: &dyn StateStore,
    notifiers: &[Box<dyn Notifier>],
    shutdown: impl Future<Output = ()>,
) -> RunSummary {
    let mut writeback = WriteBack::new();
    let report = poll_pages(ctx, fetcher, store, &mut writeback, shutdown).await;

    log::info!(
        "Polled {} page(s), {} failed, {} write(s) deferred",
        report.polled,
        report.failed,
        report.deferred
    );

    let batch = &report.batch;
    let notified = if batch.is_empty() {
        log::info!("No changes detected");
        Ok(())
    } else {
        log::info!(
            "Changes detected at {} (UNIX timestamp {}). Change count: {}",
            ctime(batch.timestamp),
            batch.timestamp,
            batch.changed_count
        );
        dispatch(batch, notifiers).await
    };

    let retry = writeback.retry_deferred(store).await;
    if !retry.lost.is_empty() {
        log::warn!("{} page update(s) lost for this run", retry.lost.len());
    }

    let migrations = report
        .migrations
        .iter()
        .chain(&retry.migrations)
        .cloned()
        .collect();

    RunSummary {
        report,
        retry,
        migrations,
        notified,
    }
}

/// Rewrite migrated page URLs in the configuration.
///
/// Returns whether the configuration changed and should be saved.
pub fn apply_migrations(config: &mut Config, migrations: &[Migration]) -> bool {
    let mut changed = false;

    for m in migrations {
        if config.pages.iter().any(|p| p.url == m.to_url) {
            log::warn!(
                "Page {} moved to {}, which is already configured; leaving both",
                m.from_url,
                m.to_url
            );
            continue;
        }
        match config.page_mut(&m.from_url) {
            Some(page) => {
                page.url = m.to_url.clone();
                changed = true;
            }
            None => log::debug!("No configured page for {}", m.from_url),
        }
    }

    changed
}

fn ctime(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%a %b %e %H:%M:%S %Y").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}
