// src/pipeline/poll.rs

//! Page polling loop.
//!
//! Pages are polled one at a time, in configured order. Each page's state is
//! loaded, migrated if a new URL is pending, compared against a fresh fetch
//! and written back before the next page starts. A failing page never stops
//! the loop.

use std::future::Future;

use chrono::Utc;

use crate::context::RunContext;
use crate::models::{ChangeBatch, ChangeRecord, PageSpec, PageState};
use crate::pipeline::detect::detect;
use crate::pipeline::extract::extract;
use crate::pipeline::writeback::{CommitStatus, PendingWrite, WriteBack};
use crate::services::{PageFetcher, RawFetch};
use crate::storage::{Loaded, Migration, StateStore};
use crate::utils::get_domain;

/// Summary of one polling pass.
#[derive(Debug, Clone)]
pub struct PollReport {
    /// Changes found, in page order
    pub batch: ChangeBatch,
    /// URL moves applied during this pass
    pub migrations: Vec<Migration>,
    /// Pages fully processed
    pub polled: usize,
    /// Pages whose fetch or extraction failed
    pub failed: usize,
    /// Pages whose state write was deferred
    pub deferred: usize,
    /// The pass stopped early on a shutdown request
    pub interrupted: bool,
}

impl PollReport {
    fn new(timestamp: i64) -> Self {
        Self {
            batch: ChangeBatch::new(timestamp),
            migrations: Vec::new(),
            polled: 0,
            failed: 0,
            deferred: 0,
            interrupted: false,
        }
    }
}

/// What happened to one page.
#[derive(Debug)]
struct PageOutcome {
    change: Option<ChangeRecord>,
    failed: bool,
    status: CommitStatus,
}

/// Poll every configured page once.
///
/// `shutdown` resolving stops the pass before the next page; the page in
/// flight is abandoned without writing. Deferred writes stay in `writeback`
/// for the caller's retry pass either way, and so do the URL moves riding
/// on them: `migrations` only lists moves whose state is already written.
pub async fn poll_pages(
    ctx: &RunContext,
    fetcher: &dyn PageFetcher,
    store: &dyn StateStore,
    writeback: &mut WriteBack,
    shutdown: impl Future<Output = ()>,
) -> PollReport {
    let mut report = PollReport::new(Utc::now().timestamp());

    if ctx.config.pages.is_empty() {
        log::warn!("No pages specified!");
        return report;
    }

    tokio::pin!(shutdown);

    for page in &ctx.config.pages {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                log::warn!(
                    "Interrupted, skipping {} remaining page(s)",
                    ctx.config.pages.len() - report.polled
                );
                report.interrupted = true;
                break;
            }
            outcome = poll_page(ctx, fetcher, store, writeback, page) => {
                report.polled += 1;
                if outcome.failed {
                    report.failed += 1;
                }
                match outcome.status {
                    CommitStatus::Written(Some(migration)) => report.migrations.push(migration),
                    CommitStatus::Written(None) => {}
                    CommitStatus::Deferred => report.deferred += 1,
                }
                if let Some(change) = outcome.change {
                    report.batch.push(change);
                }
            }
        }
    }

    report
}

/// Load, migrate, fetch, detect and write back one page.
async fn poll_page(
    ctx: &RunContext,
    fetcher: &dyn PageFetcher,
    store: &dyn StateStore,
    writeback: &mut WriteBack,
    page: &PageSpec,
) -> PageOutcome {
    log::debug!("Page poll starts for {}", page.url);
    let now = Utc::now().timestamp();

    let mut prior = prior_state(ctx, store, page).await;

    // The configured URL is authoritative; the state may have been stored
    // under another URL with the same slug (e.g. http vs https).
    if prior.url != page.url {
        log::info!("Data file of {} was stored as {}", page.url, prior.url);
        prior.url = page.url.clone();
        prior.domain = get_domain(&prior.url);
    }

    let migration = store.plan_migration(&mut prior);
    if let Some(m) = &migration {
        log::info!("Updating url of {} to {}", m.from_url, m.to_url);
    }

    let raw = match fetcher.fetch(&prior.url, &page.selector).await {
        Ok(raw) => raw,
        Err(e) => RawFetch::TransportError(e.to_string()),
    };

    let detection = detect(prior, extract(page, raw), now);
    let failed = detection.is_failure();
    let change = detection.change().cloned();

    let status = match detection.state.to_json() {
        Ok(payload) => {
            let write = PendingWrite {
                path: store.path_for(&detection.state.url),
                payload,
                migration,
            };
            writeback.commit(store, write).await
        }
        Err(e) => {
            log::error!("Cannot serialize state of {}: {}", detection.state.url, e);
            CommitStatus::Deferred
        }
    };

    PageOutcome {
        change,
        failed,
        status,
    }
}

/// Stored state for a page, or a fresh one when none is usable.
///
/// A missing or unreadable state is expected for pages added during this
/// run and reported as a probable misconfiguration otherwise.
async fn prior_state(ctx: &RunContext, store: &dyn StateStore, page: &PageSpec) -> PageState {
    let problem = match store.load(&page.url).await {
        Loaded::Found(state) => return state,
        Loaded::Missing => "no data file".to_string(),
        Loaded::Invalid(reason) => reason,
    };

    if ctx.is_newly_added(&page.url) {
        log::debug!(
            "Data file for {} does not exist yet, page added now; using defaults",
            page.url
        );
    } else {
        log::warn!(
            "Data file load failed for {}, please fix your configuration! Using defaults. {}",
            page.url,
            problem
        );
    }

    PageState::new(&page.url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::error::{AppError, Result};
    use crate::models::{Config, ErrorKind};
    use crate::storage::LocalStateStore;

    /// Serves canned results per URL and records requested URLs.
    #[derive(Default)]
    struct FakeFetcher {
        pages: HashMap<String, RawFetch>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn serve(mut self, url: &str, raw: RawFetch) -> Self {
            self.pages.insert(url.to_string(), raw);
            self
        }

        fn text(self, url: &str, text: &str) -> Self {
            self.serve(
                url,
                RawFetch::Page {
                    text: text.to_string(),
                    title: format!("Title of {url}"),
                },
            )
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str, _selector: &str) -> Result<RawFetch> {
            self.requested.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| AppError::fetch(url, "session lost"))
        }
    }

    fn context(tmp: &TempDir, urls: &[&str], newly_added: &[&str]) -> RunContext {
        let mut config = Config::default();
        config.pages = urls.iter().map(|u| PageSpec::new(*u, "#content")).collect();
        RunContext {
            config,
            newly_added: newly_added.iter().map(|u| u.to_string()).collect::<HashSet<_>>(),
            data_dir: tmp.path().to_path_buf(),
        }
    }

    async fn seed(store: &LocalStateStore, url: &str, content: &[&str]) -> PageState {
        let mut state = PageState::new(url);
        state.content = content.iter().map(|s| s.to_string()).collect();
        state.last_content_change = 10;
        store.save(&state).await.unwrap();
        state
    }

    async fn run(ctx: &RunContext, fetcher: &FakeFetcher, store: &LocalStateStore) -> PollReport {
        let mut writeback = WriteBack::new();
        let report =
            poll_pages(ctx, fetcher, store, &mut writeback, std::future::pending()).await;
        writeback.retry_deferred(store).await;
        report
    }

    fn found(loaded: Loaded) -> PageState {
        match loaded {
            Loaded::Found(state) => state,
            other => panic!("expected stored state, got {other:?}"),
        }
    }

    const P: &str = "https://example.com/p";

    #[tokio::test]
    async fn test_unchanged_page_yields_empty_batch() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStateStore::new(tmp.path());
        seed(&store, P, &["v1"]).await;
        let ctx = context(&tmp, &[P], &[]);
        let fetcher = FakeFetcher::default().text(P, "v1");

        let report = run(&ctx, &fetcher, &store).await;

        assert_eq!(report.batch.changed_count, 0);
        assert_eq!(report.polled, 1);
        let state = found(store.load(P).await);
        assert!(state.last_check > 0);
        assert_eq!(state.last_content_change, 10);
    }

    #[tokio::test]
    async fn test_changed_page_yields_record() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStateStore::new(tmp.path());
        seed(&store, P, &["v1"]).await;
        let ctx = context(&tmp, &[P], &[]);
        let fetcher = FakeFetcher::default().text(P, "v2");

        let report = run(&ctx, &fetcher, &store).await;

        assert_eq!(report.batch.changed_count, 1);
        let change = &report.batch.changes[0];
        assert_eq!(change.added, vec!["v2"]);
        assert_eq!(change.removed, vec!["v1"]);
        assert_eq!(found(store.load(P).await).content, vec!["v2"]);
    }

    #[tokio::test]
    async fn test_new_page_failure_is_recorded() {
        const Q: &str = "https://example.com/q";
        let tmp = TempDir::new().unwrap();
        let store = LocalStateStore::new(tmp.path());
        let ctx = context(&tmp, &[Q], &[Q]);
        let fetcher =
            FakeFetcher::default().serve(Q, RawFetch::ElementNotFound("no #content".into()));

        let report = run(&ctx, &fetcher, &store).await;

        assert_eq!(report.failed, 1);
        assert!(report.batch.is_empty());
        let state = found(store.load(Q).await);
        assert!(state.error);
        assert_eq!(state.error_description, Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_fetcher_error_does_not_block_later_pages() {
        const BROKEN: &str = "https://broken.example.com/";
        let tmp = TempDir::new().unwrap();
        let store = LocalStateStore::new(tmp.path());
        let ctx = context(&tmp, &[BROKEN, P], &[BROKEN, P]);
        let fetcher = FakeFetcher::default().text(P, "hello");

        let report = run(&ctx, &fetcher, &store).await;

        assert_eq!(report.polled, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.batch.changed_count, 1);
        let broken = found(store.load(BROKEN).await);
        assert_eq!(broken.error_description, Some(ErrorKind::Unreachable));
    }

    #[tokio::test]
    async fn test_url_migration_moves_state() {
        const A: &str = "https://old.example.com/a";
        const B: &str = "https://new.example.org/b";
        let tmp = TempDir::new().unwrap();
        let store = LocalStateStore::new(tmp.path());
        let mut state = seed(&store, A, &["v1"]).await;
        state.new_url = Some(B.to_string());
        store.save(&state).await.unwrap();

        let ctx = context(&tmp, &[A], &[]);
        let fetcher = FakeFetcher::default().text(B, "v1");

        let report = run(&ctx, &fetcher, &store).await;

        assert_eq!(*fetcher.requested.lock().unwrap(), vec![B.to_string()]);
        assert_eq!(report.migrations.len(), 1);
        assert_eq!(report.migrations[0].to_url, B);
        assert_eq!(store.load(A).await, Loaded::Missing);
        let migrated = found(store.load(B).await);
        assert_eq!(migrated.url, B);
        assert_eq!(migrated.domain, "new.example.org");
        assert!(migrated.new_url.is_none());
        assert_eq!(migrated.content, vec!["v1"]);
    }

    #[tokio::test]
    async fn test_configured_url_wins_over_stored_url() {
        const STORED: &str = "http://example.com/p";
        let tmp = TempDir::new().unwrap();
        let store = LocalStateStore::new(tmp.path());
        seed(&store, STORED, &["v0"]).await;
        assert_eq!(store.path_for(STORED), store.path_for(P));

        let ctx = context(&tmp, &[P], &[]);
        let fetcher = FakeFetcher::default().text(P, "v1");

        let report = run(&ctx, &fetcher, &store).await;

        assert_eq!(*fetcher.requested.lock().unwrap(), vec![P.to_string()]);
        assert_eq!(report.batch.changed_count, 1);
        assert_eq!(report.batch.changes[0].url, P);
        assert!(report.migrations.is_empty());
        let state = found(store.load(P).await);
        assert_eq!(state.url, P);
        assert_eq!(state.content, vec!["v1"]);
    }

    #[tokio::test]
    async fn test_empty_page_set() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStateStore::new(tmp.path());
        let ctx = context(&tmp, &[], &[]);

        let report = run(&ctx, &FakeFetcher::default(), &store).await;

        assert!(report.batch.is_empty());
        assert_eq!(report.polled, 0);
    }

    #[tokio::test]
    async fn test_shutdown_skips_remaining_pages() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStateStore::new(tmp.path());
        let ctx = context(&tmp, &[P], &[P]);
        let fetcher = FakeFetcher::default().text(P, "v1");
        let mut writeback = WriteBack::new();

        let report = poll_pages(&ctx, &fetcher, &store, &mut writeback, async {}).await;

        assert!(report.interrupted);
        assert_eq!(report.polled, 0);
        assert!(fetcher.requested.lock().unwrap().is_empty());
        assert_eq!(store.load(P).await, Loaded::Missing);
    }
}
