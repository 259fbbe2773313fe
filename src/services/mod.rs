//! Service layer for the poller.
//!
//! - Page fetching (`PageFetcher`, `HttpFetcher`)
//! - Notification sinks (`Notifier`, `dispatch`)

mod fetcher;
mod notify;

pub use fetcher::{HttpFetcher, PageFetcher, RawFetch, build_fetcher, select_text};
pub use notify::{
    DesktopNotifier, LogFileNotifier, Notifier, StdoutNotifier, build_notifiers,
    desktop_summary, dispatch,
};
