//! Pipeline stages of a poller run.
//!
//! - `extract` / `detect`: turn a fetch into fragments and compare with state
//! - `writeback`: persist state with one deferred retry
//! - `poll`: the per-page loop
//! - `run`: poll, notify and retry in one call

pub mod detect;
pub mod extract;
pub mod poll;
pub mod run;
pub mod writeback;

pub use poll::{PollReport, poll_pages};
pub use run::{RunSummary, apply_migrations, run_poller};
