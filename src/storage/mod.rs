// src/storage/mod.rs

//! Storage abstractions for per-page state persistence.
//!
//! Each watched page owns one JSON file in the data directory, named by a
//! slug derived from its URL.
//!
//! ## Directory Structure
//!
//! ```text
//! data_dir/
//! ├── example.com_news.json        # state of https://example.com/news
//! └── blog.example.org_feed.json   # state of https://blog.example.org/feed
//! ```

pub mod local;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::PageState;

// Re-export for convenience
pub use local::LocalStateStore;

/// Outcome of reading a page's state file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loaded {
    /// A valid state file exists
    Found(PageState),
    /// No state file exists
    Missing,
    /// A state file exists but could not be read or parsed
    Invalid(String),
}

/// A pending move of a page's state file to a new key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// URL the state was keyed under before the move
    pub from_url: String,
    /// URL the state is keyed under from now on
    pub to_url: String,
    /// State file to delete once the new one is written
    pub old_path: PathBuf,
    /// State file written from now on
    pub new_path: PathBuf,
}

impl Migration {
    /// Whether the old file must be removed after the move.
    ///
    /// Colliding slugs map both URLs to the same file, which must survive.
    pub fn removes_old_file(&self) -> bool {
        self.old_path != self.new_path
    }
}

/// Trait for page state storage backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Location of the state file for a URL.
    fn path_for(&self, url: &str) -> PathBuf;

    /// Read the state stored for a URL.
    async fn load(&self, url: &str) -> Loaded;

    /// Write a serialized state to a location.
    async fn write(&self, path: &Path, payload: &[u8]) -> Result<()>;

    /// Delete a state file.
    async fn remove(&self, path: &Path) -> Result<()>;

    /// Serialize a state and write it under its URL's key.
    async fn save(&self, state: &PageState) -> Result<()> {
        let payload = state.to_json()?;
        self.write(&self.path_for(&state.url), payload.as_bytes())
            .await
    }

    /// Apply a pending URL move on `state` and describe the file move.
    ///
    /// Returns `None` when no move is pending.
    fn plan_migration(&self, state: &mut PageState) -> Option<Migration> {
        let from_url = state.take_migration()?;
        Some(Migration {
            old_path: self.path_for(&from_url),
            new_path: self.path_for(&state.url),
            from_url,
            to_url: state.url.clone(),
        })
    }
}
