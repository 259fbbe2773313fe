// src/context.rs

//! Per-run context passed explicitly through the pipeline.
//!
//! Nothing in the pipeline reads ambient configuration; logging verbosity is
//! applied once when the binary installs its logger.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::config::{LoadedConfig, resolve_data_dir};
use crate::error::Result;
use crate::models::Config;

/// Everything a run needs to know, resolved once at startup.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: Config,

    /// Pages appended from the command line; their missing state is expected
    pub newly_added: HashSet<String>,

    /// Directory holding per-page state files
    pub data_dir: PathBuf,
}

impl RunContext {
    /// Build a context from a loaded configuration.
    pub fn new(loaded: LoadedConfig) -> Result<Self> {
        let data_dir = resolve_data_dir(&loaded.config)?;
        Ok(Self {
            config: loaded.config,
            newly_added: loaded.newly_added,
            data_dir,
        })
    }

    /// Whether a page was added on the command line during this run.
    pub fn is_newly_added(&self, url: &str) -> bool {
        self.newly_added.contains(url)
    }
}
