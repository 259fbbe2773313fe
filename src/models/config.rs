// src/models/config.rs

//! Application configuration structures.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::PageSpec;

/// Page fetcher implementation used for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum Driver {
    /// Plain HTTP fetch with static HTML parsing
    #[default]
    Http,
}

impl Driver {
    pub const ALL: &'static [Driver] = &[Driver::Http];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Driver {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|d| d.as_str()).collect();
                AppError::config(format!(
                    "Unsupported driver '{s}'; supported: {}",
                    names.join(", ")
                ))
            })
    }
}

/// Notification sink to run when changes are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum Event {
    /// Desktop notification via `notify-send`
    Notify,
    /// Append the change batch to the change log
    Log,
    /// Print the change batch to stdout
    Print,
}

impl Event {
    pub const ALL: &'static [Event] = &[Event::Notify, Event::Log, Event::Print];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Notify => "notify",
            Self::Log => "log",
            Self::Print => "print",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root configuration, the merge of command line and config file.
///
/// Field order is the serialization order: scalars first, then `[[pages]]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Page fetcher implementation
    #[serde(default)]
    pub driver: Driver,

    /// Notification sinks run when changes are found
    #[serde(default = "defaults::events")]
    pub events: Vec<Event>,

    /// Change log appended to by the `log` event
    #[serde(default = "defaults::log_path")]
    pub log_path: PathBuf,

    /// Directory holding per-page state files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Pages to watch, in polling order
    #[serde(default)]
    pub pages: Vec<PageSpec>,
}

impl Config {
    /// Serialize deterministically as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration values for basic sanity.
    ///
    /// Fails on the first malformed page, duplicate URL or broken pattern.
    pub fn validate(&self) -> Result<()> {
        if self.user_agent.trim().is_empty() {
            return Err(AppError::validation("user_agent is empty"));
        }
        if self.timeout_secs == 0 {
            return Err(AppError::validation("timeout_secs must be > 0"));
        }

        let mut seen = HashSet::new();
        for page in &self.pages {
            page.validate()?;
            if !seen.insert(page.url.as_str()) {
                return Err(AppError::validation(format!(
                    "Duplicate page url \"{}\"",
                    page.url
                )));
            }
        }
        Ok(())
    }

    /// Find the page definition for a URL.
    pub fn page_mut(&mut self, url: &str) -> Option<&mut PageSpec> {
        self.pages.iter_mut().find(|p| p.url == url)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            driver: Driver::default(),
            events: defaults::events(),
            log_path: defaults::log_path(),
            data_dir: None,
            timeout_secs: defaults::timeout(),
            user_agent: defaults::user_agent(),
            pages: Vec::new(),
        }
    }
}

/// Configuration as read from or given for one source.
///
/// Every field is optional so that "present" and "defaulted" stay distinct
/// while merging the config file with command line options.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartialConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<Driver>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<Event>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<PageSpec>>,
}

impl PartialConfig {
    /// Parse a TOML config file body.
    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

impl From<Config> for PartialConfig {
    fn from(config: Config) -> Self {
        Self {
            driver: Some(config.driver),
            events: Some(config.events),
            log_path: Some(config.log_path),
            data_dir: config.data_dir,
            timeout_secs: Some(config.timeout_secs),
            user_agent: Some(config.user_agent),
            pages: Some(config.pages),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::Event;

    pub fn events() -> Vec<Event> {
        Event::ALL.to_vec()
    }
    pub fn log_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_default()
            .join(".change-poller.log")
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; change-poller/0.1)".into()
    }
}
