// src/config.rs

//! Configuration loading, merging and persistence.
//!
//! The config file is merged with command line options: keys given on the
//! command line win, list-valued keys are unioned with the stored order
//! first, and pages appended from the command line are reported as newly
//! added so that their missing state files are not treated as errors.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::{Config, PageSpec, PartialConfig};
use crate::utils::fs::write_atomic;

/// Directory name used under the platform config and data directories.
pub const APP_DIR: &str = "change-poller";

/// File name of the config file inside the config directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Result of loading the configuration.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Merged configuration
    pub config: Config,

    /// URLs of pages appended from the command line during this load
    pub newly_added: HashSet<String>,

    /// The config file was missing or unreadable and should be written out
    pub needs_save: bool,
}

/// Default config file location in the platform config directory.
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
        .ok_or_else(|| AppError::config("Cannot determine the user config directory"))
}

/// Default state directory in the platform data directory.
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .ok_or_else(|| AppError::config("Cannot determine the user data directory"))
}

/// Resolve the state directory: configured value, else the platform default.
pub fn resolve_data_dir(config: &Config) -> Result<PathBuf> {
    match &config.data_dir {
        Some(dir) => Ok(dir.clone()),
        None => default_data_dir(),
    }
}

/// Config file reader and writer.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Create a store for an explicit config file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store for the explicit path if given, else the default path.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Ok(Self::new(path)),
            None => default_config_path().map(Self::new),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored configuration.
    fn read(&self) -> Result<PartialConfig> {
        let raw = fs::read_to_string(&self.path)?;
        PartialConfig::from_toml(&raw)
    }

    /// Load the stored configuration and merge the command line over it.
    ///
    /// A missing or unparsable file is not fatal: command line and default
    /// values are used and the result is flagged for saving. An invalid
    /// page definition in the merged result is fatal.
    pub fn load(&self, cli: PartialConfig) -> Result<LoadedConfig> {
        let (stored, needs_save) = match self.read() {
            Ok(stored) => {
                log::debug!("Read configuration file {}", self.path.display());
                (stored, false)
            }
            Err(e) => {
                log::warn!(
                    "Failed to load config file {}, is this the first run? Using defaults and saving afterwards. {}",
                    self.path.display(),
                    e
                );
                (PartialConfig::default(), true)
            }
        };

        let (config, newly_added) = merge(stored, cli);
        config.validate()?;

        Ok(LoadedConfig {
            config,
            newly_added,
            needs_save,
        })
    }

    /// Write the configuration atomically, creating parent directories.
    pub fn save(&self, config: &Config) -> Result<()> {
        let raw = config.to_toml()?;
        write_atomic(&self.path, raw.as_bytes())?;
        log::info!("Saved configuration to {}", self.path.display());
        Ok(())
    }
}

/// Merge stored values with command line values.
///
/// Returns the merged configuration and the URLs of pages that came only
/// from the command line.
pub fn merge(stored: PartialConfig, cli: PartialConfig) -> (Config, HashSet<String>) {
    let defaults = Config::default();
    let mut newly_added = HashSet::new();

    let pages = match (stored.pages, cli.pages) {
        (Some(stored), Some(cli)) => union_pages(stored, cli, &mut newly_added),
        (None, Some(cli)) => union_pages(Vec::new(), cli, &mut newly_added),
        (Some(stored), None) => union_pages(stored, Vec::new(), &mut newly_added),
        (None, None) => defaults.pages,
    };

    let events = match (stored.events, cli.events) {
        (Some(mut stored), Some(cli)) => {
            for event in cli {
                if !stored.contains(&event) {
                    stored.push(event);
                }
            }
            stored
        }
        (stored, cli) => cli.or(stored).unwrap_or(defaults.events),
    };

    let config = Config {
        driver: cli.driver.or(stored.driver).unwrap_or(defaults.driver),
        events,
        log_path: cli.log_path.or(stored.log_path).unwrap_or(defaults.log_path),
        data_dir: cli.data_dir.or(stored.data_dir),
        timeout_secs: cli
            .timeout_secs
            .or(stored.timeout_secs)
            .unwrap_or(defaults.timeout_secs),
        user_agent: cli
            .user_agent
            .or(stored.user_agent)
            .unwrap_or(defaults.user_agent),
        pages,
    };

    (config, newly_added)
}

/// Stored pages first, then command line pages with unseen URLs.
fn union_pages(
    stored: Vec<PageSpec>,
    cli: Vec<PageSpec>,
    newly_added: &mut HashSet<String>,
) -> Vec<PageSpec> {
    let mut merged: Vec<PageSpec> = Vec::with_capacity(stored.len() + cli.len());

    for page in stored {
        if merged.iter().any(|p| p.url == page.url) {
            log::warn!("Ignoring duplicate stored page \"{}\"", page.url);
            continue;
        }
        merged.push(page);
    }

    for page in cli {
        match merged.iter().find(|p| p.url == page.url) {
            Some(existing) => {
                if *existing != page {
                    log::warn!(
                        "Page \"{}\" is already configured; keeping the stored definition",
                        page.url
                    );
                }
            }
            None => {
                log::debug!("Adding a new page: {}", page.url);
                newly_added.insert(page.url.clone());
                merged.push(page);
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Driver, Event};
    use tempfile::TempDir;

    fn page(url: &str) -> PageSpec {
        PageSpec::new(url, "h1")
    }

    #[test]
    fn test_merge_stored_wins_when_cli_silent() {
        let stored = PartialConfig {
            timeout_secs: Some(5),
            user_agent: Some("stored-agent".into()),
            ..Default::default()
        };
        let (config, _) = merge(stored, PartialConfig::default());
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.user_agent, "stored-agent");
    }

    #[test]
    fn test_merge_cli_scalar_wins() {
        let stored = PartialConfig {
            timeout_secs: Some(5),
            driver: Some(Driver::Http),
            ..Default::default()
        };
        let cli = PartialConfig {
            timeout_secs: Some(60),
            ..Default::default()
        };
        let (config, _) = merge(stored, cli);
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.driver, Driver::Http);
    }

    #[test]
    fn test_merge_pages_union_keeps_stored_order() {
        let stored = PartialConfig {
            pages: Some(vec![page("https://b.com/"), page("https://a.com/")]),
            ..Default::default()
        };
        let cli = PartialConfig {
            pages: Some(vec![page("https://c.com/"), page("https://a.com/")]),
            ..Default::default()
        };

        let (config, newly_added) = merge(stored, cli);

        let urls: Vec<_> = config.pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["https://b.com/", "https://a.com/", "https://c.com/"]);
        assert_eq!(newly_added, HashSet::from(["https://c.com/".to_string()]));
    }

    #[test]
    fn test_merge_duplicate_url_keeps_stored_definition() {
        let stored = PartialConfig {
            pages: Some(vec![page("https://a.com/")]),
            ..Default::default()
        };
        let cli = PartialConfig {
            pages: Some(vec![PageSpec::new("https://a.com/", "#other")]),
            ..Default::default()
        };

        let (config, newly_added) = merge(stored, cli);

        assert_eq!(config.pages, vec![page("https://a.com/")]);
        assert!(newly_added.is_empty());
    }

    #[test]
    fn test_merge_events_union() {
        let stored = PartialConfig {
            events: Some(vec![Event::Log]),
            ..Default::default()
        };
        let cli = PartialConfig {
            events: Some(vec![Event::Print, Event::Log]),
            ..Default::default()
        };
        let (config, _) = merge(stored, cli);
        assert_eq!(config.events, vec![Event::Log, Event::Print]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let stored = PartialConfig {
            pages: Some(vec![
                page("https://z.com/"),
                page("https://a.com/").with_pattern(r"(\d+)"),
                page("https://m.com/"),
            ]),
            ..Default::default()
        };
        let (first, _) = merge(stored, PartialConfig::default());

        let reparsed = PartialConfig::from_toml(&first.to_toml().unwrap()).unwrap();
        let (second, newly_added) = merge(reparsed, PartialConfig::default());

        assert_eq!(second.pages, first.pages);
        assert_eq!(second, first);
        assert!(newly_added.is_empty());
    }

    #[test]
    fn test_load_missing_file_uses_cli_and_flags_save() {
        let tmp = TempDir::new().unwrap();
        let store = ConfigStore::new(tmp.path().join("conf/config.toml"));
        let cli = PartialConfig {
            pages: Some(vec![page("https://a.com/")]),
            ..Default::default()
        };

        let loaded = store.load(cli).unwrap();

        assert!(loaded.needs_save);
        assert_eq!(loaded.config.pages.len(), 1);
        assert!(loaded.newly_added.contains("https://a.com/"));
    }

    #[test]
    fn test_load_unparsable_file_is_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "this is = = not toml").unwrap();

        let loaded = ConfigStore::new(&path).load(PartialConfig::default()).unwrap();

        assert!(loaded.needs_save);
        assert_eq!(loaded.config, Config::default());
    }

    #[test]
    fn test_load_rejects_broken_stored_pattern() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            "[[pages]]\nurl = \"https://a.com/\"\nselector = \"h1\"\npattern = \"(\"\n",
        )
        .unwrap();

        let result = ConfigStore::new(&path).load(PartialConfig::default());
        assert!(matches!(result, Err(AppError::Pattern { .. })));
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = ConfigStore::new(tmp.path().join("config.toml"));
        let mut config = Config::default();
        config.pages = vec![page("https://a.com/"), page("https://b.com/")];
        config.timeout_secs = 12;

        store.save(&config).unwrap();
        let loaded = store.load(PartialConfig::default()).unwrap();

        assert!(!loaded.needs_save);
        assert_eq!(loaded.config, config);
    }
}
