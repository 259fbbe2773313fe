// src/services/notify.rs

//! Notification sinks for change batches.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{AppError, Result};
use crate::models::{ChangeBatch, Config, Event};

/// Maximum number of domains listed in a desktop notification.
const MAX_NOTIFY_DOMAINS: usize = 3;

/// A destination for change batches.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, batch: &ChangeBatch) -> Result<()>;
}

/// Pretty JSON with a trailing newline, as written by the log and print sinks.
fn batch_json(batch: &ChangeBatch) -> Result<String> {
    let mut json = serde_json::to_string_pretty(batch)?;
    json.push('\n');
    Ok(json)
}

/// Appends each batch to the change log file.
pub struct LogFileNotifier {
    path: PathBuf,
}

impl LogFileNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Notifier for LogFileNotifier {
    fn name(&self) -> &'static str {
        Event::Log.as_str()
    }

    async fn notify(&self, batch: &ChangeBatch) -> Result<()> {
        let json = batch_json(batch)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(json.as_bytes()).await?;
        file.flush().await?;

        log::info!(
            "Change data saved to {}, size grew by {} bytes",
            self.path.display(),
            json.len()
        );
        Ok(())
    }
}

/// Prints each batch as JSON to stdout.
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    fn name(&self) -> &'static str {
        Event::Print.as_str()
    }

    async fn notify(&self, batch: &ChangeBatch) -> Result<()> {
        let json = batch_json(batch)?;
        let mut stdout = tokio::io::stdout();
        stdout.write_all(json.as_bytes()).await?;
        stdout.flush().await?;

        log::info!("Printed change data into stdout");
        Ok(())
    }
}

/// Sends a desktop notification through `notify-send`.
pub struct DesktopNotifier {
    program: String,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self {
            program: "notify-send".to_string(),
        }
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary line and body of a desktop notification.
pub fn desktop_summary(batch: &ChangeBatch) -> (String, String) {
    let count = batch.changed_count;
    let noun = if count == 1 { "change" } else { "changes" };
    let summary = format!("{count} {noun} in followed sites");

    let mut lines: Vec<&str> = batch
        .domains()
        .into_iter()
        .take(MAX_NOTIFY_DOMAINS.min(count))
        .collect();
    if lines.len() < count {
        lines.push("...");
    }

    (summary, lines.join("\n"))
}

#[async_trait]
impl Notifier for DesktopNotifier {
    fn name(&self) -> &'static str {
        Event::Notify.as_str()
    }

    async fn notify(&self, batch: &ChangeBatch) -> Result<()> {
        let (summary, body) = desktop_summary(batch);

        let spawned = Command::new(&self.program)
            .arg(&summary)
            .arg(&body)
            .status()
            .await;
        let status = match spawned {
            Ok(status) => status,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!(
                    "Cannot find \"{}\" in system! Please install it.",
                    self.program
                );
                return Ok(());
            }
            Err(e) => return Err(AppError::notify(self.name(), e)),
        };

        if !status.success() {
            return Err(AppError::notify(
                self.name(),
                format!("{} exited with {}", self.program, status),
            ));
        }

        log::info!("Sent a notification about changes to user");
        Ok(())
    }
}

/// Build the sinks selected in the configuration, in configured order.
pub fn build_notifiers(config: &Config) -> Vec<Box<dyn Notifier>> {
    config
        .events
        .iter()
        .map(|event| -> Box<dyn Notifier> {
            match event {
                Event::Notify => Box::new(DesktopNotifier::new()),
                Event::Log => Box::new(LogFileNotifier::new(&config.log_path)),
                Event::Print => Box::new(StdoutNotifier),
            }
        })
        .collect()
}

/// Hand a batch to every sink.
///
/// Every sink runs even when an earlier one fails; the first failure is
/// returned.
pub async fn dispatch(batch: &ChangeBatch, notifiers: &[Box<dyn Notifier>]) -> Result<()> {
    if notifiers.is_empty() {
        log::debug!("No notification events to run");
        return Ok(());
    }

    let mut first_error = None;
    for notifier in notifiers {
        log::debug!("Running the {} notification", notifier.name());
        if let Err(e) = notifier.notify(batch).await {
            log::error!("Notification {} failed: {}", notifier.name(), e);
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
