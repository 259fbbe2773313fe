// src/services/fetcher.rs

//! Page content fetching.
//!
//! A fetcher loads a page and returns the text of the first element matching
//! a CSS selector. Pattern refinement happens later, in the extraction step.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Config, Driver};

/// What a fetcher saw on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFetch {
    /// The selector matched; `text` is the element text
    Page { text: String, title: String },
    /// The page could not be loaded
    TransportError(String),
    /// The page loaded but no element matched the selector
    ElementNotFound(String),
}

/// Trait for page fetcher implementations.
///
/// An `Err` is treated by the caller like `RawFetch::TransportError`.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, selector: &str) -> Result<RawFetch>;
}

/// Build the fetcher for the configured driver.
pub fn build_fetcher(config: &Config) -> Result<Box<dyn PageFetcher>> {
    log::debug!("Using the {} driver", config.driver);
    match config.driver {
        Driver::Http => Ok(Box::new(HttpFetcher::new(config)?)),
    }
}

/// Fetcher for static pages over plain HTTP.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with the configured user agent and timeout.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, selector: &str) -> Result<RawFetch> {
        log::debug!("Loading {url}");

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Ok(RawFetch::TransportError(format!("timed out: {e}")));
            }
            Err(e) => return Err(AppError::fetch(url, e)),
        };
        let html = response.error_for_status()?.text().await?;

        Ok(select_text(&html, selector))
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Collapse runs of whitespace within each line and drop blank lines.
fn normalize_text(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Find the first element matching `selector` in a document.
pub fn select_text(html: &str, selector: &str) -> RawFetch {
    let selector = match parse_selector(selector) {
        Ok(selector) => selector,
        Err(e) => return RawFetch::ElementNotFound(e.to_string()),
    };

    let document = Html::parse_document(html);
    let Some(element) = document.select(&selector).next() else {
        return RawFetch::ElementNotFound("no element matches the selector".to_string());
    };

    let raw: String = element.text().collect();
    let title = parse_selector("title")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .map(|t| normalize_text(&t.text().collect::<String>()))
        .unwrap_or_default();

    RawFetch::Page {
        text: normalize_text(&raw),
        title,
    }
}
