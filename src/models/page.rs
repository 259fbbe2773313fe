// src/models/page.rs

//! Page definition structure.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::url::is_valid_url;

/// One configured page to watch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageSpec {
    /// Page URL, unique across the configured pages
    pub url: String,

    /// CSS selector for the watched element
    pub selector: String,

    /// Optional regex applied to the element text; its capture groups
    /// become the watched fragments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl PageSpec {
    /// Create a page definition without a pattern.
    pub fn new(url: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            selector: selector.into(),
            pattern: None,
        }
    }

    /// Attach a pattern to this page definition.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Compile the optional pattern.
    pub fn compile_pattern(&self) -> Result<Option<Regex>> {
        self.pattern
            .as_deref()
            .map(|p| Regex::new(p).map_err(|e| AppError::pattern(&self.url, e)))
            .transpose()
    }

    /// Check the URL grammar and pattern of this definition.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_url(&self.url) {
            return Err(AppError::validation(format!(
                "Malformed url \"{}\"",
                self.url
            )));
        }
        ::url::Url::parse(&self.url)?;
        if self.selector.trim().is_empty() {
            return Err(AppError::validation(format!(
                "Empty selector for \"{}\"",
                self.url
            )));
        }
        self.compile_pattern()?;
        Ok(())
    }
}
