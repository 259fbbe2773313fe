// src/models/state.rs

//! Persisted per-page observation state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::utils::get_domain;

/// Why the latest poll of a page failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transport or session failure, including timeouts
    Unreachable,
    /// The selector matched no element
    NotFound,
    /// The pattern did not match, or the element had no text
    NoMatch,
}

impl ErrorKind {
    /// Human-readable description of the failure.
    pub fn description(self) -> &'static str {
        match self {
            Self::Unreachable => "server cannot be contacted",
            Self::NotFound => "element cannot be found",
            Self::NoMatch => "couldn't find what we were looking for",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Observation state for one page, stored as one JSON file per page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageState {
    /// Page URL this state belongs to
    pub url: String,

    /// Host segment of `url`
    pub domain: String,

    /// Fragments seen at the last detected change, in fetch order
    #[serde(default)]
    pub content: Vec<String>,

    /// Page title at the last detected change
    #[serde(default)]
    pub title: String,

    /// UNIX timestamp of the last poll attempt
    #[serde(default)]
    pub last_check: i64,

    /// UNIX timestamp of the last detected change
    #[serde(default)]
    pub last_content_change: i64,

    /// Whether the page is currently failing
    #[serde(default)]
    pub error: bool,

    /// Failure category, present only while `error` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<ErrorKind>,

    /// Pending move to a new canonical URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_url: Option<String>,
}

impl PageState {
    /// Fresh state for a page that has never been observed.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            domain: get_domain(&url),
            url,
            content: Vec::new(),
            title: String::new(),
            last_check: 0,
            last_content_change: 0,
            error: false,
            error_description: None,
            new_url: None,
        }
    }

    /// Apply a pending URL move, returning the URL the state was keyed under.
    ///
    /// `url` and `domain` switch to the new identity and `new_url` is cleared.
    pub fn take_migration(&mut self) -> Option<String> {
        let target = self.new_url.take()?;
        let previous = std::mem::replace(&mut self.url, target);
        self.domain = get_domain(&self.url);
        Some(previous)
    }

    /// Serialize deterministically (struct field order, two-space indent).
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Parse a state file.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
