//! Change records handed to notification sinks.

use serde::{Deserialize, Serialize};

/// What changed on one page during a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeRecord {
    /// Fragments present now but not before
    pub added: Vec<String>,
    /// Fragments present before but not now
    pub removed: Vec<String>,
    pub title: String,
    pub url: String,
    pub domain: String,
}

/// All changes detected during one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeBatch {
    /// UNIX timestamp of batch creation
    pub timestamp: i64,
    pub changed_count: usize,
    pub changes: Vec<ChangeRecord>,
}

impl ChangeBatch {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            changed_count: 0,
            changes: Vec::new(),
        }
    }

    /// Append a change, keeping `changed_count` in step.
    pub fn push(&mut self, change: ChangeRecord) {
        self.changes.push(change);
        self.changed_count = self.changes.len();
    }

    pub fn is_empty(&self) -> bool {
        self.changed_count == 0
    }

    /// Distinct domains of the changed pages, in change order.
    pub fn domains(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for change in &self.changes {
            if !seen.contains(&change.domain.as_str()) {
                seen.push(&change.domain);
            }
        }
        seen
    }
}
