//! Change detection for a single page.
//!
//! Compares freshly extracted fragments against the stored state, tracks
//! the page's error status and produces a change record when the set of
//! fragments differs.
//!
//! Fragment order is not significant for equality, but the stored content
//! keeps the order of the latest fetch.

use std::collections::HashSet;

use crate::models::{ChangeRecord, ErrorKind, PageState};

/// Content extracted from a successfully fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Fragments in page order
    pub fragments: Vec<String>,
    /// Document title
    pub title: String,
}

/// A failed fetch or extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub kind: ErrorKind,
    /// Underlying error message, for logs only
    pub detail: String,
}

impl FetchFailure {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Set difference between two fragment lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentDiff {
    /// In new but not in old, in new order, without duplicates
    pub added: Vec<String>,
    /// In old but not in new, in old order, without duplicates
    pub removed: Vec<String>,
}

impl FragmentDiff {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Compute the set difference between old and new fragments.
pub fn fragment_diff(old: &[String], new: &[String]) -> FragmentDiff {
    let old_set: HashSet<&str> = old.iter().map(String::as_str).collect();
    let new_set: HashSet<&str> = new.iter().map(String::as_str).collect();

    FragmentDiff {
        added: ordered_difference(new, &old_set),
        removed: ordered_difference(old, &new_set),
    }
}

/// Items of `items` absent from `other`, first occurrence only.
fn ordered_difference(items: &[String], other: &HashSet<&str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        if !other.contains(item.as_str()) && seen.insert(item.as_str()) {
            out.push(item.clone());
        }
    }
    out
}

/// What one poll did to a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Content fetched, same fragment set as before
    Unchanged,
    /// Content fetched, fragment set differs
    Changed(ChangeRecord),
    /// Fetch or extraction failed
    Failed {
        kind: ErrorKind,
        /// The page was already failing before this poll
        repeat: bool,
    },
}

/// Result of running the detector on one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// State to persist
    pub state: PageState,
    pub outcome: Outcome,
    /// The page was failing before and responded again on this poll
    pub recovered: bool,
}

impl Detection {
    pub fn change(&self) -> Option<&ChangeRecord> {
        match &self.outcome {
            Outcome::Changed(change) => Some(change),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }

    /// A failure that was not already ongoing.
    pub fn is_new_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { repeat: false, .. })
    }
}

/// Run change detection for one poll of a page.
///
/// `prior` must already carry the post-migration identity. `now` is the
/// poll timestamp; `last_check` is always set to it.
pub fn detect(
    mut prior: PageState,
    fetched: Result<Extracted, FetchFailure>,
    now: i64,
) -> Detection {
    prior.last_check = now;

    let extracted = match fetched {
        Ok(extracted) => extracted,
        Err(failure) => return record_failure(prior, failure),
    };

    let recovered = prior.error;
    if recovered {
        log::info!("{} is responding again, previously it was not", prior.url);
        prior.error = false;
        prior.error_description = None;
    }

    let diff = fragment_diff(&prior.content, &extracted.fragments);
    if !diff.has_changes() {
        log::debug!("No changes in content for {}", prior.url);
        return Detection {
            state: prior,
            outcome: Outcome::Unchanged,
            recovered,
        };
    }

    log::info!(
        "Content changed for {}: {} added, {} removed",
        prior.url,
        diff.added.len(),
        diff.removed.len()
    );

    prior.content = extracted.fragments;
    prior.title = extracted.title;
    prior.last_content_change = now;

    let change = ChangeRecord {
        added: diff.added,
        removed: diff.removed,
        title: prior.title.clone(),
        url: prior.url.clone(),
        domain: prior.domain.clone(),
    };

    Detection {
        state: prior,
        outcome: Outcome::Changed(change),
        recovered,
    }
}

fn record_failure(mut state: PageState, failure: FetchFailure) -> Detection {
    let repeat = state.error;
    if repeat {
        log::info!(
            "Query for {} is still erroring out. {}, {}",
            state.url,
            failure.detail,
            failure.kind
        );
    } else {
        log::warn!(
            "Query for {} erroring out! {}, {}",
            state.url,
            failure.detail,
            failure.kind
        );
        state.error = true;
    }
    state.error_description = Some(failure.kind);

    Detection {
        state,
        outcome: Outcome::Failed {
            kind: failure.kind,
            repeat,
        },
        recovered: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn extracted(items: &[&str]) -> Result<Extracted, FetchFailure> {
        Ok(Extracted {
            fragments: strings(items),
            title: "Page Title".into(),
        })
    }

    fn stored(items: &[&str]) -> PageState {
        let mut state = PageState::new("https://example.com/page");
        state.content = strings(items);
        state.title = "Old Title".into();
        state.last_content_change = 100;
        state.last_check = 100;
        state
    }

    #[test]
    fn test_no_changes() {
        let result = detect(stored(&["a", "b"]), extracted(&["a", "b"]), 200);

        assert_eq!(result.outcome, Outcome::Unchanged);
        assert_eq!(result.state.last_check, 200);
        assert_eq!(result.state.last_content_change, 100);
        assert_eq!(result.state.title, "Old Title");
    }

    #[test]
    fn test_reordering_is_not_a_change() {
        let prior = stored(&["a", "b", "c"]);
        let result = detect(prior.clone(), extracted(&["c", "a", "b", "a"]), 200);

        assert!(result.change().is_none());
        assert_eq!(result.state.content, prior.content);
        assert_eq!(result.state.title, prior.title);
        assert_eq!(result.state.last_content_change, prior.last_content_change);
    }

    #[test]
    fn test_change_records_set_difference() {
        let result = detect(stored(&["keep", "gone"]), extracted(&["new", "keep"]), 200);

        let change = result.change().unwrap();
        assert_eq!(change.added, strings(&["new"]));
        assert_eq!(change.removed, strings(&["gone"]));
        assert_eq!(change.title, "Page Title");
        assert_eq!(change.domain, "example.com");
    }

    #[test]
    fn test_change_keeps_fetch_order() {
        let result = detect(stored(&["a"]), extracted(&["z", "a", "m"]), 200);

        assert_eq!(result.state.content, strings(&["z", "a", "m"]));
        assert_eq!(result.state.title, "Page Title");
        assert_eq!(result.state.last_content_change, 200);
    }

    #[test]
    fn test_added_and_removed_are_disjoint_and_deduplicated() {
        let old = strings(&["x", "y", "y", "shared"]);
        let new = strings(&["shared", "n", "n", "m"]);

        let diff = fragment_diff(&old, &new);

        assert_eq!(diff.added, strings(&["n", "m"]));
        assert_eq!(diff.removed, strings(&["x", "y"]));
        assert!(diff.added.iter().all(|a| !diff.removed.contains(a)));
    }

    #[test]
    fn test_first_content_is_a_change() {
        let result = detect(PageState::new("https://example.com/"), extracted(&["v1"]), 5);

        let change = result.change().unwrap();
        assert_eq!(change.added, strings(&["v1"]));
        assert!(change.removed.is_empty());
    }

    #[test]
    fn test_failure_keeps_content() {
        let failure = FetchFailure::new(ErrorKind::Unreachable, "timed out");
        let result = detect(stored(&["a"]), Err(failure), 300);

        assert!(result.is_new_failure());
        assert!(result.state.error);
        assert_eq!(result.state.error_description, Some(ErrorKind::Unreachable));
        assert_eq!(result.state.content, strings(&["a"]));
        assert_eq!(result.state.last_check, 300);
        assert_eq!(result.state.last_content_change, 100);
    }

    #[test]
    fn test_repeated_failure_is_not_new() {
        let first = detect(
            stored(&["a"]),
            Err(FetchFailure::new(ErrorKind::NotFound, "no element")),
            300,
        );
        let second = detect(
            first.state,
            Err(FetchFailure::new(ErrorKind::NoMatch, "no match")),
            400,
        );

        assert!(second.is_failure());
        assert!(!second.is_new_failure());
        assert_eq!(second.state.error_description, Some(ErrorKind::NoMatch));
    }

    #[test]
    fn test_recovery_clears_error() {
        let failed = detect(
            stored(&["a"]),
            Err(FetchFailure::new(ErrorKind::Unreachable, "refused")),
            300,
        );
        let recovered = detect(failed.state, extracted(&["a"]), 400);

        assert!(recovered.recovered);
        assert_eq!(recovered.outcome, Outcome::Unchanged);
        assert!(!recovered.state.error);
        assert!(recovered.state.error_description.is_none());

        let json = recovered.state.to_json().unwrap();
        assert!(!json.contains("error_description"));
    }
}
