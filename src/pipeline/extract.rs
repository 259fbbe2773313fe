// src/pipeline/extract.rs

//! Fragment extraction from fetched element text.

use crate::models::{ErrorKind, PageSpec};
use crate::pipeline::detect::{Extracted, FetchFailure};
use crate::services::RawFetch;

/// Turn a raw fetch into fragments, applying the page's pattern.
///
/// With a pattern, the capture groups of its first match are the fragments
/// (a group that did not participate yields an empty fragment; a pattern
/// without groups yields the whole match). Without a pattern, the element
/// text is the single fragment, and blank text counts as a failed match.
pub fn extract(page: &PageSpec, raw: RawFetch) -> Result<Extracted, FetchFailure> {
    let (text, title) = match raw {
        RawFetch::Page { text, title } => (text, title),
        RawFetch::TransportError(detail) => {
            return Err(FetchFailure::new(ErrorKind::Unreachable, detail));
        }
        RawFetch::ElementNotFound(detail) => {
            return Err(FetchFailure::new(ErrorKind::NotFound, detail));
        }
    };

    let pattern = page
        .compile_pattern()
        .map_err(|e| FetchFailure::new(ErrorKind::NoMatch, e.to_string()))?;

    let fragments = match pattern {
        Some(regex) => {
            log::debug!("Matching {} against {}", page.url, regex.as_str());
            let caps = regex.captures(&text).ok_or_else(|| {
                FetchFailure::new(ErrorKind::NoMatch, "pattern did not match")
            })?;

            if caps.len() == 1 {
                vec![caps[0].to_string()]
            } else {
                caps.iter()
                    .skip(1)
                    .map(|group| group.map_or_else(String::new, |m| m.as_str().to_string()))
                    .collect()
            }
        }
        None => {
            if text.trim().is_empty() {
                return Err(FetchFailure::new(ErrorKind::NoMatch, "element has no text"));
            }
            vec![text]
        }
    };

    Ok(Extracted { fragments, title })
}
