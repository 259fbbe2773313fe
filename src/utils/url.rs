// src/utils/url.rs

//! URL manipulation utilities.

use std::sync::LazyLock;

use regex::Regex;

/// Permissive URL grammar accepted for page definitions.
static URL_GRAMMAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://[-a-zA-Z0-9@:%._+~#=]{2,256}\.[a-z]{2,63}/?[-a-zA-Z0-9@:%_+.~#?&/=]*",
    )
    .expect("URL grammar is a valid regex")
});

/// Characters that may not appear in a state file name.
static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-. ]").expect("slug pattern is a valid regex"));

/// Check a URL against the page definition grammar.
///
/// # Examples
/// ```
/// use change_poller::utils::url::is_valid_url;
///
/// assert!(is_valid_url("https://example.com/news"));
/// assert!(!is_valid_url("ftp://example.com"));
/// ```
pub fn is_valid_url(url: &str) -> bool {
    URL_GRAMMAR.is_match(url)
}

/// Everything after the scheme separator, or the whole string without one.
fn strip_scheme(url: &str) -> &str {
    url.find("://").map_or(url, |idx| &url[idx + 3..])
}

/// Extract the host segment (including any port) from a URL.
///
/// # Examples
/// ```
/// use change_poller::utils::url::get_domain;
///
/// assert_eq!(get_domain("https://example.com/path"), "example.com");
/// assert_eq!(get_domain("http://localhost:8080/x"), "localhost:8080");
/// ```
pub fn get_domain(url: &str) -> String {
    strip_scheme(url)
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Derive a filesystem-safe identifier from a URL.
///
/// The scheme is dropped, every character outside word characters, `-`, `.`
/// and space becomes `_`, and leading/trailing underscores are trimmed.
/// Distinct URLs can collide (`a/b` and `a_b`); colliding pages share state.
pub fn slug(url: &str) -> String {
    let replaced = UNSAFE_CHARS.replace_all(strip_scheme(url), "_");
    let trimmed = replaced.trim_matches('_');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}
