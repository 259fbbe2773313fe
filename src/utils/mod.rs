//! Utility functions and helpers.

pub mod fs;
pub mod log;
pub mod url;

pub use self::url::{get_domain, slug};
