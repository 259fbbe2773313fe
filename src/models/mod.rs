// src/models/mod.rs

//! Domain models for the poller.
//!
//! Page definitions and run options come from configuration; page state is
//! persisted between runs; change records only live for one run.

mod change;
mod config;
mod page;
mod state;

// Re-export all public types
pub use change::{ChangeBatch, ChangeRecord};
pub use config::{Config, Driver, Event, PartialConfig};
pub use page::PageSpec;
pub use state::{ErrorKind, PageState};
