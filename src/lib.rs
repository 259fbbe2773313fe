// src/lib.rs

//! Change Poller Library
//!
//! Watches web page elements and reports when their content changes.

pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
