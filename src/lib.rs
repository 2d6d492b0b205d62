//! TRENDMAIL: trending keywords to affiliate links, appended to a
//! spreadsheet and mailed.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod keywords;
pub mod markup;
pub mod platforms;
pub mod report;
pub mod mail;
pub mod engine;
