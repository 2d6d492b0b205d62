//! Core engine: fetch → resolve → append → mail, once per invocation.

pub mod fetcher;
pub mod pipeline;
