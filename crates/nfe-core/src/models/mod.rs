//! Data models: document records and run configuration.

pub mod config;
pub mod document;
