//! Data models for scanned records and submission configuration.

pub mod config;
pub mod record;
