//! Helpers for building the per-function `Config` structs.
//!
//! Lookups are passed in as closures so that configuration can be exercised
//! in tests without mutating the process environment. Unset and empty
//! values are treated the same.

use crate::error::{Result, ViewError};

pub fn required<F>(lookup: &F, name: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ViewError::Configuration(name.to_string())),
    }
}

pub fn optional<F>(lookup: &F, name: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => value,
        _ => default.to_string(),
    }
}

/// Reads from the process environment.
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
