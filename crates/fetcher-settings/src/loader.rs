//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`FetcherSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `FETCHER_*` environment overrides (highest priority)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::FetcherSettings;

pub const DEFAULT_SETTINGS_FILE: &str = "fetcher.json";

/// Settings file looked up in the working directory.
pub fn settings_path() -> PathBuf {
    PathBuf::from(DEFAULT_SETTINGS_FILE)
}

/// Load settings from `path` with env var overrides.
///
/// A missing file yields defaults; a file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<FetcherSettings> {
    let mut settings = load_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn load_file(path: &Path) -> Result<FetcherSettings> {
    let defaults = serde_json::to_value(FetcherSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// Objects merge per key, anything else in `source` replaces `target`, and
/// nulls in `source` are skipped.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `FETCHER_*` environment variables to loaded settings.
pub fn apply_env_overrides(settings: &mut FetcherSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`. Values that fail to parse are
/// logged and ignored.
pub fn apply_overrides<F>(settings: &mut FetcherSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = string("FETCHER_DB_PATH") {
        settings.database.path = PathBuf::from(v);
    }
    if let Some(v) = string("FETCHER_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = string("FETCHER_PORT") {
        match parse_u16_range(&v, 1, u16::MAX) {
            Some(port) => settings.server.port = port,
            None => warn!(key = "FETCHER_PORT", value = %v, "invalid port, ignoring"),
        }
    }
    if let Some(v) = string("FETCHER_SEARCH_TERM") {
        settings.server.search_term = v;
    }
    if let Some(v) = string("FETCHER_BATCH_SIZE") {
        match parse_usize_range(&v, 1, 1_000_000) {
            Some(size) => settings.loader.batch_size = size,
            None => warn!(key = "FETCHER_BATCH_SIZE", value = %v, "invalid batch size, ignoring"),
        }
    }
    if let Some(v) = string("FETCHER_FILL_MISSING") {
        match parse_bool(&v) {
            Some(fill) => settings.loader.fill_missing_fields = fill,
            None => warn!(key = "FETCHER_FILL_MISSING", value = %v, "invalid boolean, ignoring"),
        }
    }
}

/// Accepts (case-insensitive) `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}
