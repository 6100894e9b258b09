//! # fetcher-settings
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`FetcherSettings::default()`]
//! 2. **Settings file**: `fetcher.json` or the path given on the command line
//! 3. **Environment variables**: `FETCHER_*` overrides

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings_from_path, settings_path};
pub use types::*;
