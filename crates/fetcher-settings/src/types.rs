use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetcherSettings {
    pub database: DatabaseSettings,
    pub server: ServerSettings,
    pub loader: LoaderSettings,
}

/// Where the SQLite database lives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("fetcher.db"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Title substring listed on the index page when no `q` is given.
    pub search_term: String,
    pub result_limit: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            search_term: "Django".into(),
            result_limit: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoaderSettings {
    pub batch_size: usize,
    pub fill_missing_fields: bool,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            fill_missing_fields: false,
        }
    }
}
