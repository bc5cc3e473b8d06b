use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::engine::EngineSettings;
use crate::fetch::FetchSettings;
use crate::retry::RetryPolicy;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("base url {url:?} is invalid: {message}")]
    InvalidBaseUrl { url: String, message: String },
    #[error("no snapshot store root configured (set store.root or HARVEST_STORE_ROOT)")]
    MissingStoreRoot,
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("fetch.max_attempts must be at least 1")]
    ZeroAttempts,
}

/// Run configuration, loaded once and passed by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestConfig {
    pub base_url: String,
    /// Pages per entity; 0 produces no targets.
    pub pages: u32,
    /// Display name -> URL key.
    pub entities: BTreeMap<String, String>,
    pub store: StoreConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub extract: ExtractSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_raw_container")]
    pub raw_container: String,
    #[serde(default = "default_normalized_container")]
    pub normalized_container: String,
    pub folder: String,
    #[serde(default = "default_raw_prefix")]
    pub raw_snapshot_prefix: String,
    #[serde(default = "default_normalized_name")]
    pub normalized_snapshot_name: String,
}

fn default_raw_container() -> String {
    "bronze".to_string()
}

fn default_normalized_container() -> String {
    "silver".to_string()
}

fn default_raw_prefix() -> String {
    "raw".to_string()
}

fn default_normalized_name() -> String {
    "processed_data".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_factor: u32,
    pub max_in_flight: Option<usize>,
    pub run_deadline_secs: Option<u64>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let fetch = FetchSettings::default();
        let retry = RetryPolicy::default();
        Self {
            connect_timeout_secs: fetch.connect_timeout.as_secs(),
            request_timeout_secs: fetch.request_timeout.as_secs(),
            redirect_limit: fetch.redirect_limit,
            max_bytes: fetch.max_bytes,
            max_attempts: retry.max_attempts,
            initial_backoff_ms: retry.initial_delay.as_millis() as u64,
            backoff_factor: retry.backoff_factor,
            max_in_flight: None,
            run_deadline_secs: None,
        }
    }
}

/// Live-blog teasers and reader call-outs rather than articles.
const DEFAULT_EXCLUDED_TITLE_PATTERNS: &[&str] = &[
    r"Catch up on the Premier League action",
    r"Follow (Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday)'s (Premier League games|Carabao Cup)",
    r"Follow\s+([A-Za-z\s]+)\s+v\s+([A-Za-z\s]+)",
    r"who is your team facing\?",
    r"send us your thoughts",
];

/// CSS selectors for the article extractor, plus title filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractSettings {
    pub article_selector: String,
    pub title_selector: String,
    pub timestamp_selector: String,
    pub paragraph_selector: String,
    /// Regular expressions; a title matching any of them is dropped.
    pub excluded_title_patterns: Vec<String>,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            article_selector: "article".to_string(),
            title_selector: "h2, h3".to_string(),
            timestamp_selector: "[data-testid=\"accessible-timestamp\"]".to_string(),
            paragraph_selector: "p".to_string(),
            excluded_title_patterns: DEFAULT_EXCLUDED_TITLE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl HarvestConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.base_url).map_err(|err| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            message: err.to_string(),
        })?;
        if self.store.folder.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "store.folder",
            });
        }
        if self.store.raw_container.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "store.raw_container",
            });
        }
        if self.store.normalized_container.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "store.normalized_container",
            });
        }
        if self.fetch.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        self.store_root()?;
        Ok(())
    }

    pub fn store_root(&self) -> Result<&Path, ConfigError> {
        self.store
            .root
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ConfigError::MissingStoreRoot)
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_secs(self.fetch.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.fetch.request_timeout_secs),
            redirect_limit: self.fetch.redirect_limit,
            max_bytes: self.fetch.max_bytes,
            ..FetchSettings::default()
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            retry: RetryPolicy {
                max_attempts: self.fetch.max_attempts,
                initial_delay: Duration::from_millis(self.fetch.initial_backoff_ms),
                backoff_factor: self.fetch.backoff_factor,
            },
            max_in_flight: self.fetch.max_in_flight,
            run_deadline: self.fetch.run_deadline_secs.map(Duration::from_secs),
        }
    }
}
