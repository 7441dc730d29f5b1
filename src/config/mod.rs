//! Replay cache configuration and the cacheability resolver.
//!
//! A configuration names the action types that should be recorded:
//!
//! ```json
//! { "cache": { "FETCH_PROFILE": {}, "SAVE_DRAFT": {} } }
//! ```
//!
//! The presence of a key, not its value, makes a type cacheable. Per-type
//! values are opaque, reserved for future options, and are kept as-is.
//!
//! A [`Config`] is built once, handed to the store at construction, and never
//! mutated afterwards.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::action::ControlKind;

/// Errors produced while loading a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Per-type options. Currently uninterpreted.
///
/// Any JSON value is accepted; only the presence of the key matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheOptions(Value);

impl Default for CacheOptions {
    fn default() -> Self {
        Self(Value::Object(Map::new()))
    }
}

impl CacheOptions {
    /// Empty options, serialized as `{}`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw option value as it was configured.
    pub fn raw(&self) -> &Value {
        &self.0
    }
}

/// The set of cacheable action types.
///
/// # Examples
///
/// ```
/// use retrace::config::Config;
///
/// let config = Config::new().cacheable("FETCH");
/// assert!(config.is_cacheable("FETCH"));
/// assert!(!config.is_cacheable("fetch"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, deserialize_with = "null_as_empty")]
    cache: BTreeMap<String, CacheOptions>,
}

// `"cache": null` reads as "nothing is cacheable".
fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, CacheOptions>, D::Error>
where
    D: Deserializer<'de>,
{
    let cache: Option<BTreeMap<String, CacheOptions>> = Option::deserialize(deserializer)?;
    Ok(cache.unwrap_or_default())
}

impl Config {
    /// Creates a configuration in which nothing is cacheable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `kind` as cacheable with empty options.
    #[must_use]
    pub fn cacheable(self, kind: impl Into<String>) -> Self {
        self.cacheable_with(kind, CacheOptions::new())
    }

    /// Marks `kind` as cacheable with the given options.
    #[must_use]
    pub fn cacheable_with(mut self, kind: impl Into<String>, options: CacheOptions) -> Self {
        let kind = kind.into();
        warn_if_reserved(&kind);
        self.cache.insert(kind, options);
        self
    }

    /// Parses a configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is not valid JSON or
    /// does not have the `{ "cache": { ... } }` shape.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(raw)?;
        for kind in config.cache.keys() {
            warn_if_reserved(kind);
        }
        debug!(types = config.cache.len(), "loaded replay cache config");
        Ok(config)
    }

    /// Reads and parses a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if its contents are invalid.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&raw)
    }

    /// True iff `kind` is a key of the `cache` map. Matching is exact.
    pub fn is_cacheable(&self, kind: &str) -> bool {
        self.cache.contains_key(kind)
    }

    pub fn options(&self, kind: &str) -> Option<&CacheOptions> {
        self.cache.get(kind)
    }

    /// Iterates the configured type tags in sorted order.
    pub fn cacheable_types(&self) -> impl Iterator<Item = &str> {
        self.cache.keys().map(String::as_str)
    }
}

/// Resolves whether `kind` is cacheable. An absent config caches nothing.
pub fn is_cacheable(kind: &str, config: Option<&Config>) -> bool {
    config.is_some_and(|config| config.is_cacheable(kind))
}

// Control tags may appear in a config but are never cached.
fn warn_if_reserved(kind: &str) {
    if ControlKind::from_tag(kind).is_some() {
        warn!(kind, "reserved control action type configured as cacheable; it will never be cached");
    }
}
