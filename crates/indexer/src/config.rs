use crate::error::{IndexerError, Result};
use inventory_store::{StoreOptions, WriteQueueConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Prefix of the environment variables that override file settings,
/// e.g. `INVENTORY_INDEX_QUEUE_CAPACITY=256`.
pub const ENV_PREFIX: &str = "INVENTORY_INDEX_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Directory holding the store snapshot and journal.
    pub store_path: PathBuf,
    pub queue_capacity: usize,
    pub shutdown_timeout_ms: u64,
    /// Journal entries before the store folds them into a new snapshot.
    pub compact_after: usize,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("data/inventory-index"),
            queue_capacity: 1024,
            shutdown_timeout_ms: 5_000,
            compact_after: 4096,
            cache_capacity: 10_000,
            cache_ttl_secs: 300,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl IndexerConfig {
    /// Defaults, then the TOML file at `path` (if any), then environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_overrides(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| IndexerError::Config(e.to_string()))
    }

    /// Apply `INVENTORY_INDEX_*` pairs; unrelated keys are ignored.
    pub fn apply_overrides<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "STORE_PATH" => self.store_path = PathBuf::from(value),
                "QUEUE_CAPACITY" => self.queue_capacity = parse(&key, &value)?,
                "SHUTDOWN_TIMEOUT_MS" => self.shutdown_timeout_ms = parse(&key, &value)?,
                "COMPACT_AFTER" => self.compact_after = parse(&key, &value)?,
                "CACHE_CAPACITY" => self.cache_capacity = parse(&key, &value)?,
                "CACHE_TTL_SECS" => self.cache_ttl_secs = parse(&key, &value)?,
                "DEFAULT_PAGE_SIZE" => self.default_page_size = parse(&key, &value)?,
                "MAX_PAGE_SIZE" => self.max_page_size = parse(&key, &value)?,
                _ => log::warn!("Ignoring unknown setting {key}"),
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(IndexerError::Config(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.default_page_size == 0 {
            return Err(IndexerError::Config(
                "default_page_size must be at least 1".to_string(),
            ));
        }
        if self.max_page_size < self.default_page_size {
            return Err(IndexerError::Config(format!(
                "max_page_size ({}) is smaller than default_page_size ({})",
                self.max_page_size, self.default_page_size
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn queue_config(&self) -> WriteQueueConfig {
        WriteQueueConfig {
            capacity: self.queue_capacity,
            shutdown_timeout: Duration::from_millis(self.shutdown_timeout_ms),
        }
    }

    #[must_use]
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            compact_after: self.compact_after,
        }
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Clamp a requested page: pages start at 1, a zero size means the
    /// default and sizes never exceed the maximum.
    #[must_use]
    pub fn normalize_page(&self, page: usize, page_size: usize) -> (usize, usize) {
        let page = page.max(1);
        let page_size = if page_size == 0 {
            self.default_page_size
        } else {
            page_size.min(self.max_page_size)
        };
        (page, page_size)
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| IndexerError::Config(format!("{key}={value}: {e}")))
}
