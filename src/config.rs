use std::{path::Path, time::Duration};

use serde::Deserialize;

use crate::{common::PoolResult, error::PoolError};

/// Idle time after which a worker is evicted when no expiry is configured.
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(3);

pub const DEFAULT_THREAD_NAME_PREFIX: &str = "workhive-worker";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of workers executing a task at the same time
    pub capacity: usize,
    /// How long a worker may sit idle before the reaper evicts it.
    /// Also the reaper's tick interval.
    pub expiry: Duration,
    /// Worker threads are named `<prefix>-<worker id>`
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: num_cpus::get(),
            expiry: DEFAULT_EXPIRY,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

impl PoolConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn validate(&self) -> PoolResult<()> {
        if self.capacity == 0 {
            return Err(PoolError::invalid_config(
                "capacity must be greater than zero",
            ));
        }
        if self.expiry.is_zero() {
            return Err(PoolError::invalid_config("expiry must be greater than zero"));
        }
        Ok(())
    }

    /// Parse the `[pool]` table of a TOML document.
    ///
    /// ```toml
    /// [pool]
    /// capacity = 16
    /// expire = 3      # seconds
    /// ```
    ///
    /// Keys that are absent keep their default value. A document without a
    /// `[pool]` table yields the default config.
    pub fn from_toml_str(source: &str) -> PoolResult<Self> {
        let file: ConfigFile = toml::from_str(source)
            .map_err(|e| PoolError::config(format!("failed to parse pool config: {e}")))?;

        let mut config = Self::default();
        let Some(section) = file.pool else {
            return Ok(config);
        };

        if let Some(capacity) = section.capacity {
            config.capacity = positive(capacity, "capacity")? as usize;
        }
        if let Some(expire) = section.expire {
            config.expiry = Duration::from_secs(positive(expire, "expire")?);
        }
        if let Some(prefix) = section.thread_name_prefix {
            config.thread_name_prefix = prefix;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> PoolResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            PoolError::config(format!("failed to read {}: {e}", path.display()))
        })?;

        Self::from_toml_str(&source)
    }
}

fn positive(value: i64, key: &str) -> PoolResult<u64> {
    if value <= 0 {
        return Err(PoolError::invalid_config(format!(
            "{key} must be greater than zero, got {value}"
        )));
    }
    Ok(value as u64)
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    pool: Option<PoolSection>,
}

#[derive(Debug, Deserialize)]
struct PoolSection {
    capacity: Option<i64>,
    expire: Option<i64>,
    thread_name_prefix: Option<String>,
}
