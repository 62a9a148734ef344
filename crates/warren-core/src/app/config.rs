//! PoolConfig - pool の設定

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::ConfigError;

/// Capacity used when none is configured.
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Environment variable overriding `PoolConfig::max`.
pub const MAX_WORKERS_ENV: &str = "WARREN_MAX_WORKERS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of workers the pool will ever create.
    pub max: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max: DEFAULT_MAX_WORKERS,
        }
    }
}

impl PoolConfig {
    pub fn new(max: usize) -> Self {
        Self { max }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }

    /// Read `WARREN_MAX_WORKERS`; missing or empty falls back to the default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let max = match lookup(MAX_WORKERS_ENV).filter(|v| !v.trim().is_empty()) {
            Some(value) => usize::from_str(value.trim()).map_err(|e| ConfigError::Parse {
                key: MAX_WORKERS_ENV.into(),
                value: value.clone(),
                error: e.to_string(),
            })?,
            None => DEFAULT_MAX_WORKERS,
        };
        let config = Self { max };
        config.validate()?;
        Ok(config)
    }
}
