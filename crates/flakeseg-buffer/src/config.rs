//! Buffer capacity configuration.

use flakeseg_error::{FlakeError, Result};
use serde::{Deserialize, Serialize};

/// Default hot tier capacity in production.
pub const DEFAULT_HOT_CAPACITY: usize = 100;
/// Default cold tier capacity in production.
pub const DEFAULT_COLD_CAPACITY: usize = 2000;

/// Environment variable overriding [`BufferConfig::hot_capacity`].
pub const HOT_CAPACITY_ENV: &str = "FLAKESEG_HOT_CAPACITY";
/// Environment variable overriding [`BufferConfig::cold_capacity`].
pub const COLD_CAPACITY_ENV: &str = "FLAKESEG_COLD_CAPACITY";

/// Capacities of the two input buffer tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Verdict count at which the hot tier is compacted into the cold tier.
    pub hot_capacity: usize,
    /// Verdict count beyond which the analyzer is expected to evict.
    pub cold_capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            hot_capacity: DEFAULT_HOT_CAPACITY,
            cold_capacity: DEFAULT_COLD_CAPACITY,
        }
    }
}

impl BufferConfig {
    #[must_use]
    pub const fn new(hot_capacity: usize, cold_capacity: usize) -> Self {
        Self {
            hot_capacity,
            cold_capacity,
        }
    }

    /// Defaults overridden by [`HOT_CAPACITY_ENV`] / [`COLD_CAPACITY_ENV`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(raw) = lookup(HOT_CAPACITY_ENV) {
            config.hot_capacity = parse_capacity(HOT_CAPACITY_ENV, &raw)?;
        }
        if let Some(raw) = lookup(COLD_CAPACITY_ENV) {
            config.cold_capacity = parse_capacity(COLD_CAPACITY_ENV, &raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject capacities the buffer cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.hot_capacity == 0 {
            return Err(FlakeError::invalid_config("hot_capacity must be at least 1"));
        }
        if self.hot_capacity > self.cold_capacity {
            return Err(FlakeError::invalid_config(format!(
                "hot_capacity ({}) must not exceed cold_capacity ({})",
                self.hot_capacity, self.cold_capacity
            )));
        }
        Ok(())
    }
}

fn parse_capacity(name: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|e| FlakeError::invalid_config(format!("{name}={raw:?}: {e}")))
}
