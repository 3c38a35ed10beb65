//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::model::Level;
use crate::{Error, Result};

/// Limits applied to every engine call.
///
/// Unset fields in JSON fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fan-out cap for per-cell collaborator lookups.
    pub max_concurrency: usize,
    /// Rows per adjacency upsert batch.
    pub batch_size: usize,
    /// Cap on cells materialized by one traversal or graph load.
    pub max_cells: usize,
    /// Finest resolution level accepted.
    pub max_level: Level,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 32,
            batch_size: 1000,
            max_cells: 100_000,
            max_level: 30,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn with_max_cells(mut self, n: usize) -> Self {
        self.max_cells = n;
        self
    }

    pub fn with_max_level(mut self, level: Level) -> Self {
        self.max_level = level;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::Config("max_concurrency must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        if self.max_cells == 0 {
            return Err(Error::Config("max_cells must be at least 1".into()));
        }
        Ok(())
    }

    /// Reject levels finer than `max_level`.
    pub fn check_level(&self, level: Level) -> Result<()> {
        if level > self.max_level {
            return Err(Error::InvalidInput(format!(
                "level {level} out of range (max {})",
                self.max_level
            )));
        }
        Ok(())
    }
}
