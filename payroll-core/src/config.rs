//! Engine configuration.
//!
//! Deserialized by the binaries (from TOML) and handed to the engine
//! explicitly. Every section has defaults, so an empty file is valid.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::db::DbConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database: DbConfig,
    pub batch: BatchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Employees computed at the same time during a batch recalculation.
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

impl BatchConfig {
    /// `max_concurrency`, never less than one.
    pub fn permits(&self) -> usize {
        self.max_concurrency.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Bare level or full `EnvFilter` directive. `RUST_LOG` takes precedence.
    pub level: String,
    /// Log records are also appended here when set.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_use_in_memory_sqlite() {
        let config = EngineConfig::default();

        assert_eq!(config.database.backend, "sqlite");
        assert_eq!(config.batch.max_concurrency, 4);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, None);
    }

    #[test]
    fn zero_concurrency_still_permits_one_task() {
        let config = BatchConfig { max_concurrency: 0 };

        assert_eq!(config.permits(), 1);
    }
}
