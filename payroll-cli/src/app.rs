//! Wiring between configuration, storage and the engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use payroll_core::db::RepositoryRegistry;
use payroll_core::rate_table::RateTableVersion;
use payroll_core::{
    BatchInput, BatchReport, CancellationFlag, EmployeeTaxProfile, EngineConfig, GrossSalary,
    PayrollEngine, PayrollRecord, PayrollRepository, Period, StoredPayrollRecord, recalculate_all,
};
use payroll_db_sqlite::SqliteRepositoryFactory;
use tracing::debug;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "payroll.toml";

pub fn build_registry() -> RepositoryRegistry {
    let mut registry = RepositoryRegistry::new();
    registry.register(Box::new(SqliteRepositoryFactory));
    registry
}

pub fn parse_config(text: &str) -> Result<EngineConfig> {
    toml::from_str(text).context("invalid configuration")
}

/// Reads `path`, or `payroll.toml` when present, or falls back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.is_file() {
                return Ok(EngineConfig::default());
            }
            default
        }
    };
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config(&text).with_context(|| format!("in config file '{}'", path.display()))
}

/// An open repository together with the engine built from its rate tables.
pub struct Session {
    engine: PayrollEngine,
    repo: Arc<dyn PayrollRepository>,
    config: EngineConfig,
}

impl Session {
    pub async fn open(config: EngineConfig) -> Result<Self> {
        debug!(backend = %config.database.backend, "opening repository");
        let (repo, engine) = build_registry()
            .open_engine(&config.database)
            .await
            .with_context(|| {
                format!(
                    "Failed to open {} database '{}'",
                    config.database.backend, config.database.connection_string
                )
            })?;

        Ok(Self { engine, repo, config })
    }

    pub fn engine(&self) -> &PayrollEngine {
        &self.engine
    }

    pub fn repository(&self) -> &dyn PayrollRepository {
        self.repo.as_ref()
    }

    pub async fn versions(&self) -> Result<Vec<RateTableVersion>> {
        self.repo
            .list_rate_table_versions()
            .await
            .context("Failed to list rate table versions")
    }

    /// Monthly TER computation for one employee. Nothing is stored.
    pub fn compute(
        &self,
        profile: &EmployeeTaxProfile,
        period: Period,
        gross: &GrossSalary,
    ) -> Result<PayrollRecord> {
        self.engine
            .compute_payroll(profile, period, gross)
            .with_context(|| format!("Failed to compute {} for '{}'", period, profile.employee_id))
    }

    pub async fn recalculate(
        &self,
        period: Period,
        inputs: Vec<BatchInput>,
        cancel: &CancellationFlag,
    ) -> Result<BatchReport> {
        recalculate_all(
            &self.engine,
            Arc::clone(&self.repo),
            period,
            inputs,
            &self.config.batch,
            cancel,
        )
        .await
        .with_context(|| format!("Recalculation of {} failed", period))
    }

    pub async fn records(
        &self,
        employee_id: &str,
        fiscal_year: i32,
    ) -> Result<Vec<StoredPayrollRecord>> {
        self.repo
            .list_payroll_records(employee_id, fiscal_year)
            .await
            .with_context(|| format!("Failed to list records of '{}' for {}", employee_id, fiscal_year))
    }
}
