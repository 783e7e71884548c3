//! Backend selection by name.
//!
//! Binaries register the storage backends they link against and pick one
//! from [`DbConfig::backend`] at startup.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::repository::{PayrollRepository, RepositoryError};
use crate::calculations::PayrollEngine;
use crate::rate_table::RateTableStore;

/// Which backend to open and how to reach it.
///
/// The connection string is handed to the backend as is: a file path or
/// `:memory:` for `sqlite`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub backend: String,
    pub connection_string: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            connection_string: ":memory:".to_string(),
        }
    }
}

/// Opens one kind of payroll store.
#[async_trait]
pub trait RepositoryFactory: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Returns a repository with its schema in place. Backends that ship
    /// rate tables load them here, so a fresh store can compute at once.
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn PayrollRepository>, RepositoryError>;
}

/// Backends available to a binary, keyed by name.
#[derive(Default)]
pub struct RepositoryRegistry {
    factories: BTreeMap<&'static str, Box<dyn RepositoryFactory>>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `factory`; a later factory with the same name wins.
    pub fn register(
        &mut self,
        factory: Box<dyn RepositoryFactory>,
    ) {
        self.factories.insert(factory.backend_name(), factory);
    }

    /// Registered backend names in alphabetical order.
    pub fn available_backends(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    /// # Errors
    ///
    /// [`RepositoryError::Configuration`] for an unregistered backend; any
    /// error the backend itself reports otherwise.
    pub async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn PayrollRepository>, RepositoryError> {
        let Some(factory) = self.factories.get(config.backend.as_str()) else {
            return Err(RepositoryError::Configuration(format!(
                "unknown backend '{}'; available: {}",
                config.backend,
                self.available_backends().join(", ")
            )));
        };
        factory.create(config).await
    }

    /// Opens the configured store and builds an engine over every rate table
    /// version it holds.
    pub async fn open_engine(
        &self,
        config: &DbConfig,
    ) -> Result<(Arc<dyn PayrollRepository>, PayrollEngine), RepositoryError> {
        let repo: Arc<dyn PayrollRepository> = Arc::from(self.create(config).await?);
        let store = RateTableStore::load(repo.as_ref()).await?;
        if store.is_empty() {
            warn!(backend = %config.backend, "no rate tables stored; every period will fail");
        } else {
            info!(backend = %config.backend, versions = store.len(), "rate tables loaded");
        }
        Ok((repo, PayrollEngine::new(store)))
    }
}
