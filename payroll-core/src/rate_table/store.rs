use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::snapshot::{RateTableError, RateTableSnapshot, RateTableVersion};
use crate::db::repository::{PayrollRepository, RepositoryError};

/// Every loaded rate-table version, keyed by effective date.
///
/// Snapshots are shared behind [`Arc`] and never mutated; concurrent payroll
/// computations only ever read them.
#[derive(Debug, Clone, Default)]
pub struct RateTableStore {
    versions: BTreeMap<NaiveDate, Arc<RateTableSnapshot>>,
}

impl RateTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from every version the repository holds.
    pub async fn load(repo: &dyn PayrollRepository) -> Result<Self, RepositoryError> {
        let mut store = Self::new();
        for version in repo.list_rate_table_versions().await? {
            let snapshot = repo.get_rate_table(version.effective_from).await?;
            store
                .insert(snapshot)
                .map_err(|e| RepositoryError::Database(e.to_string()))?;
        }

        if store.is_empty() {
            warn!("no rate table versions found; every computation will fail");
        } else {
            debug!(versions = store.len(), "rate tables loaded");
        }
        Ok(store)
    }

    /// Adds a version. Versions are immutable once added.
    pub fn insert(
        &mut self,
        snapshot: RateTableSnapshot,
    ) -> Result<(), RateTableError> {
        let effective_from = snapshot.effective_from();
        if self.versions.contains_key(&effective_from) {
            return Err(RateTableError::DuplicateVersion(effective_from));
        }
        self.versions.insert(effective_from, Arc::new(snapshot));
        Ok(())
    }

    /// The version in force on `date`: the latest one effective on or before it.
    pub fn get(
        &self,
        date: NaiveDate,
    ) -> Result<Arc<RateTableSnapshot>, RateTableError> {
        self.versions
            .range(..=date)
            .next_back()
            .map(|(_, snapshot)| Arc::clone(snapshot))
            .ok_or(RateTableError::NoVersionInForce(date))
    }

    pub fn versions(&self) -> Vec<&RateTableVersion> {
        self.versions.values().map(|s| s.version()).collect()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}
