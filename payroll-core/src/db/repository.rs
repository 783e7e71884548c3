use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{PayrollRecord, Period, StoredPayrollRecord};
use crate::rate_table::{RateTableParts, RateTableSnapshot, RateTableVersion};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

#[async_trait]
pub trait PayrollRepository: Send + Sync {
    // Rate tables
    async fn list_rate_table_versions(&self) -> Result<Vec<RateTableVersion>, RepositoryError>;

    /// Loads and validates the version effective from exactly `effective_from`.
    async fn get_rate_table(
        &self,
        effective_from: NaiveDate,
    ) -> Result<RateTableSnapshot, RepositoryError>;

    /// Stores a new version. Existing versions are never overwritten.
    async fn save_rate_table(
        &self,
        parts: &RateTableParts,
    ) -> Result<(), RepositoryError>;

    // Payroll records

    /// Inserts `record` as the next revision for its employee and period.
    async fn save_payroll_record(
        &self,
        record: &PayrollRecord,
    ) -> Result<StoredPayrollRecord, RepositoryError>;

    /// Latest revision for one employee and period.
    async fn get_payroll_record(
        &self,
        employee_id: &str,
        period: Period,
    ) -> Result<StoredPayrollRecord, RepositoryError>;

    /// Latest revision of every period in `fiscal_year`, in period order.
    async fn list_payroll_records(
        &self,
        employee_id: &str,
        fiscal_year: i32,
    ) -> Result<Vec<StoredPayrollRecord>, RepositoryError>;
}
