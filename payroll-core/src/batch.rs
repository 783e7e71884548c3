//! Company-wide recalculation of one period.
//!
//! The rate tables are resolved once; without them nothing can be computed
//! and the whole batch fails. After that every employee succeeds or fails on
//! their own: failures are collected, the batch carries on.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::calculations::{PayrollCalculator, PayrollEngine, PayrollError, Pph21Ledger, validate_input};
use crate::config::BatchConfig;
use crate::db::{PayrollRepository, RepositoryError};
use crate::models::{
    AnnualHistory, EmployeeTaxProfile, GrossSalary, Period, PeriodKind, PriorEmployment,
    StoredPayrollRecord,
};

/// Everything needed to compute one employee's period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchInput {
    pub profile: EmployeeTaxProfile,
    pub gross: GrossSalary,
    /// First month employed in this fiscal year.
    pub start_month: u32,
    pub prior_employment: PriorEmployment,
    /// The employee leaves in this period, which settles their year.
    pub terminated: bool,
}

impl BatchInput {
    pub fn new(
        profile: EmployeeTaxProfile,
        gross: GrossSalary,
    ) -> Self {
        Self {
            profile,
            gross,
            start_month: 1,
            prior_employment: PriorEmployment::None,
            terminated: false,
        }
    }

    /// Checks that can fail before anything is read or computed.
    pub fn validate(
        &self,
        period: Period,
    ) -> Result<(), PayrollError> {
        let history = AnnualHistory {
            start_month: self.start_month,
            prior_employment: self.prior_employment.clone(),
            ..AnnualHistory::new(period.year())
        };
        validate_input(&self.profile, period, &self.gross, &history)
    }

    /// Termination settles in any month; otherwise December settles the year.
    pub fn period_kind(
        &self,
        period: Period,
    ) -> PeriodKind {
        if self.terminated {
            PeriodKind::Termination
        } else if period.is_december() {
            PeriodKind::YearEnd
        } else {
            PeriodKind::Monthly
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Configuration,
    Input,
    Persistence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub employee_id: String,
    pub kind: FailureKind,
    pub reason: String,
}

impl BatchFailure {
    fn from_payroll(
        employee_id: &str,
        error: &PayrollError,
    ) -> Self {
        Self {
            employee_id: employee_id.to_string(),
            kind: if error.is_configuration() {
                FailureKind::Configuration
            } else {
                FailureKind::Input
            },
            reason: error.to_string(),
        }
    }

    fn from_repository(
        employee_id: &str,
        error: &RepositoryError,
    ) -> Self {
        Self {
            employee_id: employee_id.to_string(),
            kind: FailureKind::Persistence,
            reason: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub period: Period,
    pub rate_table_version: NaiveDate,
    /// Saved records, in input order.
    pub records: Vec<StoredPayrollRecord>,
    pub failures: Vec<BatchFailure>,
    /// Employees not started because the batch was cancelled.
    pub skipped: Vec<String>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("cannot recalculate {period}: {source}")]
    RateTables {
        period: Period,
        #[source]
        source: PayrollError,
    },

    #[error("batch worker failed: {0}")]
    Worker(String),
}

/// Shared flag checked before each employee starts.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

enum Outcome {
    Saved(StoredPayrollRecord),
    Failed(BatchFailure),
}

/// Recomputes `period` for every input and stores one new revision each.
///
/// # Errors
///
/// [`BatchError::RateTables`] when no rate table is in force for the period;
/// [`BatchError::Worker`] when a worker task panics.
pub async fn recalculate_all(
    engine: &PayrollEngine,
    repo: Arc<dyn PayrollRepository>,
    period: Period,
    inputs: Vec<BatchInput>,
    config: &BatchConfig,
    cancel: &CancellationFlag,
) -> Result<BatchReport, BatchError> {
    let calculator = engine
        .calculator_for(period)
        .map_err(|source| BatchError::RateTables { period, source })?;
    let rate_table_version = calculator.snapshot().effective_from();
    info!(%period, %rate_table_version, employees = inputs.len(), "recalculating period");

    let semaphore = Arc::new(Semaphore::new(config.permits()));
    let mut join_set = JoinSet::new();
    let mut skipped = Vec::new();
    let total = inputs.len();

    for (index, input) in inputs.into_iter().enumerate() {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|e| BatchError::Worker(e.to_string()))?;
        if cancel.is_cancelled() {
            skipped.push(input.profile.employee_id);
            continue;
        }

        let calculator = calculator.clone();
        let repo = Arc::clone(&repo);
        join_set.spawn(async move {
            let outcome = process_employee(&calculator, repo.as_ref(), period, &input).await;
            drop(permit);
            (index, outcome)
        });
    }

    let mut outcomes: Vec<Option<Outcome>> = (0..total).map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        let (index, outcome) = joined.map_err(|e| BatchError::Worker(e.to_string()))?;
        outcomes[index] = Some(outcome);
    }

    let mut records = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes.into_iter().flatten() {
        match outcome {
            Outcome::Saved(stored) => records.push(stored),
            Outcome::Failed(failure) => failures.push(failure),
        }
    }

    if !skipped.is_empty() {
        warn!(%period, skipped = skipped.len(), "batch cancelled");
    }
    info!(%period, saved = records.len(), failed = failures.len(), "recalculation finished");

    Ok(BatchReport {
        period,
        rate_table_version,
        records,
        failures,
        skipped,
    })
}

async fn process_employee(
    calculator: &PayrollCalculator,
    repo: &dyn PayrollRepository,
    period: Period,
    input: &BatchInput,
) -> Outcome {
    let employee_id = input.profile.employee_id.as_str();
    match compute_and_save(calculator, repo, period, input).await {
        Ok(stored) => {
            debug!(employee_id, %period, revision = stored.revision, "record saved");
            Outcome::Saved(stored)
        }
        Err(failure) => {
            warn!(employee_id, %period, reason = %failure.reason, "employee failed");
            Outcome::Failed(failure)
        }
    }
}

async fn compute_and_save(
    calculator: &PayrollCalculator,
    repo: &dyn PayrollRepository,
    period: Period,
    input: &BatchInput,
) -> Result<StoredPayrollRecord, BatchFailure> {
    let employee_id = input.profile.employee_id.as_str();
    let payroll_failure = |e: PayrollError| BatchFailure::from_payroll(employee_id, &e);
    input.validate(period).map_err(payroll_failure)?;

    let stored = repo
        .list_payroll_records(employee_id, period.year())
        .await
        .map_err(|e| BatchFailure::from_repository(employee_id, &e))?;
    let earlier = stored
        .iter()
        .map(|s| &s.record)
        .filter(|r| r.period < period);
    let mut ledger =
        Pph21Ledger::from_records(employee_id, period.year(), earlier).map_err(|e| payroll_failure(e.into()))?;

    let kind = input.period_kind(period);
    if kind.settles_year() {
        ledger
            .begin_reconciliation()
            .map_err(|e| payroll_failure(e.into()))?;
    }
    let history = ledger.history(input.start_month, input.prior_employment.clone());

    let record = calculator
        .compute(&input.profile, period, &input.gross, &history, kind)
        .map_err(payroll_failure)?;
    ledger.record(&record).map_err(|e| payroll_failure(e.into()))?;

    repo.save_payroll_record(&record)
        .await
        .map_err(|e| BatchFailure::from_repository(employee_id, &e))
}
