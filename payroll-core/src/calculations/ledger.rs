//! Per-employee withholding ledger for one fiscal year.
//!
//! Monthly TER withholdings accumulate until a settlement period (December or
//! termination) reconciles the year. After that the year is closed and no
//! further record is accepted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AnnualHistory, PayrollRecord, Period, PriorEmployment, WithholdingEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithholdingPhase {
    Monthly,
    AnnualReconciliation,
    Finalized,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("fiscal year {year} of employee '{employee_id}' is already finalized")]
    LedgerFinalized { employee_id: String, year: i32 },

    #[error("record for '{employee_id}' in {period} does not belong to this ledger")]
    LedgerMismatch { employee_id: String, period: Period },

    #[error("a settlement record is expected, got a monthly record for {0}")]
    ReconciliationPending(Period),

    #[error("record for {period} arrives after {latest}")]
    OutOfOrder { period: Period, latest: Period },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pph21Ledger {
    employee_id: String,
    fiscal_year: i32,
    phase: WithholdingPhase,
    entries: BTreeMap<Period, WithholdingEntry>,
}

impl Pph21Ledger {
    pub fn new(
        employee_id: impl Into<String>,
        fiscal_year: i32,
    ) -> Self {
        Self {
            employee_id: employee_id.into(),
            fiscal_year,
            phase: WithholdingPhase::Monthly,
            entries: BTreeMap::new(),
        }
    }

    /// Replays stored records in period order.
    pub fn from_records<'r>(
        employee_id: impl Into<String>,
        fiscal_year: i32,
        records: impl IntoIterator<Item = &'r PayrollRecord>,
    ) -> Result<Self, LedgerError> {
        let mut ledger = Self::new(employee_id, fiscal_year);
        let mut records: Vec<_> = records.into_iter().collect();
        records.sort_by_key(|r| r.period);
        for record in records {
            ledger.record(record)?;
        }
        Ok(ledger)
    }

    pub fn employee_id(&self) -> &str {
        &self.employee_id
    }

    pub fn fiscal_year(&self) -> i32 {
        self.fiscal_year
    }

    pub fn phase(&self) -> WithholdingPhase {
        self.phase
    }

    pub fn latest_period(&self) -> Option<Period> {
        self.entries.keys().next_back().copied()
    }

    /// Announces that the next record settles the year.
    pub fn begin_reconciliation(&mut self) -> Result<(), LedgerError> {
        match self.phase {
            WithholdingPhase::Finalized => Err(self.finalized()),
            _ => {
                self.phase = WithholdingPhase::AnnualReconciliation;
                Ok(())
            }
        }
    }

    /// Appends a computed record.
    ///
    /// A record carrying a reconciliation closes the year.
    pub fn record(
        &mut self,
        record: &PayrollRecord,
    ) -> Result<(), LedgerError> {
        if record.employee_id != self.employee_id || record.period.year() != self.fiscal_year {
            return Err(LedgerError::LedgerMismatch {
                employee_id: record.employee_id.clone(),
                period: record.period,
            });
        }
        if self.phase == WithholdingPhase::Finalized {
            return Err(self.finalized());
        }
        if self.phase == WithholdingPhase::AnnualReconciliation && !record.is_final() {
            return Err(LedgerError::ReconciliationPending(record.period));
        }
        if let Some(latest) = self.latest_period().filter(|latest| record.period <= *latest) {
            return Err(LedgerError::OutOfOrder {
                period: record.period,
                latest,
            });
        }

        self.entries.insert(
            record.period,
            WithholdingEntry {
                period: record.period,
                gross_salary: record.gross_salary,
                pph21: record.pph21_settled(),
            },
        );
        if record.is_final() {
            self.phase = WithholdingPhase::Finalized;
        }
        Ok(())
    }

    /// Withholding history for reconciliation.
    pub fn history(
        &self,
        start_month: u32,
        prior_employment: PriorEmployment,
    ) -> AnnualHistory {
        AnnualHistory {
            fiscal_year: self.fiscal_year,
            start_month,
            prior_employment,
            entries: self.entries.values().cloned().collect(),
        }
    }

    fn finalized(&self) -> LedgerError {
        LedgerError::LedgerFinalized {
            employee_id: self.employee_id.clone(),
            year: self.fiscal_year,
        }
    }
}
