//! Payroll aggregation: one [`PayrollRecord`] per employee and period.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use super::bpjs::{BpjsCalculator, BpjsError};
use super::ledger::LedgerError;
use super::pph21::{Pph21Calculator, Pph21Error, monthly_withholding};
use super::ptkp::{PtkpError, PtkpResolver};
use super::ter::{TerError, TerRateLocator};
use crate::models::{AnnualHistory, EmployeeTaxProfile, GrossSalary, PayrollRecord, Period, PeriodKind};
use crate::rate_table::{RateTableError, RateTableSnapshot, RateTableStore};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayrollError {
    #[error("employee id is missing")]
    MissingEmployeeId,

    #[error("PTKP code is missing for employee '{0}'")]
    MissingPtkpCode(String),

    #[error("gross salary must not be negative, got {0}")]
    NegativeGross(Decimal),

    #[error("{period} is before the employee's start month {start_month}")]
    BeforeEmployment { period: Period, start_month: u32 },

    #[error(transparent)]
    RateTable(#[from] RateTableError),

    #[error(transparent)]
    Ptkp(#[from] PtkpError),

    #[error(transparent)]
    Ter(#[from] TerError),

    #[error(transparent)]
    Pph21(#[from] Pph21Error),

    #[error(transparent)]
    Bpjs(#[from] BpjsError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl PayrollError {
    /// Missing or inconsistent rate tables. No employee can be computed
    /// correctly until the tables are fixed.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::RateTable(_)
                | Self::Ptkp(PtkpError::UnknownCategory(_))
                | Self::Ter(TerError::NoBracketForCategory(_))
                | Self::Bpjs(BpjsError::MissingProgram(_))
        )
    }

    /// Bad data for one employee.
    pub fn is_input(&self) -> bool {
        !self.is_configuration()
    }
}

/// Rejects inputs that can never produce a record, before any table lookup.
pub fn validate_input(
    profile: &EmployeeTaxProfile,
    period: Period,
    gross: &GrossSalary,
    history: &AnnualHistory,
) -> Result<(), PayrollError> {
    if profile.employee_id.trim().is_empty() {
        return Err(PayrollError::MissingEmployeeId);
    }
    if profile.ptkp_code.trim().is_empty() {
        return Err(PayrollError::MissingPtkpCode(profile.employee_id.clone()));
    }
    let total = gross.total();
    if total < Decimal::ZERO {
        return Err(PayrollError::NegativeGross(total));
    }
    if history.fiscal_year != period.year() {
        return Err(Pph21Error::FiscalYearMismatch {
            history: history.fiscal_year,
            period: period.year(),
        }
        .into());
    }
    if period.month() < history.start_month {
        return Err(PayrollError::BeforeEmployment {
            period,
            start_month: history.start_month,
        });
    }
    Ok(())
}

/// Computes records against one rate-table snapshot.
#[derive(Debug, Clone)]
pub struct PayrollCalculator {
    snapshot: Arc<RateTableSnapshot>,
}

impl PayrollCalculator {
    pub fn new(snapshot: Arc<RateTableSnapshot>) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &RateTableSnapshot {
        &self.snapshot
    }

    /// Computes the record for `period`.
    ///
    /// `history` holds the fiscal year's earlier periods. Monthly periods
    /// use it only for the year-to-date taxable income; settlement periods
    /// require it to be complete.
    pub fn compute(
        &self,
        profile: &EmployeeTaxProfile,
        period: Period,
        gross: &GrossSalary,
        history: &AnnualHistory,
        kind: PeriodKind,
    ) -> Result<PayrollRecord, PayrollError> {
        validate_input(profile, period, gross, history)?;
        let snapshot = self.snapshot.as_ref();
        let gross_salary = gross.total();

        let category = PtkpResolver::new(snapshot).resolve_code(&profile.ptkp_code)?;
        let ter = TerRateLocator::new(snapshot).lookup(&category.code, gross_salary)?;
        let pph21_calc = Pph21Calculator::new(snapshot);
        let pph21 = monthly_withholding(gross_salary, ter.rate);

        let reconciliation = if kind.settles_year() {
            Some(pph21_calc.reconcile(kind, history, period, gross_salary, category, ter.rate)?)
        } else {
            None
        };
        let (taxable_income, pph21_adjustment) = match &reconciliation {
            Some(rec) => (rec.taxable_income, rec.adjustment),
            None => (
                pph21_calc.taxable_income(history.gross_to_date() + gross_salary, category),
                Decimal::ZERO,
            ),
        };

        let bpjs = BpjsCalculator::new(snapshot).compute(gross_salary)?;
        let total_deductions = pph21 + pph21_adjustment + bpjs.employee_total;

        debug!(
            employee_id = %profile.employee_id,
            %period,
            ptkp = %category.code,
            ter_category = %ter.category,
            %pph21,
            %pph21_adjustment,
            "payroll computed"
        );

        Ok(PayrollRecord {
            employee_id: profile.employee_id.clone(),
            period,
            rate_table_version: snapshot.effective_from(),
            gross_salary,
            taxable_income,
            ptkp_status: category.code.clone(),
            ter_category: ter.category,
            ter_rate: ter.rate,
            pph21,
            pph21_adjustment,
            reconciliation,
            bpjs: bpjs.contributions,
            bpjs_employee_total: bpjs.employee_total,
            bpjs_company_total: bpjs.company_total,
            total_deductions,
            net_salary: gross_salary - total_deductions,
            computed_at: Utc::now(),
        })
    }
}

/// Entry point: selects the rate tables in force for each period.
#[derive(Debug, Clone)]
pub struct PayrollEngine {
    store: RateTableStore,
}

impl PayrollEngine {
    pub fn new(store: RateTableStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &RateTableStore {
        &self.store
    }

    /// Calculator bound to the version in force on the first day of `period`.
    pub fn calculator_for(
        &self,
        period: Period,
    ) -> Result<PayrollCalculator, PayrollError> {
        Ok(PayrollCalculator::new(self.store.get(period.first_day())?))
    }

    /// Monthly computation without prior history.
    ///
    /// # Example
    ///
    /// ```
    /// # use payroll_core::calculations::PayrollEngine;
    /// # use payroll_core::models::{EmployeeTaxProfile, GrossSalary, Period};
    /// # use rust_decimal_macros::dec;
    /// # fn demo(engine: &PayrollEngine) {
    /// let profile = EmployeeTaxProfile {
    ///     employee_id: "E-001".into(),
    ///     ptkp_code: "TK/0".into(),
    ///     npwp: None,
    /// };
    /// let period: Period = "2025-03".parse().unwrap();
    /// let record = engine
    ///     .compute_payroll(&profile, period, &GrossSalary::basic(dec!(8000000)))
    ///     .unwrap();
    /// assert_eq!(record.net_salary, record.gross_salary - record.total_deductions);
    /// # }
    /// ```
    pub fn compute_payroll(
        &self,
        profile: &EmployeeTaxProfile,
        period: Period,
        gross: &GrossSalary,
    ) -> Result<PayrollRecord, PayrollError> {
        self.compute_with_history(
            profile,
            period,
            gross,
            &AnnualHistory::new(period.year()),
            PeriodKind::Monthly,
        )
    }

    pub fn compute_with_history(
        &self,
        profile: &EmployeeTaxProfile,
        period: Period,
        gross: &GrossSalary,
        history: &AnnualHistory,
        kind: PeriodKind,
    ) -> Result<PayrollRecord, PayrollError> {
        validate_input(profile, period, gross, history)?;
        self.calculator_for(period)?
            .compute(profile, period, gross, history, kind)
    }
}
