use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{BpjsProgram, Period};

/// How a period settles PPh 21.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodKind {
    /// TER withholding only.
    Monthly,
    /// December: TER withholding plus the annual true-up.
    YearEnd,
    /// Last period before the employee leaves: TER withholding plus true-up.
    Termination,
}

impl PeriodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "MONTHLY",
            Self::YearEnd => "YEAR_END",
            Self::Termination => "TERMINATION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MONTHLY" => Some(Self::Monthly),
            "YEAR_END" => Some(Self::YearEnd),
            "TERMINATION" => Some(Self::Termination),
            _ => None,
        }
    }

    pub fn settles_year(&self) -> bool {
        !matches!(self, Self::Monthly)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BpjsContribution {
    pub program: BpjsProgram,
    /// Gross salary after the program's cap was applied.
    pub base: Decimal,
    pub employee_share: Decimal,
    pub company_share: Decimal,
}

/// Annual true-up computed in a year-end or termination period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnualReconciliation {
    pub kind: PeriodKind,
    pub annual_gross: Decimal,
    pub occupational_expense: Decimal,
    pub ptkp_allowance: Decimal,
    pub taxable_income: Decimal,
    /// Progressive tax on `taxable_income`.
    pub annual_tax: Decimal,
    /// Withheld in earlier periods, including a previous employer.
    pub withheld_before: Decimal,
    /// TER withholding of the settling period itself.
    pub current_withholding: Decimal,
    /// `annual_tax - withheld_before - current_withholding`; negative is a refund.
    pub adjustment: Decimal,
}

/// Payroll result for one employee and one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollRecord {
    pub employee_id: String,
    pub period: Period,
    pub rate_table_version: NaiveDate,
    pub gross_salary: Decimal,
    pub taxable_income: Decimal,
    pub ptkp_status: String,
    pub ter_category: String,
    pub ter_rate: Decimal,
    /// TER withholding for the period.
    pub pph21: Decimal,
    /// Year-end or termination true-up; zero in monthly periods.
    pub pph21_adjustment: Decimal,
    pub reconciliation: Option<AnnualReconciliation>,
    pub bpjs: Vec<BpjsContribution>,
    pub bpjs_employee_total: Decimal,
    pub bpjs_company_total: Decimal,
    pub total_deductions: Decimal,
    pub net_salary: Decimal,
    pub computed_at: DateTime<Utc>,
}

impl PayrollRecord {
    /// PPh 21 actually settled in this period (TER plus any true-up).
    pub fn pph21_settled(&self) -> Decimal {
        self.pph21 + self.pph21_adjustment
    }

    pub fn is_final(&self) -> bool {
        self.reconciliation.is_some()
    }
}

/// A persisted record together with its revision number.
///
/// Recomputing a period writes a new revision; earlier revisions are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPayrollRecord {
    pub revision: i64,
    pub record: PayrollRecord,
}
