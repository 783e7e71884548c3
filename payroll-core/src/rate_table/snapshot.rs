//! Immutable rate-table snapshots.
//!
//! A [`RateTableSnapshot`] bundles every table the engine reads for one
//! effective date: PTKP allowances, the PTKP → TER category map, TER brackets,
//! the progressive annual schedule, BPJS program rates and the annual
//! reconciliation policy. Snapshots are validated once when built and never
//! change afterwards, so a period always recomputes against exactly the
//! figures it was first computed with.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    BpjsProgram, BpjsProgramRate, MAX_DEPENDENTS, ProgressiveTaxBracket, PtkpCategory, TerBracket,
    TerCategoryAssignment,
};

/// Errors raised while building or selecting rate tables.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateTableError {
    #[error("{0} table is empty")]
    EmptyTable(String),

    #[error("duplicate PTKP code '{0}'")]
    DuplicateCategory(String),

    #[error("PTKP code '{code}' does not match its fields (expected '{expected}')")]
    InconsistentCategory { code: String, expected: String },

    #[error("PTKP code '{code}' has {dependents} dependents; at most {max} are allowed")]
    DependentsOutOfRange { code: String, dependents: u8, max: u8 },

    #[error("PTKP code '{0}' has a negative allowance")]
    NegativeAllowance(String),

    #[error("unknown PTKP category '{0}'")]
    UnknownCategory(String),

    #[error("PTKP code '{0}' is assigned to more than one TER category")]
    DuplicateAssignment(String),

    #[error("{table} brackets must start at 0, first starts at {min}")]
    LadderNotAnchored { table: String, min: Decimal },

    #[error("{table} brackets are not contiguous: expected {expected}, found {found}")]
    LadderGap {
        table: String,
        expected: Decimal,
        found: Decimal,
    },

    #[error("{table} bracket starting at {min} is empty or inverted")]
    EmptyBracket { table: String, min: Decimal },

    #[error("{table} bracket starting at {min} is open-ended but not last")]
    OpenBracketNotLast { table: String, min: Decimal },

    #[error("{table} brackets must end with an open-ended bracket")]
    LadderNotOpenEnded { table: String },

    #[error("{table} rate decreases at bracket starting at {min}")]
    DecreasingRate { table: String, min: Decimal },

    #[error("{table} rate must be between 0 and 1, got {rate}")]
    RateOutOfRange { table: String, rate: Decimal },

    #[error("unsupported BPJS program '{0}'")]
    UnsupportedProgram(String),

    #[error("BPJS program {0} is configured more than once")]
    DuplicateProgram(BpjsProgram),

    #[error("BPJS program {0} has no rate configured")]
    MissingProgram(BpjsProgram),

    #[error("BPJS program {program} salary cap must be positive, got {cap}")]
    InvalidSalaryCap { program: BpjsProgram, cap: Decimal },

    #[error("invalid annual policy: {0}")]
    InvalidPolicy(String),

    #[error("rate table version {0} is already loaded")]
    DuplicateVersion(NaiveDate),

    #[error("no rate table version is in force on {0}")]
    NoVersionInForce(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTableVersion {
    /// First day on which this version applies.
    pub effective_from: NaiveDate,
    /// Human-readable source, e.g. the regulation the figures come from.
    pub label: String,
}

/// Adjustments applied when computing annual taxable income.
///
/// The default applies none: PKP is annual gross minus PTKP, unrounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnualPolicy {
    /// Share of annual gross deducted as occupational expense (biaya jabatan).
    pub occupational_expense_rate: Decimal,
    /// Annual ceiling of the occupational expense deduction.
    pub occupational_expense_annual_cap: Decimal,
    /// PKP is rounded down to a multiple of this amount.
    pub pkp_rounding_unit: Decimal,
}

impl Default for AnnualPolicy {
    fn default() -> Self {
        Self {
            occupational_expense_rate: Decimal::ZERO,
            occupational_expense_annual_cap: Decimal::ZERO,
            pkp_rounding_unit: Decimal::ONE,
        }
    }
}

impl AnnualPolicy {
    fn validate(&self) -> Result<(), RateTableError> {
        if self.occupational_expense_rate < Decimal::ZERO
            || self.occupational_expense_rate > Decimal::ONE
        {
            return Err(RateTableError::InvalidPolicy(format!(
                "occupational expense rate must be between 0 and 1, got {}",
                self.occupational_expense_rate
            )));
        }
        if self.occupational_expense_annual_cap < Decimal::ZERO {
            return Err(RateTableError::InvalidPolicy(format!(
                "occupational expense cap must be non-negative, got {}",
                self.occupational_expense_annual_cap
            )));
        }
        if self.pkp_rounding_unit <= Decimal::ZERO {
            return Err(RateTableError::InvalidPolicy(format!(
                "PKP rounding unit must be positive, got {}",
                self.pkp_rounding_unit
            )));
        }
        Ok(())
    }
}

/// Raw, unvalidated tables as they come out of storage or a loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTableParts {
    pub version: RateTableVersion,
    pub ptkp_categories: Vec<PtkpCategory>,
    pub ter_assignments: Vec<TerCategoryAssignment>,
    pub ter_brackets: Vec<TerBracket>,
    pub progressive_brackets: Vec<ProgressiveTaxBracket>,
    pub bpjs_rates: Vec<BpjsProgramRate>,
    pub policy: AnnualPolicy,
}

/// A validated, read-only set of rate tables for one effective date.
#[derive(Debug, Clone)]
pub struct RateTableSnapshot {
    parts: RateTableParts,
    ptkp_index: HashMap<String, usize>,
    ter_index: HashMap<String, String>,
    ter_ladders: HashMap<String, Vec<TerBracket>>,
}

impl RateTableSnapshot {
    /// Validates `parts` and builds the lookup indices.
    ///
    /// # Errors
    ///
    /// Returns [`RateTableError`] describing the first inconsistency found.
    pub fn new(mut parts: RateTableParts) -> Result<Self, RateTableError> {
        let ptkp_index = index_ptkp(&parts.ptkp_categories)?;

        let mut ter_index = HashMap::new();
        for assignment in &parts.ter_assignments {
            if !ptkp_index.contains_key(&assignment.ptkp_code) {
                return Err(RateTableError::UnknownCategory(assignment.ptkp_code.clone()));
            }
            if ter_index
                .insert(assignment.ptkp_code.clone(), assignment.category.clone())
                .is_some()
            {
                return Err(RateTableError::DuplicateAssignment(assignment.ptkp_code.clone()));
            }
        }

        parts.ter_brackets.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then(a.min_monthly_income.cmp(&b.min_monthly_income))
        });
        let mut ter_ladders: HashMap<String, Vec<TerBracket>> = HashMap::new();
        for bracket in &parts.ter_brackets {
            ter_ladders
                .entry(bracket.category.clone())
                .or_default()
                .push(bracket.clone());
        }
        for (category, ladder) in &ter_ladders {
            let steps: Vec<_> = ladder
                .iter()
                .map(|b| (b.min_monthly_income, b.max_monthly_income, b.rate))
                .collect();
            validate_ladder(&format!("TER category {category}"), &steps)?;
        }

        parts
            .progressive_brackets
            .sort_by(|a, b| a.min_annual_income.cmp(&b.min_annual_income));
        let steps: Vec<_> = parts
            .progressive_brackets
            .iter()
            .map(|b| (b.min_annual_income, b.max_annual_income, b.rate))
            .collect();
        validate_ladder("progressive", &steps)?;

        validate_bpjs(&parts.bpjs_rates)?;
        parts.bpjs_rates.sort_by_key(|r| r.program);

        parts.policy.validate()?;

        Ok(Self {
            parts,
            ptkp_index,
            ter_index,
            ter_ladders,
        })
    }

    pub fn version(&self) -> &RateTableVersion {
        &self.parts.version
    }

    pub fn effective_from(&self) -> NaiveDate {
        self.parts.version.effective_from
    }

    pub fn ptkp_categories(&self) -> &[PtkpCategory] {
        &self.parts.ptkp_categories
    }

    pub fn ptkp_category(
        &self,
        code: &str,
    ) -> Option<&PtkpCategory> {
        self.ptkp_index
            .get(code)
            .map(|&i| &self.parts.ptkp_categories[i])
    }

    /// TER category label assigned to a PTKP code.
    pub fn ter_category_for(
        &self,
        ptkp_code: &str,
    ) -> Option<&str> {
        self.ter_index.get(ptkp_code).map(String::as_str)
    }

    /// Brackets of a TER category, sorted by lower bound.
    pub fn ter_brackets(
        &self,
        category: &str,
    ) -> Option<&[TerBracket]> {
        self.ter_ladders.get(category).map(Vec::as_slice)
    }

    pub fn ter_assignments(&self) -> &[TerCategoryAssignment] {
        &self.parts.ter_assignments
    }

    pub fn progressive_brackets(&self) -> &[ProgressiveTaxBracket] {
        &self.parts.progressive_brackets
    }

    /// BPJS rates in program order.
    pub fn bpjs_rates(&self) -> &[BpjsProgramRate] {
        &self.parts.bpjs_rates
    }

    pub fn bpjs_rate(
        &self,
        program: BpjsProgram,
    ) -> Option<&BpjsProgramRate> {
        self.parts.bpjs_rates.iter().find(|r| r.program == program)
    }

    pub fn policy(&self) -> &AnnualPolicy {
        &self.parts.policy
    }

    pub fn parts(&self) -> &RateTableParts {
        &self.parts
    }
}

fn index_ptkp(categories: &[PtkpCategory]) -> Result<HashMap<String, usize>, RateTableError> {
    if categories.is_empty() {
        return Err(RateTableError::EmptyTable("PTKP".to_string()));
    }

    let mut index = HashMap::with_capacity(categories.len());
    for (i, category) in categories.iter().enumerate() {
        if category.dependents > MAX_DEPENDENTS {
            return Err(RateTableError::DependentsOutOfRange {
                code: category.code.clone(),
                dependents: category.dependents,
                max: MAX_DEPENDENTS,
            });
        }
        let expected = PtkpCategory::code_for(
            category.marital_status,
            category.income_combined,
            category.dependents,
        );
        if category.code != expected {
            return Err(RateTableError::InconsistentCategory {
                code: category.code.clone(),
                expected,
            });
        }
        if category.annual_allowance < Decimal::ZERO {
            return Err(RateTableError::NegativeAllowance(category.code.clone()));
        }
        if index.insert(category.code.clone(), i).is_some() {
            return Err(RateTableError::DuplicateCategory(category.code.clone()));
        }
    }
    Ok(index)
}

/// Checks a sorted bracket ladder: anchored at 0, contiguous, open-ended at
/// the top, with non-decreasing rates in `[0, 1]`.
fn validate_ladder(
    table: &str,
    steps: &[(Decimal, Option<Decimal>, Decimal)],
) -> Result<(), RateTableError> {
    let Some(&(first_min, _, _)) = steps.first() else {
        return Err(RateTableError::EmptyTable(table.to_string()));
    };
    if first_min != Decimal::ZERO {
        return Err(RateTableError::LadderNotAnchored {
            table: table.to_string(),
            min: first_min,
        });
    }

    let mut previous_rate = Decimal::ZERO;
    for (i, &(min, max, rate)) in steps.iter().enumerate() {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(RateTableError::RateOutOfRange {
                table: table.to_string(),
                rate,
            });
        }
        if rate < previous_rate {
            return Err(RateTableError::DecreasingRate {
                table: table.to_string(),
                min,
            });
        }
        previous_rate = rate;

        let is_last = i + 1 == steps.len();
        match max {
            None if is_last => {}
            None => {
                return Err(RateTableError::OpenBracketNotLast {
                    table: table.to_string(),
                    min,
                });
            }
            Some(_) if is_last => {
                return Err(RateTableError::LadderNotOpenEnded {
                    table: table.to_string(),
                });
            }
            Some(max) => {
                if max <= min {
                    return Err(RateTableError::EmptyBracket {
                        table: table.to_string(),
                        min,
                    });
                }
                let next_min = steps[i + 1].0;
                if next_min != max {
                    return Err(RateTableError::LadderGap {
                        table: table.to_string(),
                        expected: max,
                        found: next_min,
                    });
                }
            }
        }
    }
    Ok(())
}

fn validate_bpjs(rates: &[BpjsProgramRate]) -> Result<(), RateTableError> {
    let mut seen = HashSet::new();
    for rate in rates {
        if !seen.insert(rate.program) {
            return Err(RateTableError::DuplicateProgram(rate.program));
        }
        for value in [rate.employee_rate, rate.company_rate] {
            if value < Decimal::ZERO || value > Decimal::ONE {
                return Err(RateTableError::RateOutOfRange {
                    table: format!("BPJS {}", rate.program),
                    rate: value,
                });
            }
        }
        if let Some(cap) = rate.salary_cap {
            if cap <= Decimal::ZERO {
                return Err(RateTableError::InvalidSalaryCap {
                    program: rate.program,
                    cap,
                });
            }
        }
    }

    match BpjsProgram::ALL.into_iter().find(|p| !seen.contains(p)) {
        Some(missing) => Err(RateTableError::MissingProgram(missing)),
        None => Ok(()),
    }
}
