//! PTKP (non-taxable income) category resolution.
//!
//! Maps an employee's marital status, dependents and combined-income election
//! to a row of the PTKP table. The allowance always comes from the table of
//! the active rate version; a missing row is an error, never a default.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::models::{MAX_DEPENDENTS, MaritalStatus, PtkpCategory};
use crate::rate_table::RateTableSnapshot;

static PTKP_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(TK|K)(/I)?/(\d+)$").unwrap_or_else(|e| panic!("invalid PTKP pattern: {e}"))
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PtkpError {
    #[error("dependents must not be negative, got {0}")]
    NegativeDependents(i32),

    #[error("combined spousal income requires married status")]
    CombinedIncomeRequiresMarriage,

    #[error("malformed PTKP code '{0}'")]
    MalformedCode(String),

    #[error("PTKP category '{0}' is not defined in the active rate table")]
    UnknownCategory(String),
}

/// Resolves PTKP categories against one rate-table snapshot.
#[derive(Debug, Clone, Copy)]
pub struct PtkpResolver<'a> {
    snapshot: &'a RateTableSnapshot,
}

impl<'a> PtkpResolver<'a> {
    pub fn new(snapshot: &'a RateTableSnapshot) -> Self {
        Self { snapshot }
    }

    /// Resolves a status combination to its PTKP category.
    ///
    /// Dependents above three are clamped to three.
    ///
    /// # Errors
    ///
    /// * [`PtkpError::NegativeDependents`] for `dependents < 0`.
    /// * [`PtkpError::CombinedIncomeRequiresMarriage`] for a single filer
    ///   electing combined income.
    /// * [`PtkpError::UnknownCategory`] when the table has no row for the
    ///   computed code.
    ///
    /// # Example
    ///
    /// ```
    /// # use payroll_core::calculations::PtkpResolver;
    /// # use payroll_core::models::MaritalStatus;
    /// # fn demo(snapshot: &payroll_core::rate_table::RateTableSnapshot) {
    /// let resolver = PtkpResolver::new(snapshot);
    /// let five = resolver.resolve(MaritalStatus::Married, true, 5).unwrap();
    /// let three = resolver.resolve(MaritalStatus::Married, true, 3).unwrap();
    /// assert_eq!(five, three);
    /// # }
    /// ```
    pub fn resolve(
        &self,
        marital_status: MaritalStatus,
        income_combined: bool,
        dependents: i32,
    ) -> Result<&'a PtkpCategory, PtkpError> {
        if dependents < 0 {
            return Err(PtkpError::NegativeDependents(dependents));
        }
        if income_combined && marital_status != MaritalStatus::Married {
            return Err(PtkpError::CombinedIncomeRequiresMarriage);
        }

        let clamped = u8::try_from(dependents)
            .unwrap_or(MAX_DEPENDENTS)
            .min(MAX_DEPENDENTS);
        let code = PtkpCategory::code_for(marital_status, income_combined, clamped);

        self.snapshot
            .ptkp_category(&code)
            .ok_or(PtkpError::UnknownCategory(code))
    }

    /// Resolves a stored code such as `K/I/2`.
    ///
    /// Codes with more than three dependents (`K/5`) resolve to the capped
    /// category.
    pub fn resolve_code(
        &self,
        code: &str,
    ) -> Result<&'a PtkpCategory, PtkpError> {
        let normalized = code.trim().to_ascii_uppercase();
        let captures = PTKP_CODE
            .captures(&normalized)
            .ok_or_else(|| PtkpError::MalformedCode(code.to_string()))?;

        let marital_status = MaritalStatus::parse(&captures[1])
            .ok_or_else(|| PtkpError::MalformedCode(code.to_string()))?;
        let income_combined = captures.get(2).is_some();
        let dependents: i32 = captures[3].parse().unwrap_or(i32::MAX);

        self.resolve(marital_status, income_combined, dependents)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::test_support::sample_snapshot;

    #[test]
    fn resolves_single_without_dependents() {
        let snapshot = sample_snapshot();
        let resolver = PtkpResolver::new(&snapshot);

        let category = resolver.resolve(MaritalStatus::Single, false, 0).unwrap();

        assert_eq!(category.code, "TK/0");
        assert_eq!(category.annual_allowance, dec!(54000000));
        assert_eq!(category.monthly_allowance(), dec!(4500000));
    }

    #[test]
    fn married_adds_one_increment() {
        let snapshot = sample_snapshot();
        let resolver = PtkpResolver::new(&snapshot);

        let category = resolver.resolve(MaritalStatus::Married, false, 0).unwrap();

        assert_eq!(category.code, "K/0");
        assert_eq!(category.annual_allowance, dec!(58500000));
    }

    #[test]
    fn dependents_add_one_increment_each() {
        let snapshot = sample_snapshot();
        let resolver = PtkpResolver::new(&snapshot);

        let category = resolver.resolve(MaritalStatus::Married, false, 2).unwrap();

        assert_eq!(category.code, "K/2");
        assert_eq!(category.annual_allowance, dec!(67500000));
    }

    #[test]
    fn combined_income_adds_base_on_top_of_married() {
        let snapshot = sample_snapshot();
        let resolver = PtkpResolver::new(&snapshot);

        let category = resolver.resolve(MaritalStatus::Married, true, 2).unwrap();

        assert_eq!(category.code, "K/I/2");
        assert_eq!(category.annual_allowance, dec!(121500000));
    }

    #[test]
    fn dependents_above_three_are_clamped() {
        let snapshot = sample_snapshot();
        let resolver = PtkpResolver::new(&snapshot);

        let five = resolver.resolve(MaritalStatus::Married, true, 5).unwrap();
        let three = resolver.resolve(MaritalStatus::Married, true, 3).unwrap();

        assert_eq!(five, three);
        assert_eq!(five.code, "K/I/3");
    }

    #[test]
    fn negative_dependents_are_rejected() {
        let snapshot = sample_snapshot();
        let resolver = PtkpResolver::new(&snapshot);

        assert_eq!(
            resolver.resolve(MaritalStatus::Single, false, -1),
            Err(PtkpError::NegativeDependents(-1))
        );
    }

    #[test]
    fn single_cannot_combine_income() {
        let snapshot = sample_snapshot();
        let resolver = PtkpResolver::new(&snapshot);

        assert_eq!(
            resolver.resolve(MaritalStatus::Single, true, 0),
            Err(PtkpError::CombinedIncomeRequiresMarriage)
        );
    }

    #[test]
    fn missing_table_row_is_unknown_category() {
        let mut parts = crate::test_support::sample_parts();
        parts.ptkp_categories.retain(|c| c.code != "K/3");
        parts.ter_assignments.retain(|a| a.ptkp_code != "K/3");
        let snapshot = RateTableSnapshot::new(parts).unwrap();
        let resolver = PtkpResolver::new(&snapshot);

        assert_eq!(
            resolver.resolve(MaritalStatus::Married, false, 3),
            Err(PtkpError::UnknownCategory("K/3".to_string()))
        );
    }

    #[test]
    fn resolve_code_parses_all_shapes() {
        let snapshot = sample_snapshot();
        let resolver = PtkpResolver::new(&snapshot);

        assert_eq!(resolver.resolve_code("TK/1").unwrap().code, "TK/1");
        assert_eq!(resolver.resolve_code("k/2").unwrap().code, "K/2");
        assert_eq!(resolver.resolve_code(" K/I/0 ").unwrap().code, "K/I/0");
        assert_eq!(resolver.resolve_code("K/7").unwrap().code, "K/3");
    }

    #[test]
    fn resolve_code_rejects_garbage() {
        let snapshot = sample_snapshot();
        let resolver = PtkpResolver::new(&snapshot);

        for code in ["", "TK", "TK/-1", "X/0", "K/II/1", "TK/I/0x"] {
            assert_eq!(
                resolver.resolve_code(code),
                Err(PtkpError::MalformedCode(code.to_string())),
                "code {code:?}"
            );
        }
    }

    #[test]
    fn resolve_code_rejects_single_with_combined_income() {
        let snapshot = sample_snapshot();
        let resolver = PtkpResolver::new(&snapshot);

        assert_eq!(
            resolver.resolve_code("TK/I/1"),
            Err(PtkpError::CombinedIncomeRequiresMarriage)
        );
    }
}
