//! PPh 21 withholding.
//!
//! Every month but the last withholds `gross × TER rate`. The final period of
//! the fiscal year (December, or the month an employee leaves) additionally
//! settles the year: the progressive schedule is applied to annual taxable
//! income (PKP) and the difference to what was already withheld becomes an
//! adjustment. Positive adjustments are extra withholding, negative ones are
//! refunds.

use std::collections::HashSet;

use rust_decimal::Decimal;
use thiserror::Error;

use super::common::{floor_to_unit, non_negative, round_half_up};
use crate::models::{AnnualHistory, AnnualReconciliation, Period, PeriodKind, PriorEmployment, PtkpCategory};
use crate::rate_table::RateTableSnapshot;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Pph21Error {
    #[error("annual history is incomplete: {0}")]
    IncompleteAnnualHistory(String),

    #[error("annual history is invalid: {0}")]
    InvalidHistory(String),

    #[error("year-end reconciliation is only valid in December, got {0}")]
    YearEndOutsideDecember(Period),

    #[error("{0} is a monthly period and does not settle the year")]
    NotASettlementPeriod(Period),

    #[error("history covers fiscal year {history}, period is in {period}")]
    FiscalYearMismatch { history: i32, period: i32 },
}

/// Monthly TER withholding, rounded half-up to whole rupiah.
pub fn monthly_withholding(
    gross: Decimal,
    rate: Decimal,
) -> Decimal {
    round_half_up(gross * rate)
}

#[derive(Debug, Clone, Copy)]
pub struct Pph21Calculator<'a> {
    snapshot: &'a RateTableSnapshot,
}

impl<'a> Pph21Calculator<'a> {
    pub fn new(snapshot: &'a RateTableSnapshot) -> Self {
        Self { snapshot }
    }

    /// Occupational expense (biaya jabatan) deductible from `annual_gross`.
    ///
    /// A cap of zero leaves the deduction uncapped.
    pub fn occupational_expense(
        &self,
        annual_gross: Decimal,
    ) -> Decimal {
        let policy = self.snapshot.policy();
        let expense = round_half_up(non_negative(annual_gross) * policy.occupational_expense_rate);
        if policy.occupational_expense_annual_cap > Decimal::ZERO {
            expense.min(policy.occupational_expense_annual_cap)
        } else {
            expense
        }
    }

    /// Annual taxable income (PKP): gross less occupational expense and PTKP,
    /// floored at zero and rounded down to the policy's rounding unit.
    pub fn taxable_income(
        &self,
        annual_gross: Decimal,
        category: &PtkpCategory,
    ) -> Decimal {
        let net = annual_gross - self.occupational_expense(annual_gross) - category.annual_allowance;
        floor_to_unit(non_negative(net), self.snapshot.policy().pkp_rounding_unit)
    }

    /// Tax on `taxable_income` under the progressive annual schedule.
    pub fn progressive_tax(
        &self,
        taxable_income: Decimal,
    ) -> Decimal {
        let tax: Decimal = self
            .snapshot
            .progressive_brackets()
            .iter()
            .map(|bracket| bracket.rate * bracket.overlap(taxable_income))
            .sum();
        round_half_up(tax)
    }

    /// Settles the fiscal year in `current_period`.
    ///
    /// `history` must hold every period from its start month up to the month
    /// before `current_period`; the current period's own gross and TER rate
    /// are passed separately.
    ///
    /// # Errors
    ///
    /// * [`Pph21Error::IncompleteAnnualHistory`] when a month is missing, or
    ///   the employee joined after January and prior employment is unknown.
    /// * [`Pph21Error::InvalidHistory`] for entries outside the window or
    ///   duplicated periods.
    /// * [`Pph21Error::YearEndOutsideDecember`] for a year-end settlement in
    ///   any other month.
    pub fn reconcile(
        &self,
        kind: PeriodKind,
        history: &AnnualHistory,
        current_period: Period,
        current_gross: Decimal,
        category: &PtkpCategory,
        ter_rate: Decimal,
    ) -> Result<AnnualReconciliation, Pph21Error> {
        match kind {
            PeriodKind::Monthly => return Err(Pph21Error::NotASettlementPeriod(current_period)),
            PeriodKind::YearEnd if !current_period.is_december() => {
                return Err(Pph21Error::YearEndOutsideDecember(current_period));
            }
            _ => {}
        }
        validate_history(history, current_period)?;

        let annual_gross = history.gross_to_date() + current_gross;
        let occupational_expense = self.occupational_expense(annual_gross);
        let taxable_income = self.taxable_income(annual_gross, category);
        let annual_tax = self.progressive_tax(taxable_income);
        let withheld_before = history.withheld_to_date();
        let current_withholding = monthly_withholding(current_gross, ter_rate);

        Ok(AnnualReconciliation {
            kind,
            annual_gross,
            occupational_expense,
            ptkp_allowance: category.annual_allowance,
            taxable_income,
            annual_tax,
            withheld_before,
            current_withholding,
            adjustment: annual_tax - withheld_before - current_withholding,
        })
    }
}

/// Checks that `history` covers exactly the months before `current` in the
/// same fiscal year.
pub fn validate_history(
    history: &AnnualHistory,
    current: Period,
) -> Result<(), Pph21Error> {
    if history.fiscal_year != current.year() {
        return Err(Pph21Error::FiscalYearMismatch {
            history: history.fiscal_year,
            period: current.year(),
        });
    }
    if !(1..=current.month()).contains(&history.start_month) {
        return Err(Pph21Error::InvalidHistory(format!(
            "start month {} is outside 1..={}",
            history.start_month,
            current.month()
        )));
    }
    if history.start_month > 1 && history.prior_employment == PriorEmployment::Unknown {
        return Err(Pph21Error::IncompleteAnnualHistory(format!(
            "employment started in month {} and prior-employer income was not supplied",
            history.start_month
        )));
    }

    let mut seen = HashSet::with_capacity(history.entries.len());
    for entry in &history.entries {
        if entry.period.year() != history.fiscal_year {
            return Err(Pph21Error::InvalidHistory(format!(
                "entry {} is outside fiscal year {}",
                entry.period, history.fiscal_year
            )));
        }
        if entry.period >= current {
            return Err(Pph21Error::InvalidHistory(format!(
                "entry {} is not before {current}",
                entry.period
            )));
        }
        if entry.period.month() < history.start_month {
            return Err(Pph21Error::InvalidHistory(format!(
                "entry {} precedes start month {}",
                entry.period, history.start_month
            )));
        }
        if !seen.insert(entry.period) {
            return Err(Pph21Error::InvalidHistory(format!(
                "period {} appears more than once",
                entry.period
            )));
        }
    }

    if let Some(missing) = current
        .preceding_in_year(history.start_month)
        .find(|p| !seen.contains(p))
    {
        return Err(Pph21Error::IncompleteAnnualHistory(format!(
            "no withholding recorded for {missing}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::WithholdingEntry;
    use crate::rate_table::AnnualPolicy;
    use crate::test_support::{sample_parts, sample_snapshot};

    fn period(year: i32, month: u32) -> Period {
        Period::new(year, month).unwrap()
    }

    fn full_history(
        year: i32,
        through_month: u32,
        gross: Decimal,
        rate: Decimal,
    ) -> AnnualHistory {
        let mut history = AnnualHistory::new(year);
        history.entries = (1..=through_month)
            .map(|m| WithholdingEntry {
                period: period(year, m),
                gross_salary: gross,
                pph21: monthly_withholding(gross, rate),
            })
            .collect();
        history
    }

    // =========================================================================
    // monthly_withholding tests
    // =========================================================================

    #[test]
    fn monthly_withholding_multiplies_gross_by_rate() {
        assert_eq!(monthly_withholding(dec!(8000000), dec!(0.05)), dec!(400000));
    }

    #[test]
    fn monthly_withholding_rounds_half_up() {
        assert_eq!(monthly_withholding(dec!(5400010), dec!(0.0025)), dec!(13500));
        assert_eq!(monthly_withholding(dec!(1234567), dec!(0.015)), dec!(18519));
    }

    // =========================================================================
    // taxable_income / progressive_tax tests
    // =========================================================================

    #[test]
    fn taxable_income_subtracts_ptkp_and_floors_at_zero() {
        let snapshot = sample_snapshot();
        let calc = Pph21Calculator::new(&snapshot);
        let tk0 = snapshot.ptkp_category("TK/0").unwrap();

        assert_eq!(calc.taxable_income(dec!(96000000), tk0), dec!(42000000));
        assert_eq!(calc.taxable_income(dec!(30000000), tk0), dec!(0));
    }

    #[test]
    fn policy_applies_occupational_expense_and_rounding() {
        let mut parts = sample_parts();
        parts.policy = AnnualPolicy {
            occupational_expense_rate: dec!(0.05),
            occupational_expense_annual_cap: dec!(6000000),
            pkp_rounding_unit: dec!(1000),
        };
        let snapshot = RateTableSnapshot::new(parts).unwrap();
        let calc = Pph21Calculator::new(&snapshot);
        let tk0 = snapshot.ptkp_category("TK/0").unwrap();

        // 5% of 96,000,123 is 4,800,006; PKP 37,200,117 rounds down to 37,200,000.
        assert_eq!(calc.occupational_expense(dec!(96000123)), dec!(4800006));
        assert_eq!(calc.taxable_income(dec!(96000123), tk0), dec!(37200000));
        // The cap binds above 120,000,000 of annual gross.
        assert_eq!(calc.occupational_expense(dec!(300000000)), dec!(6000000));
    }

    #[test]
    fn progressive_tax_applies_each_layer() {
        let snapshot = sample_snapshot();
        let calc = Pph21Calculator::new(&snapshot);

        assert_eq!(calc.progressive_tax(dec!(0)), dec!(0));
        assert_eq!(calc.progressive_tax(dec!(42000000)), dec!(2100000));
        // 60M × 5% + 40M × 15%
        assert_eq!(calc.progressive_tax(dec!(100000000)), dec!(9000000));
        // 3M + 28.5M + 62.5M + 0.3 × 100M
        assert_eq!(calc.progressive_tax(dec!(600000000)), dec!(124000000));
    }

    #[test]
    fn progressive_tax_is_monotonic() {
        let snapshot = sample_snapshot();
        let calc = Pph21Calculator::new(&snapshot);

        let mut previous = dec!(0);
        for step in 0..=100 {
            let taxable = Decimal::from(step) * dec!(10000000);
            let tax = calc.progressive_tax(taxable);
            assert!(tax >= previous);
            previous = tax;
        }
    }

    // =========================================================================
    // reconcile tests
    // =========================================================================

    #[test]
    fn year_end_closes_to_annual_tax() {
        let snapshot = sample_snapshot();
        let calc = Pph21Calculator::new(&snapshot);
        let tk0 = snapshot.ptkp_category("TK/0").unwrap();
        let history = full_history(2025, 11, dec!(8000000), dec!(0.05));

        let rec = calc
            .reconcile(PeriodKind::YearEnd, &history, period(2025, 12), dec!(8000000), tk0, dec!(0.05))
            .unwrap();

        assert_eq!(rec.annual_gross, dec!(96000000));
        assert_eq!(rec.taxable_income, dec!(42000000));
        assert_eq!(rec.annual_tax, dec!(2100000));
        assert_eq!(rec.withheld_before, dec!(4400000));
        assert_eq!(rec.current_withholding, dec!(400000));
        assert_eq!(rec.adjustment, dec!(-2700000));
        assert_eq!(
            rec.withheld_before + rec.current_withholding + rec.adjustment,
            rec.annual_tax
        );
    }

    #[test]
    fn termination_settles_in_any_month() {
        let snapshot = sample_snapshot();
        let calc = Pph21Calculator::new(&snapshot);
        let tk0 = snapshot.ptkp_category("TK/0").unwrap();
        let history = full_history(2025, 5, dec!(20000000), dec!(0.20));

        let rec = calc
            .reconcile(PeriodKind::Termination, &history, period(2025, 6), dec!(20000000), tk0, dec!(0.20))
            .unwrap();

        // 120M - 54M = 66M → 3M + 0.9M
        assert_eq!(rec.taxable_income, dec!(66000000));
        assert_eq!(rec.annual_tax, dec!(3900000));
        assert_eq!(rec.adjustment, dec!(3900000) - dec!(24000000));
    }

    #[test]
    fn year_end_outside_december_is_rejected() {
        let snapshot = sample_snapshot();
        let calc = Pph21Calculator::new(&snapshot);
        let tk0 = snapshot.ptkp_category("TK/0").unwrap();
        let history = full_history(2025, 5, dec!(1), dec!(0));

        assert_eq!(
            calc.reconcile(PeriodKind::YearEnd, &history, period(2025, 6), dec!(1), tk0, dec!(0)),
            Err(Pph21Error::YearEndOutsideDecember(period(2025, 6)))
        );
    }

    #[test]
    fn monthly_kind_does_not_reconcile() {
        let snapshot = sample_snapshot();
        let calc = Pph21Calculator::new(&snapshot);
        let tk0 = snapshot.ptkp_category("TK/0").unwrap();

        assert_eq!(
            calc.reconcile(PeriodKind::Monthly, &AnnualHistory::new(2025), period(2025, 1), dec!(1), tk0, dec!(0)),
            Err(Pph21Error::NotASettlementPeriod(period(2025, 1)))
        );
    }

    #[test]
    fn mid_year_joiner_without_prior_employer_data_is_incomplete() {
        let snapshot = sample_snapshot();
        let calc = Pph21Calculator::new(&snapshot);
        let tk0 = snapshot.ptkp_category("TK/0").unwrap();
        let mut history = full_history(2025, 11, dec!(8000000), dec!(0.05));
        history.entries.retain(|e| e.period.month() >= 7);
        history.start_month = 7;
        history.prior_employment = PriorEmployment::Unknown;

        let err = calc
            .reconcile(PeriodKind::YearEnd, &history, period(2025, 12), dec!(8000000), tk0, dec!(0.05))
            .unwrap_err();

        assert!(matches!(err, Pph21Error::IncompleteAnnualHistory(_)), "got {err:?}");
    }

    #[test]
    fn mid_year_joiner_with_prior_employer_data_reconciles() {
        let snapshot = sample_snapshot();
        let calc = Pph21Calculator::new(&snapshot);
        let tk0 = snapshot.ptkp_category("TK/0").unwrap();
        let mut history = full_history(2025, 11, dec!(8000000), dec!(0.05));
        history.entries.retain(|e| e.period.month() >= 7);
        history.start_month = 7;
        history.prior_employment = PriorEmployment::Reported {
            gross: dec!(48000000),
            withheld: dec!(2400000),
        };

        let rec = calc
            .reconcile(PeriodKind::YearEnd, &history, period(2025, 12), dec!(8000000), tk0, dec!(0.05))
            .unwrap();

        assert_eq!(rec.annual_gross, dec!(96000000));
        assert_eq!(rec.withheld_before, dec!(4400000));
    }

    #[test]
    fn missing_month_is_incomplete() {
        let snapshot = sample_snapshot();
        let calc = Pph21Calculator::new(&snapshot);
        let tk0 = snapshot.ptkp_category("TK/0").unwrap();
        let mut history = full_history(2025, 11, dec!(8000000), dec!(0.05));
        history.entries.retain(|e| e.period.month() != 4);

        assert_eq!(
            calc.reconcile(PeriodKind::YearEnd, &history, period(2025, 12), dec!(8000000), tk0, dec!(0.05)),
            Err(Pph21Error::IncompleteAnnualHistory(
                "no withholding recorded for 2025-04".to_string()
            ))
        );
    }

    #[test]
    fn duplicate_or_future_entries_are_invalid() {
        let snapshot = sample_snapshot();
        let calc = Pph21Calculator::new(&snapshot);
        let tk0 = snapshot.ptkp_category("TK/0").unwrap();

        let mut duplicated = full_history(2025, 11, dec!(1), dec!(0));
        duplicated.entries.push(duplicated.entries[0].clone());
        assert!(matches!(
            calc.reconcile(PeriodKind::YearEnd, &duplicated, period(2025, 12), dec!(1), tk0, dec!(0)),
            Err(Pph21Error::InvalidHistory(_))
        ));

        let future = full_history(2025, 12, dec!(1), dec!(0));
        assert!(matches!(
            calc.reconcile(PeriodKind::YearEnd, &future, period(2025, 12), dec!(1), tk0, dec!(0)),
            Err(Pph21Error::InvalidHistory(_))
        ));
    }

    #[test]
    fn history_from_another_year_is_rejected() {
        let snapshot = sample_snapshot();
        let calc = Pph21Calculator::new(&snapshot);
        let tk0 = snapshot.ptkp_category("TK/0").unwrap();
        let history = full_history(2024, 11, dec!(1), dec!(0));

        assert_eq!(
            calc.reconcile(PeriodKind::YearEnd, &history, period(2025, 12), dec!(1), tk0, dec!(0)),
            Err(Pph21Error::FiscalYearMismatch { history: 2024, period: 2025 })
        );
    }
}
