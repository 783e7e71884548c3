//! BPJS Kesehatan and Ketenagakerjaan contributions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::common::round_half_up;
use crate::models::{BpjsContribution, BpjsProgram};
use crate::rate_table::RateTableSnapshot;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BpjsError {
    #[error("gross salary must not be negative, got {0}")]
    NegativeGross(Decimal),

    #[error("BPJS program {0} has no rate configured")]
    MissingProgram(BpjsProgram),
}

/// Per-program contributions and their totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BpjsBreakdown {
    pub contributions: Vec<BpjsContribution>,
    pub employee_total: Decimal,
    pub company_total: Decimal,
}

#[derive(Debug, Clone, Copy)]
pub struct BpjsCalculator<'a> {
    snapshot: &'a RateTableSnapshot,
}

impl<'a> BpjsCalculator<'a> {
    pub fn new(snapshot: &'a RateTableSnapshot) -> Self {
        Self { snapshot }
    }

    /// Contributions of every program for one month's gross, in program order.
    ///
    /// Each program's base is capped independently and each share is rounded
    /// on its own; totals are sums of the rounded shares.
    pub fn compute(
        &self,
        gross: Decimal,
    ) -> Result<BpjsBreakdown, BpjsError> {
        if gross < Decimal::ZERO {
            return Err(BpjsError::NegativeGross(gross));
        }

        let mut contributions = Vec::with_capacity(BpjsProgram::ALL.len());
        for program in BpjsProgram::ALL {
            let rate = self
                .snapshot
                .bpjs_rate(program)
                .ok_or(BpjsError::MissingProgram(program))?;
            let base = rate.contribution_base(gross);
            contributions.push(BpjsContribution {
                program,
                base,
                employee_share: round_half_up(base * rate.employee_rate),
                company_share: round_half_up(base * rate.company_rate),
            });
        }

        Ok(BpjsBreakdown {
            employee_total: contributions.iter().map(|c| c.employee_share).sum(),
            company_total: contributions.iter().map(|c| c.company_share).sum(),
            contributions,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::test_support::{sample_parts, sample_snapshot};

    fn share(
        breakdown: &BpjsBreakdown,
        program: BpjsProgram,
    ) -> &BpjsContribution {
        breakdown
            .contributions
            .iter()
            .find(|c| c.program == program)
            .unwrap()
    }

    #[test]
    fn below_caps_every_program_uses_gross() {
        let snapshot = sample_snapshot();
        let breakdown = BpjsCalculator::new(&snapshot).compute(dec!(8000000)).unwrap();

        assert_eq!(breakdown.contributions.len(), 5);
        assert!(breakdown.contributions.iter().all(|c| c.base == dec!(8000000)));
        assert_eq!(share(&breakdown, BpjsProgram::Kesehatan).employee_share, dec!(80000));
        assert_eq!(share(&breakdown, BpjsProgram::Kesehatan).company_share, dec!(320000));
        assert_eq!(share(&breakdown, BpjsProgram::Jkk).company_share, dec!(19200));
        assert_eq!(share(&breakdown, BpjsProgram::Jkm).company_share, dec!(24000));
        assert_eq!(share(&breakdown, BpjsProgram::Jht).employee_share, dec!(160000));
        assert_eq!(share(&breakdown, BpjsProgram::Jht).company_share, dec!(296000));
        assert_eq!(share(&breakdown, BpjsProgram::Jp).employee_share, dec!(80000));
        assert_eq!(share(&breakdown, BpjsProgram::Jp).company_share, dec!(160000));
        assert_eq!(breakdown.employee_total, dec!(320000));
        assert_eq!(breakdown.company_total, dec!(819200));
    }

    #[test]
    fn caps_apply_per_program() {
        let snapshot = sample_snapshot();
        let breakdown = BpjsCalculator::new(&snapshot).compute(dec!(20000000)).unwrap();

        let kesehatan = share(&breakdown, BpjsProgram::Kesehatan);
        let jp = share(&breakdown, BpjsProgram::Jp);
        let jht = share(&breakdown, BpjsProgram::Jht);

        assert_eq!(kesehatan.base, dec!(12000000));
        assert_eq!(kesehatan.employee_share, dec!(120000));
        assert_eq!(jp.base, dec!(10042300));
        assert_eq!(jp.employee_share, dec!(100423));
        assert_eq!(jp.company_share, dec!(200846));
        // Uncapped programs use the full gross.
        assert_eq!(jht.base, dec!(20000000));
    }

    #[test]
    fn contributions_stop_growing_above_the_cap() {
        let snapshot = sample_snapshot();
        let calc = BpjsCalculator::new(&snapshot);

        let at_cap = calc.compute(dec!(12000000)).unwrap();
        let above_cap = calc.compute(dec!(50000000)).unwrap();

        assert_eq!(
            share(&at_cap, BpjsProgram::Kesehatan),
            share(&above_cap, BpjsProgram::Kesehatan)
        );
    }

    #[test]
    fn shares_are_rounded_half_up_individually() {
        let snapshot = sample_snapshot();
        let breakdown = BpjsCalculator::new(&snapshot).compute(dec!(1234567)).unwrap();

        // 1,234,567 × 0.0024 = 2,962.9608
        assert_eq!(share(&breakdown, BpjsProgram::Jkk).company_share, dec!(2963));
        // 1,234,567 × 0.01 = 12,345.67
        assert_eq!(share(&breakdown, BpjsProgram::Kesehatan).employee_share, dec!(12346));
    }

    #[test]
    fn company_only_programs_follow_configured_rates() {
        let mut parts = sample_parts();
        for rate in &mut parts.bpjs_rates {
            if rate.program == BpjsProgram::Jkm {
                rate.employee_rate = dec!(0.001);
            }
        }
        let snapshot = RateTableSnapshot::new(parts).unwrap();
        let breakdown = BpjsCalculator::new(&snapshot).compute(dec!(8000000)).unwrap();

        assert_eq!(share(&breakdown, BpjsProgram::Jkm).employee_share, dec!(8000));
    }

    #[test]
    fn zero_gross_contributes_nothing() {
        let snapshot = sample_snapshot();
        let breakdown = BpjsCalculator::new(&snapshot).compute(dec!(0)).unwrap();

        assert_eq!(breakdown.employee_total, dec!(0));
        assert_eq!(breakdown.company_total, dec!(0));
    }

    #[test]
    fn negative_gross_is_rejected() {
        let snapshot = sample_snapshot();

        assert_eq!(
            BpjsCalculator::new(&snapshot).compute(dec!(-1)),
            Err(BpjsError::NegativeGross(dec!(-1)))
        );
    }
}
