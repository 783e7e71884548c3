//! TER (tarif efektif rata-rata) rate lookup.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rate_table::RateTableSnapshot;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TerError {
    #[error("no TER brackets configured for PTKP code '{0}'")]
    NoBracketForCategory(String),

    #[error("monthly income must not be negative, got {0}")]
    NegativeIncome(Decimal),
}

/// The effective monthly rate that applies to one employee in one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerRate {
    pub category: String,
    pub rate: Decimal,
}

#[derive(Debug, Clone, Copy)]
pub struct TerRateLocator<'a> {
    snapshot: &'a RateTableSnapshot,
}

impl<'a> TerRateLocator<'a> {
    pub fn new(snapshot: &'a RateTableSnapshot) -> Self {
        Self { snapshot }
    }

    /// Finds the bracket of `ptkp_code`'s TER category containing
    /// `monthly_gross`.
    ///
    /// Brackets are half-open, `[min, max)`, so an income exactly on a
    /// boundary belongs to the higher bracket. Ladders are written in whole
    /// rupiah with `x,xxx,001` lower bounds, so the income is rounded up to
    /// the next whole rupiah first: 5,400,000.50 is above 5,400,000 and
    /// falls in the `5,400,001` bracket.
    pub fn lookup(
        &self,
        ptkp_code: &str,
        monthly_gross: Decimal,
    ) -> Result<TerRate, TerError> {
        if monthly_gross < Decimal::ZERO {
            return Err(TerError::NegativeIncome(monthly_gross));
        }

        let no_bracket = || TerError::NoBracketForCategory(ptkp_code.to_string());
        let category = self.snapshot.ter_category_for(ptkp_code).ok_or_else(no_bracket)?;
        let ladder = self.snapshot.ter_brackets(category).ok_or_else(no_bracket)?;

        // Ladders are sorted, contiguous and start at 0, so the containing
        // bracket is the last one whose lower bound is <= income.
        let income = monthly_gross.ceil();
        let idx = ladder.partition_point(|b| b.min_monthly_income <= income);
        let bracket = idx
            .checked_sub(1)
            .and_then(|i| ladder.get(i))
            .filter(|b| b.contains(income))
            .ok_or_else(no_bracket)?;

        Ok(TerRate {
            category: category.to_string(),
            rate: bracket.rate,
        })
    }
}
