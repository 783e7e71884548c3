use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One layer of the annual progressive PPh 21 schedule (UU HPP, Article 17).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressiveTaxBracket {
    pub min_annual_income: Decimal,
    pub max_annual_income: Option<Decimal>,
    pub rate: Decimal,
}

impl ProgressiveTaxBracket {
    /// Portion of `taxable_income` that falls inside this layer.
    pub fn overlap(
        &self,
        taxable_income: Decimal,
    ) -> Decimal {
        let upper = match self.max_annual_income {
            Some(max) => taxable_income.min(max),
            None => taxable_income,
        };
        (upper - self.min_annual_income).max(Decimal::ZERO)
    }
}
