use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Assigns a PTKP code to a TER category (`A`, `B`, `C`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerCategoryAssignment {
    pub ptkp_code: String,
    pub category: String,
}

/// One monthly income band of a TER category.
///
/// The lower bound is inclusive and the upper bound exclusive; a `None`
/// upper bound marks the final open-ended band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerBracket {
    pub category: String,
    pub min_monthly_income: Decimal,
    pub max_monthly_income: Option<Decimal>,
    pub rate: Decimal,
}

impl TerBracket {
    pub fn contains(
        &self,
        monthly_income: Decimal,
    ) -> bool {
        monthly_income >= self.min_monthly_income
            && self.max_monthly_income.is_none_or(|max| monthly_income < max)
    }
}
