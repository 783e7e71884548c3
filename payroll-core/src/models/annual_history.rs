use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Period;

/// What is known about income earned earlier in the fiscal year at another
/// employer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriorEmployment {
    /// Nothing was supplied. Acceptable only when employment began in January.
    #[default]
    Unknown,
    /// The employee confirmed there was no earlier employment this year.
    None,
    /// Figures from the previous employer's withholding slip (form 1721-A1).
    Reported { gross: Decimal, withheld: Decimal },
}

impl PriorEmployment {
    pub fn gross(&self) -> Decimal {
        match self {
            Self::Reported { gross, .. } => *gross,
            _ => Decimal::ZERO,
        }
    }

    pub fn withheld(&self) -> Decimal {
        match self {
            Self::Reported { withheld, .. } => *withheld,
            _ => Decimal::ZERO,
        }
    }
}

/// Gross and PPh 21 already settled for one earlier period of the year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithholdingEntry {
    pub period: Period,
    pub gross_salary: Decimal,
    pub pph21: Decimal,
}

/// Year-to-date context for one employee, excluding the period being computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnualHistory {
    pub fiscal_year: i32,
    /// First month of employment with this employer in the fiscal year.
    pub start_month: u32,
    pub prior_employment: PriorEmployment,
    pub entries: Vec<WithholdingEntry>,
}

impl AnnualHistory {
    /// Empty history for an employee present since January with no earlier
    /// employer.
    pub fn new(fiscal_year: i32) -> Self {
        Self {
            fiscal_year,
            start_month: 1,
            prior_employment: PriorEmployment::None,
            entries: Vec::new(),
        }
    }

    /// Gross from earlier periods of the year, including a previous employer.
    pub fn gross_to_date(&self) -> Decimal {
        self.prior_employment.gross() + self.entries.iter().map(|e| e.gross_salary).sum::<Decimal>()
    }

    /// PPh 21 already withheld this year, including a previous employer.
    pub fn withheld_to_date(&self) -> Decimal {
        self.prior_employment.withheld() + self.entries.iter().map(|e| e.pph21).sum::<Decimal>()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn totals_include_prior_employer() {
        let history = AnnualHistory {
            fiscal_year: 2025,
            start_month: 3,
            prior_employment: PriorEmployment::Reported {
                gross: dec!(20000000),
                withheld: dec!(300000),
            },
            entries: vec![WithholdingEntry {
                period: Period::new(2025, 3).unwrap(),
                gross_salary: dec!(10000000),
                pph21: dec!(200000),
            }],
        };

        assert_eq!(history.gross_to_date(), dec!(30000000));
        assert_eq!(history.withheld_to_date(), dec!(500000));
    }

    #[test]
    fn new_history_is_empty() {
        let history = AnnualHistory::new(2025);

        assert_eq!(history.gross_to_date(), dec!(0));
        assert_eq!(history.withheld_to_date(), dec!(0));
        assert_eq!(history.prior_employment, PriorEmployment::None);
    }
}
