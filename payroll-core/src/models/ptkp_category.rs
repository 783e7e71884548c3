use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Highest number of dependents that earns a PTKP increment.
pub const MAX_DEPENDENTS: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaritalStatus {
    #[serde(rename = "TK")]
    Single,
    #[serde(rename = "K")]
    Married,
}

impl MaritalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "TK",
            Self::Married => "K",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "TK" => Some(Self::Single),
            "K" => Some(Self::Married),
            _ => None,
        }
    }
}

/// One row of the PTKP table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PtkpCategory {
    pub code: String,
    pub marital_status: MaritalStatus,
    pub income_combined: bool,
    pub dependents: u8,
    pub annual_allowance: Decimal,
}

impl PtkpCategory {
    /// Builds the canonical code for a status combination: `TK/0`, `K/2`,
    /// `K/I/3`.
    pub fn code_for(
        marital_status: MaritalStatus,
        income_combined: bool,
        dependents: u8,
    ) -> String {
        if income_combined {
            format!("{}/I/{}", marital_status.as_str(), dependents)
        } else {
            format!("{}/{}", marital_status.as_str(), dependents)
        }
    }

    /// Non-taxable allowance for one month (annual / 12, unrounded).
    pub fn monthly_allowance(&self) -> Decimal {
        self.annual_allowance / Decimal::from(12)
    }
}

/// Increment amounts from which a complete PTKP table is generated.
///
/// The table rows are what the engine looks up; this schedule only exists to
/// produce those rows consistently (seed data, loaders, fixtures).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PtkpSchedule {
    /// Allowance of a single filer with no dependents.
    pub base_allowance: Decimal,
    pub married_increment: Decimal,
    pub dependent_increment: Decimal,
    /// Added on top of the married increment when the spouse's income is
    /// combined with the employee's.
    pub combined_income_increment: Decimal,
}

impl PtkpSchedule {
    pub fn allowance_for(
        &self,
        marital_status: MaritalStatus,
        income_combined: bool,
        dependents: u8,
    ) -> Decimal {
        let mut allowance = self.base_allowance;
        if marital_status == MaritalStatus::Married {
            allowance += self.married_increment;
            if income_combined {
                allowance += self.combined_income_increment;
            }
        }
        allowance + self.dependent_increment * Decimal::from(dependents.min(MAX_DEPENDENTS))
    }

    /// Every category the schedule defines: `TK/0..3`, `K/0..3`, `K/I/0..3`.
    pub fn categories(&self) -> Vec<PtkpCategory> {
        let combos = [
            (MaritalStatus::Single, false),
            (MaritalStatus::Married, false),
            (MaritalStatus::Married, true),
        ];

        combos
            .into_iter()
            .flat_map(|(status, combined)| {
                (0..=MAX_DEPENDENTS).map(move |dependents| PtkpCategory {
                    code: PtkpCategory::code_for(status, combined, dependents),
                    marital_status: status,
                    income_combined: combined,
                    dependents,
                    annual_allowance: self.allowance_for(status, combined, dependents),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn schedule_2024() -> PtkpSchedule {
        PtkpSchedule {
            base_allowance: dec!(54000000),
            married_increment: dec!(4500000),
            dependent_increment: dec!(4500000),
            combined_income_increment: dec!(54000000),
        }
    }

    #[test]
    fn code_for_formats_all_variants() {
        assert_eq!(PtkpCategory::code_for(MaritalStatus::Single, false, 0), "TK/0");
        assert_eq!(PtkpCategory::code_for(MaritalStatus::Married, false, 2), "K/2");
        assert_eq!(PtkpCategory::code_for(MaritalStatus::Married, true, 3), "K/I/3");
    }

    #[test]
    fn schedule_produces_twelve_categories() {
        let categories = schedule_2024().categories();

        assert_eq!(categories.len(), 12);
        assert_eq!(categories[0].code, "TK/0");
        assert_eq!(categories[11].code, "K/I/3");
    }

    #[test]
    fn schedule_allowances_match_official_amounts() {
        let schedule = schedule_2024();

        assert_eq!(schedule.allowance_for(MaritalStatus::Single, false, 0), dec!(54000000));
        assert_eq!(schedule.allowance_for(MaritalStatus::Single, false, 3), dec!(67500000));
        assert_eq!(schedule.allowance_for(MaritalStatus::Married, false, 0), dec!(58500000));
        assert_eq!(schedule.allowance_for(MaritalStatus::Married, false, 3), dec!(72000000));
        assert_eq!(schedule.allowance_for(MaritalStatus::Married, true, 0), dec!(112500000));
        assert_eq!(schedule.allowance_for(MaritalStatus::Married, true, 3), dec!(126000000));
    }

    #[test]
    fn monthly_allowance_is_one_twelfth() {
        let category = PtkpCategory {
            code: "TK/0".to_string(),
            marital_status: MaritalStatus::Single,
            income_combined: false,
            dependents: 0,
            annual_allowance: dec!(54000000),
        };

        assert_eq!(category.monthly_allowance(), dec!(4500000));
    }

    #[test]
    fn marital_status_round_trips_codes() {
        for status in [MaritalStatus::Single, MaritalStatus::Married] {
            assert_eq!(MaritalStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(MaritalStatus::parse("X"), None);
    }
}
