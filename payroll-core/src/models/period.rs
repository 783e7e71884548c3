use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("period must be formatted YYYY-MM, got '{0}'")]
    Malformed(String),

    #[error("period month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),

    #[error("period year must be between 1900 and 9999, got {0}")]
    InvalidYear(i32),
}

/// A payroll period: one calendar month, written `YYYY-MM`.
///
/// Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(
        year: i32,
        month: u32,
    ) -> Result<Self, PeriodError> {
        if !(1900..=9999).contains(&year) {
            return Err(PeriodError::InvalidYear(year));
        }
        if !(1..=12).contains(&month) {
            return Err(PeriodError::InvalidMonth(month));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// First calendar day of the period; rate tables are selected by this date.
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn is_december(&self) -> bool {
        self.month == 12
    }

    /// Months of the same fiscal year from `start_month` up to, but not
    /// including, this period.
    pub fn preceding_in_year(
        &self,
        start_month: u32,
    ) -> impl Iterator<Item = Period> + use<> {
        let year = self.year;
        (start_month.max(1)..self.month).map(move |month| Period { year, month })
    }
}

impl fmt::Display for Period {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || PeriodError::Malformed(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(malformed)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(malformed());
        }
        let year: i32 = year.parse().map_err(|_| malformed())?;
        let month: u32 = month.parse().map_err(|_| malformed())?;
        Period::new(year, month)
    }
}

impl TryFrom<String> for Period {
    type Error = PeriodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_and_displays_year_month() {
        let period: Period = "2025-03".parse().expect("valid period");

        assert_eq!(period.year(), 2025);
        assert_eq!(period.month(), 3);
        assert_eq!(period.to_string(), "2025-03");
    }

    #[test]
    fn rejects_month_out_of_range() {
        assert_eq!("2025-13".parse::<Period>(), Err(PeriodError::InvalidMonth(13)));
        assert_eq!("2025-00".parse::<Period>(), Err(PeriodError::InvalidMonth(0)));
    }

    #[test]
    fn rejects_malformed_strings() {
        for input in ["2025", "2025-3", "25-03", "2025/03", "abcd-ef", ""] {
            assert!(
                matches!(input.parse::<Period>(), Err(PeriodError::Malformed(_))),
                "expected Malformed for {input:?}"
            );
        }
    }

    #[test]
    fn first_day_is_first_of_month() {
        let period = Period::new(2024, 2).unwrap();

        assert_eq!(period.first_day(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn ordering_is_chronological() {
        let dec_2024 = Period::new(2024, 12).unwrap();
        let jan_2025 = Period::new(2025, 1).unwrap();
        let feb_2025 = Period::new(2025, 2).unwrap();

        assert!(dec_2024 < jan_2025);
        assert!(jan_2025 < feb_2025);
    }

    #[test]
    fn preceding_in_year_starts_at_start_month() {
        let period = Period::new(2025, 5).unwrap();

        let months: Vec<String> = period.preceding_in_year(3).map(|p| p.to_string()).collect();

        assert_eq!(months, vec!["2025-03", "2025-04"]);
    }

    #[test]
    fn string_conversion_round_trips() {
        let period = Period::new(2025, 11).unwrap();

        let text = String::from(period);

        assert_eq!(Period::try_from(text), Ok(period));
    }
}
