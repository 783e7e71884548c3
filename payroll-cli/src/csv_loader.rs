//! CSV loader for the employee list of a batch recalculation.
//!
//! ## CSV Format
//!
//! Headers are matched by name, so column order does not matter.
//!
//! | Column           | Required | Type    | Notes                                         |
//! |------------------|----------|---------|-----------------------------------------------|
//! | `employee_id`    | yes      | string  |                                               |
//! | `ptkp_code`      | yes      | string  | e.g. `TK/0`, `K/2`, `K/I/1`                    |
//! | `npwp`           | no       | string  | Tax identification number                     |
//! | `basic_salary`   | yes      | decimal | Monthly basic salary                          |
//! | `allowances`     | no       | decimal | Total fixed monthly allowances                |
//! | `start_month`    | no       | 1-12    | First month employed this year; default `1`   |
//! | `prior_gross`    | no       | decimal | Gross earned at a previous employer this year |
//! | `prior_withheld` | no       | decimal | PPh 21 withheld by that employer              |
//! | `terminated`     | no       | bool    | `true` when the employee leaves this period   |
//!
//! ### Previous employment
//!
//! Any `prior_*` value marks the previous employment as reported (a missing
//! one of the pair counts as zero). Without them an employee who started in
//! January has no previous employer, while a later starter's previous
//! employment stays unknown and their year cannot be settled until it is
//! supplied. Write `0` to state there was none.
//!
//! ### Example
//!
//! ```csv
//! employee_id,ptkp_code,npwp,basic_salary,allowances,start_month,prior_gross,prior_withheld,terminated
//! E-001,TK/0,,8000000,,,,,
//! E-002,K/2,09.254.294.3-407.000,12000000,1500000,4,30000000,450000,false
//! ```
use std::path::Path;

use payroll_core::{BatchInput, EmployeeTaxProfile, GrossSalary, PriorEmployment};
use rust_decimal::Decimal;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Serde-compatible row that mirrors the CSV layout exactly
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CsvRow {
    employee_id: String,
    ptkp_code: String,
    #[serde(default)]
    npwp: Option<String>,
    basic_salary: Decimal,
    #[serde(default)]
    allowances: Option<Decimal>,
    #[serde(default)]
    start_month: Option<u32>,
    #[serde(default)]
    prior_gross: Option<Decimal>,
    #[serde(default)]
    prior_withheld: Option<Decimal>,
    #[serde(default)]
    terminated: Option<bool>,
}

/// Errors that can occur while loading the employee CSV.
#[derive(Debug, thiserror::Error)]
pub enum CsvLoadError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Bad structure, missing required column or type mismatch.
    #[error("CSV parse error: {0}")]
    Parse(#[from] csv::Error),

    /// `row` is 1-based, excluding the header.
    #[error("start_month {value} on row {row} is not between 1 and 12")]
    InvalidStartMonth { value: u32, row: usize },

    #[error("employee '{employee_id}' appears more than once (row {row})")]
    DuplicateEmployee { employee_id: String, row: usize },
}

fn convert_row(
    row: CsvRow,
    row_number: usize,
) -> Result<BatchInput, CsvLoadError> {
    let start_month = row.start_month.unwrap_or(1);
    if !(1..=12).contains(&start_month) {
        return Err(CsvLoadError::InvalidStartMonth {
            value: start_month,
            row: row_number,
        });
    }

    let prior_employment = match (row.prior_gross, row.prior_withheld) {
        (None, None) if start_month == 1 => PriorEmployment::None,
        (None, None) => PriorEmployment::Unknown,
        (gross, withheld) => PriorEmployment::Reported {
            gross: gross.unwrap_or_default(),
            withheld: withheld.unwrap_or_default(),
        },
    };

    let mut gross = GrossSalary::basic(row.basic_salary);
    if let Some(amount) = row.allowances.filter(|a| !a.is_zero()) {
        gross = gross.with_allowance("allowances", amount);
    }

    Ok(BatchInput {
        profile: EmployeeTaxProfile {
            employee_id: row.employee_id,
            ptkp_code: row.ptkp_code,
            npwp: row.npwp.filter(|n| !n.is_empty()),
        },
        gross,
        start_month,
        prior_employment,
        terminated: row.terminated.unwrap_or(false),
    })
}

/// Parse CSV text and return one [`BatchInput`] per row, in file order.
///
/// Amounts are not range-checked here; the engine reports a negative salary
/// as a failure of that employee only.
pub fn load_from_str(input: &str) -> Result<Vec<BatchInput>, CsvLoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(input.as_bytes());

    let mut inputs: Vec<BatchInput> = Vec::new();
    for (idx, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row_number = idx + 1;
        let input = convert_row(result?, row_number)?;
        if inputs
            .iter()
            .any(|i| i.profile.employee_id == input.profile.employee_id)
        {
            return Err(CsvLoadError::DuplicateEmployee {
                employee_id: input.profile.employee_id,
                row: row_number,
            });
        }
        inputs.push(input);
    }
    Ok(inputs)
}

/// Read a file from disk and delegate to [`load_from_str`].
pub fn load_from_file(path: &Path) -> Result<Vec<BatchInput>, CsvLoadError> {
    let contents = std::fs::read_to_string(path).map_err(|source| CsvLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_from_str(&contents)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    const HEADER: &str = "employee_id,ptkp_code,npwp,basic_salary,allowances,start_month,prior_gross,prior_withheld,terminated";

    fn parse(rows: &str) -> Result<Vec<BatchInput>, CsvLoadError> {
        load_from_str(&format!("{HEADER}\n{rows}"))
    }

    #[test]
    fn minimal_row_uses_defaults() {
        let inputs = parse("E-001,TK/0,,8000000,,,,,").unwrap();

        assert_eq!(
            inputs,
            vec![BatchInput::new(
                EmployeeTaxProfile {
                    employee_id: "E-001".to_string(),
                    ptkp_code: "TK/0".to_string(),
                    npwp: None,
                },
                GrossSalary::basic(dec!(8000000)),
            )]
        );
    }

    #[test]
    fn only_required_columns_are_needed() {
        let inputs = load_from_str("employee_id,ptkp_code,basic_salary\nE-1,K/1,9000000\n").unwrap();

        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].gross.total(), dec!(9000000));
        assert_eq!(inputs[0].prior_employment, PriorEmployment::None);
    }

    #[test]
    fn full_row() {
        let inputs =
            parse("E-002,K/2,09.254.294.3-407.000,12000000,1500000,4,30000000,450000,true").unwrap();
        let input = &inputs[0];

        assert_eq!(input.profile.npwp.as_deref(), Some("09.254.294.3-407.000"));
        assert_eq!(input.gross.total(), dec!(13500000));
        assert_eq!(input.start_month, 4);
        assert_eq!(
            input.prior_employment,
            PriorEmployment::Reported {
                gross: dec!(30000000),
                withheld: dec!(450000),
            }
        );
        assert!(input.terminated);
    }

    #[test]
    fn late_starter_without_prior_figures_is_unknown() {
        let inputs = parse("E-003,TK/1,,7000000,,7,,,").unwrap();

        assert_eq!(inputs[0].prior_employment, PriorEmployment::Unknown);
    }

    #[test]
    fn zero_prior_gross_states_no_previous_income() {
        let inputs = parse("E-003,TK/1,,7000000,,7,0,,").unwrap();

        assert_eq!(
            inputs[0].prior_employment,
            PriorEmployment::Reported {
                gross: dec!(0),
                withheld: dec!(0),
            }
        );
    }

    #[test]
    fn start_month_out_of_range() {
        let err = parse("E-001,TK/0,,8000000,,,,,\nE-002,TK/0,,8000000,,13,,,").unwrap_err();

        assert!(matches!(
            err,
            CsvLoadError::InvalidStartMonth { value: 13, row: 2 }
        ));
    }

    #[test]
    fn duplicate_employee_is_rejected() {
        let err = parse("E-001,TK/0,,8000000,,,,,\nE-001,K/0,,9000000,,,,,").unwrap_err();

        assert!(matches!(
            err,
            CsvLoadError::DuplicateEmployee { ref employee_id, row: 2 } if employee_id == "E-001"
        ));
    }

    #[test]
    fn bad_amount_is_a_parse_error() {
        let err = parse("E-001,TK/0,,eight million,,,,,").unwrap_err();

        assert!(matches!(err, CsvLoadError::Parse(_)));
    }

    #[test]
    fn negative_salary_is_left_to_the_engine() {
        let inputs = parse("E-001,TK/0,,-5,,,,,").unwrap();

        assert_eq!(inputs[0].gross.total(), dec!(-5));
    }

    #[test]
    fn missing_file() {
        let err = load_from_file(Path::new("/nonexistent/employees.csv")).unwrap_err();

        assert!(matches!(err, CsvLoadError::Io { .. }));
    }
}
