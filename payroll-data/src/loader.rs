use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use payroll_core::rate_table::{
    AnnualPolicy, RateTableError, RateTableParts, RateTableSnapshot, RateTableVersion,
};
use payroll_core::{
    BpjsProgram, BpjsProgramRate, MaritalStatus, PayrollRepository, ProgressiveTaxBracket,
    PtkpCategory, RepositoryError, TerBracket, TerCategoryAssignment,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::info;

pub const VERSION_FILE: &str = "version.csv";
pub const PTKP_FILE: &str = "ptkp.csv";
pub const TER_CATEGORIES_FILE: &str = "ter_categories.csv";
pub const TER_BRACKETS_FILE: &str = "ter_brackets.csv";
pub const PROGRESSIVE_FILE: &str = "progressive.csv";
pub const BPJS_FILE: &str = "bpjs.csv";

/// Errors that can occur when importing a rate-table version.
#[derive(Debug, Error)]
pub enum RateTableLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Failed to read '{path}': {message}")]
    Io { path: PathBuf, message: String },

    #[error("version.csv must contain exactly one row, found {0}")]
    VersionRowCount(usize),

    #[error("Unknown marital status '{0}' (expected TK or K)")]
    InvalidMaritalStatus(String),

    #[error("Unsupported BPJS program '{0}'")]
    UnsupportedProgram(String),

    #[error("Invalid rate table: {0}")]
    Invalid(#[from] RateTableError),

    #[error("Rate table version {0} already exists; published versions cannot be replaced")]
    VersionExists(NaiveDate),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<csv::Error> for RateTableLoaderError {
    fn from(err: csv::Error) -> Self {
        RateTableLoaderError::CsvParse(err.to_string())
    }
}

fn deserialize_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// `version.csv`: one row naming the version and its annual policy.
///
/// Empty policy columns fall back to [`AnnualPolicy::default`].
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VersionRecord {
    pub effective_from: NaiveDate,
    pub label: String,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub occupational_expense_rate: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub occupational_expense_annual_cap: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub pkp_rounding_unit: Option<Decimal>,
}

/// `ptkp.csv`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PtkpRecord {
    pub code: String,
    pub marital_status: String,
    pub income_combined: bool,
    pub dependents: u8,
    pub annual_allowance: Decimal,
}

/// `ter_categories.csv`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TerCategoryRecord {
    pub ptkp_code: String,
    pub category: String,
}

/// `ter_brackets.csv`. An empty `max_monthly_income` marks the open band.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TerBracketRecord {
    pub category: String,
    pub min_monthly_income: Decimal,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub max_monthly_income: Option<Decimal>,
    pub rate: Decimal,
}

/// `progressive.csv`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProgressiveRecord {
    pub min_annual_income: Decimal,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub max_annual_income: Option<Decimal>,
    pub rate: Decimal,
}

/// `bpjs.csv`. An empty `salary_cap` means the program is uncapped.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BpjsRecord {
    pub program: String,
    pub employee_rate: Decimal,
    pub company_rate: Decimal,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub salary_cap: Option<Decimal>,
}

fn read_records<R: Read, T: DeserializeOwned>(reader: R) -> Result<Vec<T>, RateTableLoaderError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for result in csv_reader.deserialize() {
        let record: T = result?;
        records.push(record);
    }

    Ok(records)
}

/// Loader for one rate-table version kept as a directory of CSV files.
///
/// Parsing produces [`RateTableParts`]; nothing reaches the repository until
/// the parts validate as a [`RateTableSnapshot`].
pub struct RateTableLoader;

impl RateTableLoader {
    pub fn parse_version<R: Read>(
        reader: R
    ) -> Result<(RateTableVersion, AnnualPolicy), RateTableLoaderError> {
        let mut rows: Vec<VersionRecord> = read_records(reader)?;
        if rows.len() != 1 {
            return Err(RateTableLoaderError::VersionRowCount(rows.len()));
        }
        let row = rows.remove(0);
        let defaults = AnnualPolicy::default();

        Ok((
            RateTableVersion {
                effective_from: row.effective_from,
                label: row.label,
            },
            AnnualPolicy {
                occupational_expense_rate: row
                    .occupational_expense_rate
                    .unwrap_or(defaults.occupational_expense_rate),
                occupational_expense_annual_cap: row
                    .occupational_expense_annual_cap
                    .unwrap_or(defaults.occupational_expense_annual_cap),
                pkp_rounding_unit: row.pkp_rounding_unit.unwrap_or(defaults.pkp_rounding_unit),
            },
        ))
    }

    pub fn parse_ptkp<R: Read>(reader: R) -> Result<Vec<PtkpCategory>, RateTableLoaderError> {
        read_records::<_, PtkpRecord>(reader)?
            .into_iter()
            .map(|r| {
                Ok(PtkpCategory {
                    marital_status: MaritalStatus::parse(r.marital_status.trim()).ok_or_else(
                        || RateTableLoaderError::InvalidMaritalStatus(r.marital_status.clone()),
                    )?,
                    code: r.code,
                    income_combined: r.income_combined,
                    dependents: r.dependents,
                    annual_allowance: r.annual_allowance,
                })
            })
            .collect()
    }

    pub fn parse_ter_categories<R: Read>(
        reader: R
    ) -> Result<Vec<TerCategoryAssignment>, RateTableLoaderError> {
        Ok(read_records::<_, TerCategoryRecord>(reader)?
            .into_iter()
            .map(|r| TerCategoryAssignment {
                ptkp_code: r.ptkp_code,
                category: r.category,
            })
            .collect())
    }

    pub fn parse_ter_brackets<R: Read>(
        reader: R
    ) -> Result<Vec<TerBracket>, RateTableLoaderError> {
        Ok(read_records::<_, TerBracketRecord>(reader)?
            .into_iter()
            .map(|r| TerBracket {
                category: r.category,
                min_monthly_income: r.min_monthly_income,
                max_monthly_income: r.max_monthly_income,
                rate: r.rate,
            })
            .collect())
    }

    pub fn parse_progressive<R: Read>(
        reader: R
    ) -> Result<Vec<ProgressiveTaxBracket>, RateTableLoaderError> {
        Ok(read_records::<_, ProgressiveRecord>(reader)?
            .into_iter()
            .map(|r| ProgressiveTaxBracket {
                min_annual_income: r.min_annual_income,
                max_annual_income: r.max_annual_income,
                rate: r.rate,
            })
            .collect())
    }

    pub fn parse_bpjs<R: Read>(reader: R) -> Result<Vec<BpjsProgramRate>, RateTableLoaderError> {
        read_records::<_, BpjsRecord>(reader)?
            .into_iter()
            .map(|r| {
                Ok(BpjsProgramRate {
                    program: BpjsProgram::parse(&r.program)
                        .ok_or_else(|| RateTableLoaderError::UnsupportedProgram(r.program.clone()))?,
                    employee_rate: r.employee_rate,
                    company_rate: r.company_rate,
                    salary_cap: r.salary_cap,
                })
            })
            .collect()
    }

    /// Reads every table of one version from `dir`.
    pub fn read_dir(dir: &Path) -> Result<RateTableParts, RateTableLoaderError> {
        let (version, policy) = Self::parse_version(open(dir, VERSION_FILE)?)?;
        Ok(RateTableParts {
            version,
            ptkp_categories: Self::parse_ptkp(open(dir, PTKP_FILE)?)?,
            ter_assignments: Self::parse_ter_categories(open(dir, TER_CATEGORIES_FILE)?)?,
            ter_brackets: Self::parse_ter_brackets(open(dir, TER_BRACKETS_FILE)?)?,
            progressive_brackets: Self::parse_progressive(open(dir, PROGRESSIVE_FILE)?)?,
            bpjs_rates: Self::parse_bpjs(open(dir, BPJS_FILE)?)?,
            policy,
        })
    }

    /// Builds the snapshot the engine would use, without storing anything.
    pub fn validate(parts: &RateTableParts) -> Result<RateTableSnapshot, RateTableLoaderError> {
        Ok(RateTableSnapshot::new(parts.clone())?)
    }

    /// Validates `parts` and stores them as a new version.
    ///
    /// Versions are immutable: an effective date that is already stored is
    /// refused rather than overwritten.
    pub async fn load<R: PayrollRepository + ?Sized>(
        repo: &R,
        parts: &RateTableParts,
    ) -> Result<RateTableVersion, RateTableLoaderError> {
        let snapshot = Self::validate(parts)?;
        let effective_from = snapshot.effective_from();

        let existing = repo.list_rate_table_versions().await?;
        if existing.iter().any(|v| v.effective_from == effective_from) {
            return Err(RateTableLoaderError::VersionExists(effective_from));
        }

        repo.save_rate_table(snapshot.parts()).await?;
        info!(
            %effective_from,
            label = %snapshot.version().label,
            ter_brackets = snapshot.parts().ter_brackets.len(),
            "rate table version loaded"
        );
        Ok(snapshot.version().clone())
    }
}

fn open(
    dir: &Path,
    name: &str,
) -> Result<File, RateTableLoaderError> {
    let path = dir.join(name);
    File::open(&path).map_err(|e| RateTableLoaderError::Io {
        path,
        message: e.to_string(),
    })
}
