use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use payroll_core::rate_table::{AnnualPolicy, RateTableParts, RateTableSnapshot, RateTableVersion};
use payroll_core::{
    AnnualReconciliation, BpjsContribution, BpjsProgram, BpjsProgramRate, MaritalStatus,
    PayrollRecord, PayrollRepository, Period, PeriodKind, ProgressiveTaxBracket, PtkpCategory,
    RepositoryError, StoredPayrollRecord, TerBracket, TerCategoryAssignment,
};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use tracing::{debug, info};

use crate::decimal::{get_decimal, get_optional_decimal};

const RECORD_COLUMNS: &str = "id, employee_id, period, revision, rate_table_version, gross_salary,
    taxable_income, ptkp_status, ter_category, ter_rate, pph21, pph21_adjustment,
    bpjs_employee_total, bpjs_company_total, total_deductions, net_salary, computed_at";

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .with_context(|| format!("Failed to connect to database: {}", database_url))?;
        Ok(Self { pool })
    }

    pub async fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Load and execute all SQL seed files from the specified directory.
    /// Files are executed in alphabetical order by filename.
    pub async fn run_seeds(
        &self,
        seeds_dir: &Path,
    ) -> Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(seeds_dir)
            .with_context(|| format!("Failed to read seeds directory '{}'", seeds_dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "sql"))
            .collect();

        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let sql = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read seed file '{}'", path.display()))?;

            sqlx::raw_sql(&sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to execute seed file '{}'", path.display()))?;
            debug!(file = %path.display(), "seed file applied");
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Reads the BPJS lines and reconciliation stored under a record row.
    async fn load_record(
        &self,
        row: &SqliteRow,
    ) -> Result<StoredPayrollRecord, RepositoryError> {
        let id: i64 = row.try_get("id").map_err(database)?;

        let bpjs_rows = sqlx::query(
            "SELECT program, base, employee_share, company_share
             FROM payroll_bpjs_contribution WHERE record_id = ?",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(database)?;

        let mut bpjs = bpjs_rows
            .iter()
            .map(|row| {
                Ok(BpjsContribution {
                    program: get_program(row)?,
                    base: get_decimal(row, "base")?,
                    employee_share: get_decimal(row, "employee_share")?,
                    company_share: get_decimal(row, "company_share")?,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;
        bpjs.sort_by_key(|c| c.program);

        let reconciliation = sqlx::query(
            "SELECT kind, annual_gross, occupational_expense, ptkp_allowance, taxable_income,
                    annual_tax, withheld_before, current_withholding, adjustment
             FROM payroll_reconciliation WHERE record_id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(database)?
        .map(|row| row_to_reconciliation(&row))
        .transpose()?;

        let record = PayrollRecord {
            employee_id: row.try_get("employee_id").map_err(database)?,
            period: get_period(row, "period")?,
            rate_table_version: row
                .try_get::<NaiveDate, _>("rate_table_version")
                .map_err(|e| {
                    RepositoryError::Database(format!("Failed to get rate_table_version: {}", e))
                })?,
            gross_salary: get_decimal(row, "gross_salary")?,
            taxable_income: get_decimal(row, "taxable_income")?,
            ptkp_status: row.try_get("ptkp_status").map_err(database)?,
            ter_category: row.try_get("ter_category").map_err(database)?,
            ter_rate: get_decimal(row, "ter_rate")?,
            pph21: get_decimal(row, "pph21")?,
            pph21_adjustment: get_decimal(row, "pph21_adjustment")?,
            reconciliation,
            bpjs,
            bpjs_employee_total: get_decimal(row, "bpjs_employee_total")?,
            bpjs_company_total: get_decimal(row, "bpjs_company_total")?,
            total_deductions: get_decimal(row, "total_deductions")?,
            net_salary: get_decimal(row, "net_salary")?,
            computed_at: row
                .try_get::<DateTime<Utc>, _>("computed_at")
                .map_err(|e| RepositoryError::Database(format!("Failed to get computed_at: {}", e)))?,
        };

        Ok(StoredPayrollRecord {
            revision: row.try_get("revision").map_err(database)?,
            record,
        })
    }
}

fn database(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(e.to_string())
}

fn get_period(
    row: &SqliteRow,
    column: &str,
) -> Result<Period, RepositoryError> {
    let text: String = row.try_get(column).map_err(database)?;
    text.parse()
        .map_err(|e| RepositoryError::Database(format!("Invalid period in '{}': {}", column, e)))
}

fn get_program(row: &SqliteRow) -> Result<BpjsProgram, RepositoryError> {
    let code: String = row.try_get("program").map_err(database)?;
    BpjsProgram::parse(&code)
        .ok_or_else(|| RepositoryError::Database(format!("Unsupported BPJS program '{}'", code)))
}

fn row_to_reconciliation(row: &SqliteRow) -> Result<AnnualReconciliation, RepositoryError> {
    let kind: String = row.try_get("kind").map_err(database)?;
    Ok(AnnualReconciliation {
        kind: PeriodKind::parse(&kind)
            .ok_or_else(|| RepositoryError::Database(format!("Unknown period kind '{}'", kind)))?,
        annual_gross: get_decimal(row, "annual_gross")?,
        occupational_expense: get_decimal(row, "occupational_expense")?,
        ptkp_allowance: get_decimal(row, "ptkp_allowance")?,
        taxable_income: get_decimal(row, "taxable_income")?,
        annual_tax: get_decimal(row, "annual_tax")?,
        withheld_before: get_decimal(row, "withheld_before")?,
        current_withholding: get_decimal(row, "current_withholding")?,
        adjustment: get_decimal(row, "adjustment")?,
    })
}

fn row_to_ptkp_category(row: &SqliteRow) -> Result<PtkpCategory, RepositoryError> {
    let status: String = row.try_get("marital_status").map_err(database)?;
    let dependents: i64 = row.try_get("dependents").map_err(database)?;
    Ok(PtkpCategory {
        code: row.try_get("code").map_err(database)?,
        marital_status: MaritalStatus::parse(&status).ok_or_else(|| {
            RepositoryError::Database(format!("Unknown marital status '{}'", status))
        })?,
        income_combined: row.try_get("income_combined").map_err(database)?,
        dependents: u8::try_from(dependents).map_err(|_| {
            RepositoryError::Database(format!("Dependents out of range: {}", dependents))
        })?,
        annual_allowance: get_decimal(row, "annual_allowance")?,
    })
}

fn optional_text(value: Option<rust_decimal::Decimal>) -> Option<String> {
    value.map(|v| v.to_string())
}

async fn insert_parts(
    tx: &mut Transaction<'_, Sqlite>,
    parts: &RateTableParts,
) -> Result<(), sqlx::Error> {
    let effective_from = parts.version.effective_from;
    let policy = &parts.policy;

    sqlx::query(
        "INSERT INTO rate_table_version
            (effective_from, label, occupational_expense_rate,
             occupational_expense_annual_cap, pkp_rounding_unit)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(effective_from)
    .bind(&parts.version.label)
    .bind(policy.occupational_expense_rate.to_string())
    .bind(policy.occupational_expense_annual_cap.to_string())
    .bind(policy.pkp_rounding_unit.to_string())
    .execute(&mut **tx)
    .await?;

    for category in &parts.ptkp_categories {
        sqlx::query(
            "INSERT INTO ptkp_category
                (effective_from, code, marital_status, income_combined, dependents, annual_allowance)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(effective_from)
        .bind(&category.code)
        .bind(category.marital_status.as_str())
        .bind(category.income_combined)
        .bind(i64::from(category.dependents))
        .bind(category.annual_allowance.to_string())
        .execute(&mut **tx)
        .await?;
    }

    for assignment in &parts.ter_assignments {
        sqlx::query(
            "INSERT INTO ter_category_assignment (effective_from, ptkp_code, category)
             VALUES (?, ?, ?)",
        )
        .bind(effective_from)
        .bind(&assignment.ptkp_code)
        .bind(&assignment.category)
        .execute(&mut **tx)
        .await?;
    }

    for bracket in &parts.ter_brackets {
        sqlx::query(
            "INSERT INTO ter_bracket
                (effective_from, category, min_monthly_income, max_monthly_income, rate)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(effective_from)
        .bind(&bracket.category)
        .bind(bracket.min_monthly_income.to_string())
        .bind(optional_text(bracket.max_monthly_income))
        .bind(bracket.rate.to_string())
        .execute(&mut **tx)
        .await?;
    }

    for bracket in &parts.progressive_brackets {
        sqlx::query(
            "INSERT INTO progressive_bracket
                (effective_from, min_annual_income, max_annual_income, rate)
             VALUES (?, ?, ?, ?)",
        )
        .bind(effective_from)
        .bind(bracket.min_annual_income.to_string())
        .bind(optional_text(bracket.max_annual_income))
        .bind(bracket.rate.to_string())
        .execute(&mut **tx)
        .await?;
    }

    for rate in &parts.bpjs_rates {
        sqlx::query(
            "INSERT INTO bpjs_program_rate
                (effective_from, program, employee_rate, company_rate, salary_cap)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(effective_from)
        .bind(rate.program.as_str())
        .bind(rate.employee_rate.to_string())
        .bind(rate.company_rate.to_string())
        .bind(optional_text(rate.salary_cap))
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// Inserts the next revision of a record. The revision is allocated by the
/// INSERT itself, so it must be the first statement of the transaction.
async fn insert_record(
    tx: &mut Transaction<'_, Sqlite>,
    record: &PayrollRecord,
) -> Result<(i64, i64), sqlx::Error> {
    let period = record.period.to_string();
    let row = sqlx::query(
        "INSERT INTO payroll_record
            (employee_id, period, revision, rate_table_version, gross_salary, taxable_income,
             ptkp_status, ter_category, ter_rate, pph21, pph21_adjustment,
             bpjs_employee_total, bpjs_company_total, total_deductions, net_salary, computed_at)
         VALUES (?, ?,
                 (SELECT COALESCE(MAX(revision), 0) + 1 FROM payroll_record
                  WHERE employee_id = ? AND period = ?),
                 ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING id, revision",
    )
    .bind(&record.employee_id)
    .bind(&period)
    .bind(&record.employee_id)
    .bind(&period)
    .bind(record.rate_table_version)
    .bind(record.gross_salary.to_string())
    .bind(record.taxable_income.to_string())
    .bind(&record.ptkp_status)
    .bind(&record.ter_category)
    .bind(record.ter_rate.to_string())
    .bind(record.pph21.to_string())
    .bind(record.pph21_adjustment.to_string())
    .bind(record.bpjs_employee_total.to_string())
    .bind(record.bpjs_company_total.to_string())
    .bind(record.total_deductions.to_string())
    .bind(record.net_salary.to_string())
    .bind(record.computed_at)
    .fetch_one(&mut **tx)
    .await?;
    let id: i64 = row.try_get("id")?;
    let revision: i64 = row.try_get("revision")?;

    for contribution in &record.bpjs {
        sqlx::query(
            "INSERT INTO payroll_bpjs_contribution
                (record_id, program, base, employee_share, company_share)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(contribution.program.as_str())
        .bind(contribution.base.to_string())
        .bind(contribution.employee_share.to_string())
        .bind(contribution.company_share.to_string())
        .execute(&mut **tx)
        .await?;
    }

    if let Some(recon) = &record.reconciliation {
        sqlx::query(
            "INSERT INTO payroll_reconciliation
                (record_id, kind, annual_gross, occupational_expense, ptkp_allowance,
                 taxable_income, annual_tax, withheld_before, current_withholding, adjustment)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(recon.kind.as_str())
        .bind(recon.annual_gross.to_string())
        .bind(recon.occupational_expense.to_string())
        .bind(recon.ptkp_allowance.to_string())
        .bind(recon.taxable_income.to_string())
        .bind(recon.annual_tax.to_string())
        .bind(recon.withheld_before.to_string())
        .bind(recon.current_withholding.to_string())
        .bind(recon.adjustment.to_string())
        .execute(&mut **tx)
        .await?;
    }

    Ok((id, revision))
}

#[async_trait]
impl PayrollRepository for SqliteRepository {
    async fn list_rate_table_versions(&self) -> Result<Vec<RateTableVersion>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT effective_from, label FROM rate_table_version ORDER BY effective_from",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(database)?;

        rows.iter()
            .map(|row| {
                Ok(RateTableVersion {
                    effective_from: row.try_get("effective_from").map_err(database)?,
                    label: row.try_get("label").map_err(database)?,
                })
            })
            .collect()
    }

    async fn get_rate_table(
        &self,
        effective_from: NaiveDate,
    ) -> Result<RateTableSnapshot, RepositoryError> {
        let row = sqlx::query(
            "SELECT effective_from, label, occupational_expense_rate,
                    occupational_expense_annual_cap, pkp_rounding_unit
             FROM rate_table_version WHERE effective_from = ?",
        )
        .bind(effective_from)
        .fetch_optional(&self.pool)
        .await
        .map_err(database)?
        .ok_or(RepositoryError::NotFound)?;

        let version = RateTableVersion {
            effective_from,
            label: row.try_get("label").map_err(database)?,
        };
        let policy = AnnualPolicy {
            occupational_expense_rate: get_decimal(&row, "occupational_expense_rate")?,
            occupational_expense_annual_cap: get_decimal(&row, "occupational_expense_annual_cap")?,
            pkp_rounding_unit: get_decimal(&row, "pkp_rounding_unit")?,
        };

        let ptkp_categories = sqlx::query(
            "SELECT code, marital_status, income_combined, dependents, annual_allowance
             FROM ptkp_category WHERE effective_from = ?
             ORDER BY income_combined, marital_status DESC, dependents",
        )
        .bind(effective_from)
        .fetch_all(&self.pool)
        .await
        .map_err(database)?
        .iter()
        .map(row_to_ptkp_category)
        .collect::<Result<Vec<_>, _>>()?;

        let ter_assignments = sqlx::query(
            "SELECT ptkp_code, category FROM ter_category_assignment
             WHERE effective_from = ? ORDER BY ptkp_code",
        )
        .bind(effective_from)
        .fetch_all(&self.pool)
        .await
        .map_err(database)?
        .iter()
        .map(|row| {
            Ok(TerCategoryAssignment {
                ptkp_code: row.try_get("ptkp_code").map_err(database)?,
                category: row.try_get("category").map_err(database)?,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

        let ter_brackets = sqlx::query(
            "SELECT category, min_monthly_income, max_monthly_income, rate
             FROM ter_bracket WHERE effective_from = ?",
        )
        .bind(effective_from)
        .fetch_all(&self.pool)
        .await
        .map_err(database)?
        .iter()
        .map(|row| {
            Ok(TerBracket {
                category: row.try_get("category").map_err(database)?,
                min_monthly_income: get_decimal(row, "min_monthly_income")?,
                max_monthly_income: get_optional_decimal(row, "max_monthly_income")?,
                rate: get_decimal(row, "rate")?,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

        let progressive_brackets = sqlx::query(
            "SELECT min_annual_income, max_annual_income, rate
             FROM progressive_bracket WHERE effective_from = ?",
        )
        .bind(effective_from)
        .fetch_all(&self.pool)
        .await
        .map_err(database)?
        .iter()
        .map(|row| {
            Ok(ProgressiveTaxBracket {
                min_annual_income: get_decimal(row, "min_annual_income")?,
                max_annual_income: get_optional_decimal(row, "max_annual_income")?,
                rate: get_decimal(row, "rate")?,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

        let bpjs_rates = sqlx::query(
            "SELECT program, employee_rate, company_rate, salary_cap
             FROM bpjs_program_rate WHERE effective_from = ?",
        )
        .bind(effective_from)
        .fetch_all(&self.pool)
        .await
        .map_err(database)?
        .iter()
        .map(|row| {
            Ok(BpjsProgramRate {
                program: get_program(row)?,
                employee_rate: get_decimal(row, "employee_rate")?,
                company_rate: get_decimal(row, "company_rate")?,
                salary_cap: get_optional_decimal(row, "salary_cap")?,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

        RateTableSnapshot::new(RateTableParts {
            version,
            ptkp_categories,
            ter_assignments,
            ter_brackets,
            progressive_brackets,
            bpjs_rates,
            policy,
        })
        .map_err(|e| {
            RepositoryError::Database(format!("Rate table {} is invalid: {}", effective_from, e))
        })
    }

    async fn save_rate_table(
        &self,
        parts: &RateTableParts,
    ) -> Result<(), RepositoryError> {
        let effective_from = parts.version.effective_from;
        let existing: Option<String> =
            sqlx::query_scalar("SELECT label FROM rate_table_version WHERE effective_from = ?")
                .bind(effective_from)
                .fetch_optional(&self.pool)
                .await
                .map_err(database)?;
        if let Some(label) = existing {
            return Err(RepositoryError::Database(format!(
                "Rate table version {} ('{}') already exists",
                effective_from, label
            )));
        }

        let mut tx = self.pool.begin().await.map_err(database)?;
        insert_parts(&mut tx, parts).await.map_err(database)?;
        tx.commit().await.map_err(database)?;

        info!(%effective_from, label = %parts.version.label, "rate table version saved");
        Ok(())
    }

    async fn save_payroll_record(
        &self,
        record: &PayrollRecord,
    ) -> Result<StoredPayrollRecord, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(database)?;
        let (id, revision) = insert_record(&mut tx, record).await.map_err(database)?;
        tx.commit().await.map_err(database)?;

        debug!(
            id,
            employee_id = %record.employee_id,
            period = %record.period,
            revision,
            "payroll record saved"
        );
        Ok(StoredPayrollRecord {
            revision,
            record: record.clone(),
        })
    }

    async fn get_payroll_record(
        &self,
        employee_id: &str,
        period: Period,
    ) -> Result<StoredPayrollRecord, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM payroll_record
             WHERE employee_id = ? AND period = ?
             ORDER BY revision DESC LIMIT 1"
        ))
        .bind(employee_id)
        .bind(period.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(database)?
        .ok_or(RepositoryError::NotFound)?;

        self.load_record(&row).await
    }

    async fn list_payroll_records(
        &self,
        employee_id: &str,
        fiscal_year: i32,
    ) -> Result<Vec<StoredPayrollRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM payroll_record r
             WHERE r.employee_id = ? AND r.period BETWEEN ? AND ?
               AND r.revision = (SELECT MAX(revision) FROM payroll_record
                                 WHERE employee_id = r.employee_id AND period = r.period)
             ORDER BY r.period"
        ))
        .bind(employee_id)
        .bind(format!("{:04}-01", fiscal_year))
        .bind(format!("{:04}-12", fiscal_year))
        .fetch_all(&self.pool)
        .await
        .map_err(database)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(self.load_record(row).await?);
        }
        Ok(records)
    }
}
