//! Indonesian payroll tax and contribution engine.
//!
//! Computes PTKP categories, TER monthly PPh 21 withholding, the annual
//! progressive reconciliation and BPJS contributions against versioned,
//! immutable rate tables.

pub mod batch;
pub mod calculations;
pub mod config;
pub mod db;
pub mod models;
pub mod rate_table;

pub use batch::{BatchError, BatchInput, BatchReport, CancellationFlag, recalculate_all};
pub use calculations::{PayrollEngine, PayrollError};
pub use config::EngineConfig;
pub use db::repository::{PayrollRepository, RepositoryError};
pub use models::*;
pub use rate_table::{RateTableSnapshot, RateTableStore};

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::db::{PayrollRepository, RepositoryError};
    use crate::models::{
        BpjsProgram, BpjsProgramRate, PayrollRecord, Period, ProgressiveTaxBracket, PtkpSchedule,
        StoredPayrollRecord, TerBracket, TerCategoryAssignment,
    };
    use crate::rate_table::{
        AnnualPolicy, RateTableParts, RateTableSnapshot, RateTableStore, RateTableVersion,
    };

    pub fn date(
        year: i32,
        month: u32,
        day: u32,
    ) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn ladder(
        category: &str,
        steps: &[(Decimal, Decimal)],
    ) -> Vec<TerBracket> {
        steps
            .iter()
            .enumerate()
            .map(|(i, &(min, rate))| TerBracket {
                category: category.to_string(),
                min_monthly_income: min,
                max_monthly_income: steps.get(i + 1).map(|&(next, _)| next),
                rate,
            })
            .collect()
    }

    /// A reduced but valid 2024 table: official PTKP and progressive
    /// schedules, BPJS rates, and short TER ladders.
    pub fn sample_parts() -> RateTableParts {
        let schedule = PtkpSchedule {
            base_allowance: dec!(54000000),
            married_increment: dec!(4500000),
            dependent_increment: dec!(4500000),
            combined_income_increment: dec!(54000000),
        };

        let ter_assignments = [
            ("TK/0", "A"),
            ("TK/1", "A"),
            ("K/0", "A"),
            ("K/I/0", "A"),
            ("TK/2", "B"),
            ("TK/3", "B"),
            ("K/1", "B"),
            ("K/2", "B"),
            ("K/I/1", "B"),
            ("K/I/2", "B"),
            ("K/3", "C"),
            ("K/I/3", "C"),
        ]
        .into_iter()
        .map(|(code, category)| TerCategoryAssignment {
            ptkp_code: code.to_string(),
            category: category.to_string(),
        })
        .collect();

        let mut ter_brackets = ladder(
            "A",
            &[
                (dec!(0), dec!(0)),
                (dec!(5400001), dec!(0.02)),
                (dec!(7000001), dec!(0.05)),
                (dec!(10000001), dec!(0.10)),
                (dec!(20000001), dec!(0.20)),
            ],
        );
        ter_brackets.extend(ladder(
            "B",
            &[
                (dec!(0), dec!(0)),
                (dec!(6200001), dec!(0.03)),
                (dec!(10000001), dec!(0.12)),
            ],
        ));
        ter_brackets.extend(ladder(
            "C",
            &[
                (dec!(0), dec!(0)),
                (dec!(6600001), dec!(0.025)),
                (dec!(12000001), dec!(0.11)),
            ],
        ));

        let progressive_brackets = [
            (dec!(0), Some(dec!(60000000)), dec!(0.05)),
            (dec!(60000000), Some(dec!(250000000)), dec!(0.15)),
            (dec!(250000000), Some(dec!(500000000)), dec!(0.25)),
            (dec!(500000000), Some(dec!(5000000000)), dec!(0.30)),
            (dec!(5000000000), None, dec!(0.35)),
        ]
        .into_iter()
        .map(|(min, max, rate)| ProgressiveTaxBracket {
            min_annual_income: min,
            max_annual_income: max,
            rate,
        })
        .collect();

        let bpjs_rates = [
            (BpjsProgram::Kesehatan, dec!(0.01), dec!(0.04), Some(dec!(12000000))),
            (BpjsProgram::Jkk, dec!(0), dec!(0.0024), None),
            (BpjsProgram::Jkm, dec!(0), dec!(0.003), None),
            (BpjsProgram::Jht, dec!(0.02), dec!(0.037), None),
            (BpjsProgram::Jp, dec!(0.01), dec!(0.02), Some(dec!(10042300))),
        ]
        .into_iter()
        .map(|(program, employee_rate, company_rate, salary_cap)| BpjsProgramRate {
            program,
            employee_rate,
            company_rate,
            salary_cap,
        })
        .collect();

        RateTableParts {
            version: RateTableVersion {
                effective_from: date(2024, 1, 1),
                label: "PP 58/2023 sample".to_string(),
            },
            ptkp_categories: schedule.categories(),
            ter_assignments,
            ter_brackets,
            progressive_brackets,
            bpjs_rates,
            policy: AnnualPolicy::default(),
        }
    }

    pub fn sample_snapshot() -> RateTableSnapshot {
        RateTableSnapshot::new(sample_parts()).unwrap()
    }

    pub fn sample_store() -> RateTableStore {
        let mut store = RateTableStore::new();
        store.insert(sample_snapshot()).unwrap();
        store
    }

    /// A monthly record with only the fields the ledger reads filled in.
    pub fn record_for(
        employee_id: &str,
        period: Period,
        gross_salary: Decimal,
        pph21: Decimal,
    ) -> PayrollRecord {
        PayrollRecord {
            employee_id: employee_id.to_string(),
            period,
            rate_table_version: date(2024, 1, 1),
            gross_salary,
            taxable_income: Decimal::ZERO,
            ptkp_status: "TK/0".to_string(),
            ter_category: "A".to_string(),
            ter_rate: Decimal::ZERO,
            pph21,
            pph21_adjustment: Decimal::ZERO,
            reconciliation: None,
            bpjs: Vec::new(),
            bpjs_employee_total: Decimal::ZERO,
            bpjs_company_total: Decimal::ZERO,
            total_deductions: pph21,
            net_salary: gross_salary - pph21,
            computed_at: Utc::now(),
        }
    }

    /// Revisioned in-memory repository for tests.
    #[derive(Default)]
    pub struct MemoryRepository {
        tables: Mutex<BTreeMap<NaiveDate, RateTableParts>>,
        records: Mutex<BTreeMap<(String, Period), Vec<PayrollRecord>>>,
    }

    impl MemoryRepository {
        pub fn record_count(&self) -> usize {
            self.records.lock().unwrap().values().map(Vec::len).sum()
        }
    }

    #[async_trait]
    impl PayrollRepository for MemoryRepository {
        async fn list_rate_table_versions(&self) -> Result<Vec<RateTableVersion>, RepositoryError> {
            Ok(self
                .tables
                .lock()
                .unwrap()
                .values()
                .map(|p| p.version.clone())
                .collect())
        }

        async fn get_rate_table(
            &self,
            effective_from: NaiveDate,
        ) -> Result<RateTableSnapshot, RepositoryError> {
            let parts = self
                .tables
                .lock()
                .unwrap()
                .get(&effective_from)
                .cloned()
                .ok_or(RepositoryError::NotFound)?;
            RateTableSnapshot::new(parts).map_err(|e| RepositoryError::Database(e.to_string()))
        }

        async fn save_rate_table(
            &self,
            parts: &RateTableParts,
        ) -> Result<(), RepositoryError> {
            self.tables
                .lock()
                .unwrap()
                .insert(parts.version.effective_from, parts.clone());
            Ok(())
        }

        async fn save_payroll_record(
            &self,
            record: &PayrollRecord,
        ) -> Result<StoredPayrollRecord, RepositoryError> {
            let mut records = self.records.lock().unwrap();
            let revisions = records
                .entry((record.employee_id.clone(), record.period))
                .or_default();
            revisions.push(record.clone());
            Ok(StoredPayrollRecord {
                revision: revisions.len() as i64,
                record: record.clone(),
            })
        }

        async fn get_payroll_record(
            &self,
            employee_id: &str,
            period: Period,
        ) -> Result<StoredPayrollRecord, RepositoryError> {
            let records = self.records.lock().unwrap();
            let revisions = records
                .get(&(employee_id.to_string(), period))
                .ok_or(RepositoryError::NotFound)?;
            let record = revisions.last().cloned().ok_or(RepositoryError::NotFound)?;
            Ok(StoredPayrollRecord {
                revision: revisions.len() as i64,
                record,
            })
        }

        async fn list_payroll_records(
            &self,
            employee_id: &str,
            fiscal_year: i32,
        ) -> Result<Vec<StoredPayrollRecord>, RepositoryError> {
            let records = self.records.lock().unwrap();
            Ok(records
                .iter()
                .filter(|((id, period), _)| id.as_str() == employee_id && period.year() == fiscal_year)
                .filter_map(|(_, revisions)| {
                    revisions.last().map(|record| StoredPayrollRecord {
                        revision: revisions.len() as i64,
                        record: record.clone(),
                    })
                })
                .collect())
        }
    }
}
