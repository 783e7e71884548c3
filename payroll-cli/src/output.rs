//! Plain-text and JSON rendering of command results.

use anyhow::{Context, Result};
use payroll_core::rate_table::RateTableVersion;
use payroll_core::{BatchReport, PayrollRecord, StoredPayrollRecord};
use rust_decimal::Decimal;
use serde::Serialize;

pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("failed to serialize output")
}

fn percent(rate: Decimal) -> String {
    format!("{}%", (rate * Decimal::ONE_HUNDRED).normalize())
}

pub fn versions_table(versions: &[RateTableVersion]) -> String {
    if versions.is_empty() {
        return "No rate table versions stored.".to_string();
    }
    let mut lines = vec![format!("{:<12} {}", "EFFECTIVE", "LABEL")];
    lines.extend(
        versions
            .iter()
            .map(|v| format!("{:<12} {}", v.effective_from.to_string(), v.label)),
    );
    lines.join("\n")
}

/// Payslip-style breakdown of one record.
pub fn record_detail(record: &PayrollRecord) -> String {
    let mut lines = vec![
        format!("Employee            {}", record.employee_id),
        format!("Period              {}", record.period),
        format!("Rate tables         {}", record.rate_table_version),
        format!("PTKP status         {}", record.ptkp_status),
        format!(
            "TER                 {} at {}",
            record.ter_category,
            percent(record.ter_rate)
        ),
        format!("Gross salary        {:>15}", record.gross_salary),
        format!("Taxable income YTD  {:>15}", record.taxable_income),
        format!("PPh 21 (TER)        {:>15}", record.pph21),
    ];
    if let Some(recon) = &record.reconciliation {
        lines.push(format!("  annual gross      {:>15}", recon.annual_gross));
        lines.push(format!("  occupational exp. {:>15}", recon.occupational_expense));
        lines.push(format!("  PTKP              {:>15}", recon.ptkp_allowance));
        lines.push(format!("  PKP               {:>15}", recon.taxable_income));
        lines.push(format!("  annual tax        {:>15}", recon.annual_tax));
        lines.push(format!("  withheld before   {:>15}", recon.withheld_before));
        lines.push(format!("PPh 21 adjustment   {:>15}", record.pph21_adjustment));
    }
    for c in &record.bpjs {
        lines.push(format!(
            "BPJS {:<10}     {:>15}  (company {})",
            c.program.as_str(),
            c.employee_share,
            c.company_share
        ));
    }
    lines.push(format!("BPJS employee total {:>15}", record.bpjs_employee_total));
    lines.push(format!("BPJS company total  {:>15}", record.bpjs_company_total));
    lines.push(format!("Total deductions    {:>15}", record.total_deductions));
    lines.push(format!("Net salary          {:>15}", record.net_salary));
    lines.join("\n")
}

fn record_row(stored: &StoredPayrollRecord) -> String {
    let r = &stored.record;
    format!(
        "{:<7} {:<10} {:>3} {:>14} {:>12} {:>12} {:>12} {:>14}",
        r.period.to_string(),
        r.employee_id,
        stored.revision,
        r.gross_salary,
        r.pph21,
        r.pph21_adjustment,
        r.bpjs_employee_total,
        r.net_salary
    )
}

fn record_header() -> String {
    format!(
        "{:<7} {:<10} {:>3} {:>14} {:>12} {:>12} {:>12} {:>14}",
        "PERIOD", "EMPLOYEE", "REV", "GROSS", "PPH21", "ADJUSTMENT", "BPJS", "NET"
    )
}

pub fn records_table(records: &[StoredPayrollRecord]) -> String {
    if records.is_empty() {
        return "No payroll records found.".to_string();
    }
    let mut lines = vec![record_header()];
    lines.extend(records.iter().map(record_row));
    lines.join("\n")
}

pub fn batch_report(report: &BatchReport) -> String {
    let mut lines = vec![format!(
        "Period {} (rate tables {}): {} saved, {} failed, {} skipped",
        report.period,
        report.rate_table_version,
        report.records.len(),
        report.failures.len(),
        report.skipped.len()
    )];
    if !report.records.is_empty() {
        lines.push(record_header());
        lines.extend(report.records.iter().map(record_row));
    }
    if !report.failures.is_empty() {
        lines.push("Failures:".to_string());
        lines.extend(
            report
                .failures
                .iter()
                .map(|f| format!("  {:<10} [{:?}] {}", f.employee_id, f.kind, f.reason)),
        );
    }
    if !report.skipped.is_empty() {
        lines.push(format!("Skipped after cancellation: {}", report.skipped.join(", ")));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn percent_drops_trailing_zeros() {
        assert_eq!(percent(dec!(0.0025)), "0.25%");
        assert_eq!(percent(dec!(0.05)), "5%");
        assert_eq!(percent(dec!(0)), "0%");
    }

    #[test]
    fn versions_table_lists_each_version() {
        let versions = vec![RateTableVersion {
            effective_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            label: "PP 58/2023".to_string(),
        }];

        assert_eq!(
            versions_table(&versions),
            "EFFECTIVE    LABEL\n2024-01-01   PP 58/2023"
        );
    }

    #[test]
    fn empty_tables_say_so() {
        assert_eq!(versions_table(&[]), "No rate table versions stored.");
        assert_eq!(records_table(&[]), "No payroll records found.");
    }
}
