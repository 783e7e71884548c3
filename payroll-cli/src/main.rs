use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use payroll_cli::{app, csv_loader, logging, output};
use payroll_core::{CancellationFlag, EmployeeTaxProfile, GrossSalary, Period};

// ─── CLI definition ──────────────────────────────────────────────────────────

/// Indonesian payroll calculator: PPh 21 (TER and annual reconciliation)
/// and BPJS contributions against versioned rate tables.
#[derive(Debug, Parser)]
#[command(name = "payroll", version, about)]
struct Cli {
    /// TOML configuration file. Defaults to `payroll.toml` when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database connection string, overriding the configuration.
    /// For SQLite this is a file path (e.g. `payroll.db`) or `:memory:`.
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List stored rate table versions.
    Versions {
        #[arg(long)]
        json: bool,
    },

    /// Preview the monthly payroll of one employee. Nothing is stored.
    Compute {
        /// Payroll month, `YYYY-MM`.
        #[arg(long)]
        period: Period,

        #[arg(long)]
        employee: String,

        /// PTKP status, e.g. `TK/0` or `K/I/2`.
        #[arg(long)]
        ptkp: String,

        /// Monthly basic salary.
        #[arg(long)]
        gross: Decimal,

        /// Fixed monthly allowances on top of the basic salary.
        #[arg(long)]
        allowance: Option<Decimal>,

        #[arg(long)]
        npwp: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Recompute and store one period for every employee in a CSV file.
    Recalculate {
        /// Payroll month, `YYYY-MM`.
        #[arg(long)]
        period: Period,

        /// Employee CSV (see the `csv_loader` module for the columns).
        #[arg(long)]
        employees: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Show the latest stored record of each month of a fiscal year.
    Records {
        #[arg(long)]
        employee: String,

        #[arg(long)]
        year: i32,

        #[arg(long)]
        json: bool,
    },
}

// ─── entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = app::load_config(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database.connection_string = db;
    }
    logging::init_logging(&config.logging)?;
    debug!(?config, "configuration loaded");

    let session = app::Session::open(config).await?;

    match cli.command {
        Command::Versions { json } => {
            let versions = session.versions().await?;
            if json {
                println!("{}", output::to_json(&versions)?);
            } else {
                println!("{}", output::versions_table(&versions));
            }
        }

        Command::Compute {
            period,
            employee,
            ptkp,
            gross,
            allowance,
            npwp,
            json,
        } => {
            let profile = EmployeeTaxProfile {
                employee_id: employee,
                ptkp_code: ptkp,
                npwp,
            };
            let mut salary = GrossSalary::basic(gross);
            if let Some(amount) = allowance {
                salary = salary.with_allowance("allowances", amount);
            }

            let record = session.compute(&profile, period, &salary)?;
            if json {
                println!("{}", output::to_json(&record)?);
            } else {
                println!("{}", output::record_detail(&record));
            }
        }

        Command::Recalculate {
            period,
            employees,
            json,
        } => {
            let inputs = csv_loader::load_from_file(&employees)
                .with_context(|| format!("Failed to load employees from '{}'", employees.display()))?;

            let cancel = CancellationFlag::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupted; finishing employees already started");
                    on_interrupt.cancel();
                }
            });

            let report = session.recalculate(period, inputs, &cancel).await?;
            if json {
                println!("{}", output::to_json(&report)?);
            } else {
                println!("{}", output::batch_report(&report));
            }
            if !report.is_clean() {
                return Ok(ExitCode::FAILURE);
            }
        }

        Command::Records {
            employee,
            year,
            json,
        } => {
            let records = session.records(&employee, year).await?;
            if json {
                println!("{}", output::to_json(&records)?);
            } else {
                println!("{}", output::records_table(&records));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
