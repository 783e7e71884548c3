use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use payroll_data::RateTableLoader;
use payroll_db_sqlite::SqliteRepository;

/// Load one rate-table version from a directory of CSV files into the
/// database.
///
/// The directory must contain:
/// - version.csv: effective_from, label and the annual policy columns
/// - ptkp.csv: PTKP categories and allowances
/// - ter_categories.csv: PTKP code to TER category (A, B, C)
/// - ter_brackets.csv: monthly TER bands per category
/// - progressive.csv: annual progressive brackets
/// - bpjs.csv: BPJS program rates and salary caps
#[derive(Parser, Debug)]
#[command(name = "payroll-rates-loader")]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory holding the CSV files of one version
    #[arg(short = 'i', long)]
    dir: PathBuf,

    /// SQLite database URL (e.g., sqlite:payroll.db?mode=rwc to create if missing)
    #[arg(short, long, default_value = "sqlite:payroll.db?mode=rwc")]
    database: String,

    /// Run database migrations before loading data
    #[arg(short, long, default_value_t = false)]
    migrate: bool,

    /// Run seed files from the specified directory after migrations
    #[arg(short, long)]
    seeds: Option<PathBuf>,

    /// Validate the tables and stop without writing anything
    #[arg(long, default_value_t = false)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    println!("Reading rate tables from: {}", args.dir.display());
    let parts = RateTableLoader::read_dir(&args.dir)
        .with_context(|| format!("Failed to read rate tables from: {}", args.dir.display()))?;
    let snapshot = RateTableLoader::validate(&parts)
        .with_context(|| format!("Rate tables in {} are invalid", args.dir.display()))?;

    println!(
        "Version {} ('{}'): {} PTKP categories, {} TER brackets, {} progressive brackets, {} BPJS programs",
        snapshot.effective_from(),
        snapshot.version().label,
        parts.ptkp_categories.len(),
        parts.ter_brackets.len(),
        parts.progressive_brackets.len(),
        parts.bpjs_rates.len(),
    );

    if args.check {
        println!("Check only; nothing written.");
        return Ok(());
    }

    let repo = SqliteRepository::new(&args.database)
        .await
        .with_context(|| format!("Failed to connect to database: {}", args.database))?;

    if args.migrate {
        println!("Running migrations...");
        repo.run_migrations()
            .await
            .context("Failed to run migrations")?;
        println!("Migrations complete.");
    }

    if let Some(seeds_dir) = &args.seeds {
        println!("Running seeds from: {}", seeds_dir.display());
        repo.run_seeds(seeds_dir)
            .await
            .with_context(|| format!("Failed to run seeds from: {}", seeds_dir.display()))?;
        println!("Seeds complete.");
    }

    let version = RateTableLoader::load(&repo, &parts)
        .await
        .context("Failed to load rate tables into database")?;

    println!(
        "Successfully loaded rate table version {} ('{}').",
        version.effective_from, version.label
    );

    Ok(())
}
