use std::path::PathBuf;

use async_trait::async_trait;
use payroll_core::db::{DbConfig, PayrollRepository, RepositoryError, RepositoryFactory};
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

use crate::repository::SqliteRepository;

/// Resolve the seeds directory at runtime so it works both from the build
/// tree and from an installed binary.
///
/// Resolution order:
/// 1. **`PAYROLL_DB_SQLITE_SEEDS_DIR`** if set.
/// 2. **`./seeds`** if the directory exists in the current working directory.
/// 3. **`$CARGO_MANIFEST_DIR/seeds`** as a last resort.
pub fn seeds_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PAYROLL_DB_SQLITE_SEEDS_DIR") {
        return PathBuf::from(dir);
    }
    let cwd_seeds = PathBuf::from("./seeds");
    if cwd_seeds.is_dir() {
        return cwd_seeds;
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("seeds")
}

/// Maps a connection string to a sqlx URL. Bare paths are opened read-write
/// and created when missing.
fn database_url(connection_string: &str) -> String {
    if connection_string.starts_with("sqlite:") {
        connection_string.to_string()
    } else {
        format!("sqlite:{}?mode=rwc", connection_string)
    }
}

/// [`RepositoryFactory`] for SQLite.
///
/// Register this with a [`payroll_core::db::RepositoryRegistry`] to make the
/// `"sqlite"` backend available:
///
/// ```rust,no_run
/// use payroll_core::db::RepositoryRegistry;
/// use payroll_db_sqlite::SqliteRepositoryFactory;
///
/// let mut registry = RepositoryRegistry::new();
/// registry.register(Box::new(SqliteRepositoryFactory));
/// ```
pub struct SqliteRepositoryFactory;

#[async_trait]
impl RepositoryFactory for SqliteRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    /// Open the database described by `config.connection_string`, apply
    /// migrations and load the seeded rate tables.
    ///
    /// Accepted connection-string values:
    /// * A bare file path such as `"payroll.db"`. The file is created if it
    ///   does not exist.
    /// * A sqlx URL starting with `sqlite:`.
    /// * `":memory:"` for an ephemeral database. Every pooled connection to
    ///   an in-memory database is a separate database, so the pool is
    ///   limited to a single connection.
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn PayrollRepository>, RepositoryError> {
        let repo = if config.connection_string == ":memory:" {
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await
                .map_err(|e| RepositoryError::Connection(e.to_string()))?;
            SqliteRepository::new_with_pool(pool).await
        } else {
            SqliteRepository::new(&database_url(&config.connection_string))
                .await
                .map_err(|e| RepositoryError::Connection(format!("{:#}", e)))?
        };
        repo.run_migrations()
            .await
            .map_err(|e| RepositoryError::Database(format!("{:#}", e)))?;

        let seeds = seeds_dir();
        repo.run_seeds(&seeds)
            .await
            .map_err(|e| RepositoryError::Database(format!("{:#}", e)))?;

        info!(
            connection = %config.connection_string,
            seeds = %seeds.display(),
            "sqlite repository ready"
        );
        Ok(Box::new(repo))
    }
}
