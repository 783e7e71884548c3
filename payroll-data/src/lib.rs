//! Rate-table import from CSV.

pub mod loader;

pub use loader::{RateTableLoader, RateTableLoaderError};
