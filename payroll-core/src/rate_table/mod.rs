//! Versioned rate tables and the store that selects them by date.

pub mod snapshot;
pub mod store;

pub use snapshot::{
    AnnualPolicy, RateTableError, RateTableParts, RateTableSnapshot, RateTableVersion,
};
pub use store::RateTableStore;
