pub mod bpjs;
pub mod common;
pub mod ledger;
pub mod payroll;
pub mod pph21;
pub mod ptkp;
pub mod ter;

pub use bpjs::{BpjsBreakdown, BpjsCalculator, BpjsError};
pub use ledger::{LedgerError, Pph21Ledger, WithholdingPhase};
pub use payroll::{PayrollCalculator, PayrollEngine, PayrollError, validate_input};
pub use pph21::{Pph21Calculator, Pph21Error, monthly_withholding};
pub use ptkp::{PtkpError, PtkpResolver};
pub use ter::{TerError, TerRate, TerRateLocator};
