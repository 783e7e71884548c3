mod annual_history;
mod bpjs_program;
mod employee;
mod payroll_record;
mod period;
mod progressive_bracket;
mod ptkp_category;
mod ter_bracket;

pub use annual_history::{AnnualHistory, PriorEmployment, WithholdingEntry};
pub use bpjs_program::{BpjsProgram, BpjsProgramRate};
pub use employee::{EmployeeTaxProfile, GrossSalary, SalaryComponent};
pub use payroll_record::{
    AnnualReconciliation, BpjsContribution, PayrollRecord, PeriodKind, StoredPayrollRecord,
};
pub use period::{Period, PeriodError};
pub use progressive_bracket::ProgressiveTaxBracket;
pub use ptkp_category::{MAX_DEPENDENTS, MaritalStatus, PtkpCategory, PtkpSchedule};
pub use ter_bracket::{TerBracket, TerCategoryAssignment};
