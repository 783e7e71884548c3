use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tax identity of an employee, owned by HR master data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeTaxProfile {
    pub employee_id: String,
    /// PTKP status at the start of the fiscal year, e.g. `K/1`.
    pub ptkp_code: String,
    pub npwp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryComponent {
    pub name: String,
    pub amount: Decimal,
}

/// Gross monthly pay: basic salary plus fixed allowances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrossSalary {
    pub basic_salary: Decimal,
    pub allowances: Vec<SalaryComponent>,
}

impl GrossSalary {
    pub fn basic(amount: Decimal) -> Self {
        Self {
            basic_salary: amount,
            allowances: Vec::new(),
        }
    }

    pub fn with_allowance(
        mut self,
        name: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        self.allowances.push(SalaryComponent {
            name: name.into(),
            amount,
        });
        self
    }

    pub fn total(&self) -> Decimal {
        self.basic_salary + self.allowances.iter().map(|a| a.amount).sum::<Decimal>()
    }
}
