use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The five BPJS social-security programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BpjsProgram {
    /// Health insurance (BPJS Kesehatan).
    Kesehatan,
    /// Work accident insurance (Jaminan Kecelakaan Kerja).
    Jkk,
    /// Death insurance (Jaminan Kematian).
    Jkm,
    /// Old-age savings (Jaminan Hari Tua).
    Jht,
    /// Pension (Jaminan Pensiun).
    Jp,
}

impl BpjsProgram {
    pub const ALL: [BpjsProgram; 5] = [
        BpjsProgram::Kesehatan,
        BpjsProgram::Jkk,
        BpjsProgram::Jkm,
        BpjsProgram::Jht,
        BpjsProgram::Jp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kesehatan => "KESEHATAN",
            Self::Jkk => "JKK",
            Self::Jkm => "JKM",
            Self::Jht => "JHT",
            Self::Jp => "JP",
        }
    }

    /// Case-insensitive lookup of a stored program code.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "KESEHATAN" => Some(Self::Kesehatan),
            "JKK" => Some(Self::Jkk),
            "JKM" => Some(Self::Jkm),
            "JHT" => Some(Self::Jht),
            "JP" => Some(Self::Jp),
            _ => None,
        }
    }
}

impl fmt::Display for BpjsProgram {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BpjsProgramRate {
    pub program: BpjsProgram,
    pub employee_rate: Decimal,
    pub company_rate: Decimal,
    /// Monthly wage ceiling for the contribution base; `None` is uncapped.
    pub salary_cap: Option<Decimal>,
}

impl BpjsProgramRate {
    pub fn contribution_base(
        &self,
        gross_salary: Decimal,
    ) -> Decimal {
        match self.salary_cap {
            Some(cap) => gross_salary.min(cap),
            None => gross_salary,
        }
    }
}
