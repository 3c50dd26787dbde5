use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static CPF_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{11}$").unwrap());

/// Exactly 11 ASCII digits.
pub fn is_valid_cpf(cpf: &str) -> bool {
    CPF_PATTERN.is_match(cpf)
}

/// `12345678901` → `123.456.789-01`. Anything that is not a valid CPF is
/// returned as-is.
pub fn format_cpf(cpf: &str) -> String {
    if !is_valid_cpf(cpf) {
        return cpf.to_string();
    }
    format!("{}.{}.{}-{}", &cpf[0..3], &cpf[3..6], &cpf[6..9], &cpf[9..])
}

/// A patient identity. Appointments are not cached here; use
/// `Clinic::appointments_for` for the per-patient view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub cpf: String,
    pub name: String,
}

impl Patient {
    pub fn new(cpf: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            cpf: cpf.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for Patient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Patient: {} (CPF: {})", self.name, format_cpf(&self.cpf))
    }
}
