use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Suffix appended to a doctor's name to mark the record as removed.
pub const REMOVED_MARKER: &str = " (Removed)";

static CRM_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());

/// CRM codes are opaque strings; the only shape rule is "digits only".
pub fn is_valid_crm(crm: &str) -> bool {
    CRM_PATTERN.is_match(crm)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub code: String,
    pub name: String,
}

impl Doctor {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }

    pub fn is_removed(&self) -> bool {
        self.name.ends_with(REMOVED_MARKER)
    }

    /// Idempotent.
    pub fn mark_removed(&mut self) {
        if !self.is_removed() {
            self.name.push_str(REMOVED_MARKER);
        }
    }

    /// Returns false when the doctor was not marked as removed.
    pub fn reintegrate(&mut self) -> bool {
        if !self.is_removed() {
            return false;
        }
        let kept = self.display_name().trim_end().len();
        self.name.truncate(kept);
        true
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Name without the removal marker, for display next to appointments.
    pub fn display_name(&self) -> &str {
        self.name
            .strip_suffix(REMOVED_MARKER)
            .unwrap_or(&self.name)
    }
}
