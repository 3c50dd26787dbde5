use std::path::Path;

use super::{csv_file, LoadReport, StorageError};
use crate::models::Patient;

pub const HEADER: [&str; 2] = ["Name", "CPF"];

/// CPFs are validated where they are entered, not here.
pub fn load(path: &Path) -> LoadReport<Patient> {
    csv_file::load_with(path, "patients", |fields| match fields {
        [_, cpf] if cpf.is_empty() => Err("missing CPF".to_string()),
        [name, cpf] => Ok(Patient::new(cpf.as_str(), name.as_str())),
        _ => Err(format!("expected 2 columns, found {}", fields.len())),
    })
}

pub fn rewrite(path: &Path, patients: &[Patient]) -> Result<(), StorageError> {
    let rows = patients.iter().map(|p| [p.name.as_str(), p.cpf.as_str()]);
    let count = csv_file::rewrite(path, &HEADER, rows)?;
    tracing::info!(path = %path.display(), count, "Patients saved");
    Ok(())
}

pub fn append(path: &Path, patient: &Patient) -> Result<(), StorageError> {
    csv_file::append(path, &HEADER, [patient.name.as_str(), patient.cpf.as_str()])
}
