use std::path::Path;

use super::{csv_file, LoadReport, StorageError};
use crate::models::{is_valid_crm, Doctor};

pub const HEADER: [&str; 2] = ["Name", "CRM"];

pub fn load(path: &Path) -> LoadReport<Doctor> {
    csv_file::load_with(path, "doctors", |fields| match fields {
        [name, code] if is_valid_crm(code) => Ok(Doctor::new(code.as_str(), name.as_str())),
        [_, code] => Err(format!("invalid doctor code '{code}'")),
        _ => Err(format!("expected 2 columns, found {}", fields.len())),
    })
}

pub fn rewrite(path: &Path, doctors: &[Doctor]) -> Result<(), StorageError> {
    let rows = doctors.iter().map(|d| [d.name.as_str(), d.code.as_str()]);
    let count = csv_file::rewrite(path, &HEADER, rows)?;
    tracing::info!(path = %path.display(), count, "Doctors saved");
    Ok(())
}

pub fn append(path: &Path, doctor: &Doctor) -> Result<(), StorageError> {
    csv_file::append(path, &HEADER, [doctor.name.as_str(), doctor.code.as_str()])
}
