use std::path::Path;

use chrono::NaiveDateTime;

use super::{csv_file, LoadReport, StorageError};
use crate::models::{
    is_valid_cpf, is_valid_crm, parse_date, parse_time, Appointment, AppointmentStatus,
};

pub const HEADER: [&str; 5] = ["Date", "Time", "PatientCPF", "DoctorCode", "Status"];

/// Loads `Date,Time,PatientCPF,DoctorCode,Status` records.
///
/// Files written before the status column existed have four columns; their
/// status is derived from `now` the same way a freshly built appointment
/// is classified.
pub fn load(path: &Path, now: NaiveDateTime) -> LoadReport<Appointment> {
    csv_file::load_with(path, "appointments", |fields| parse_fields(fields, now))
}

fn parse_fields(fields: &[String], now: NaiveDateTime) -> Result<Appointment, String> {
    if fields.len() != 4 && fields.len() != 5 {
        return Err(format!("expected 5 columns, found {}", fields.len()));
    }

    let cpf = &fields[2];
    let crm = &fields[3];
    if !is_valid_cpf(cpf) {
        return Err(format!("invalid patient CPF '{cpf}'"));
    }
    if !is_valid_crm(crm) {
        return Err(format!("invalid doctor code '{crm}'"));
    }

    let date =
        parse_date(&fields[0]).map_err(|e| format!("invalid date '{}': {e}", fields[0]))?;
    let time =
        parse_time(&fields[1]).map_err(|e| format!("invalid time '{}': {e}", fields[1]))?;

    match fields.get(4) {
        Some(token) => {
            let status: AppointmentStatus =
                token.parse().map_err(|e: StorageError| e.to_string())?;
            Ok(Appointment::with_status(date, time, cpf.as_str(), crm.as_str(), status))
        }
        None => Ok(Appointment::new(date, time, cpf.as_str(), crm.as_str(), now)),
    }
}

/// Replaces the whole file, CANCELLED records included.
pub fn rewrite(path: &Path, appointments: &[Appointment]) -> Result<(), StorageError> {
    let count = csv_file::rewrite(path, &HEADER, appointments.iter().map(Appointment::to_row))?;
    tracing::info!(path = %path.display(), count, "Appointments saved");
    Ok(())
}

pub fn append(path: &Path, appointment: &Appointment) -> Result<(), StorageError> {
    csv_file::append(path, &HEADER, appointment.to_row())
}
