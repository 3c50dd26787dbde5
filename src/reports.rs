//! Read-only queries over an appointment slice.
//!
//! Filters keep the relative order of their input. "Upcoming" listings are
//! sorted ascending by date and time, "history" listings descending.
//!
//! Two notions of "past" coexist here: [`filter_occurred`] is purely
//! time-based, whereas [`filter_pending`] looks at the status. A PENDING
//! appointment whose slot has gone by shows up in both.

use std::collections::HashMap;

use chrono::{Months, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::models::{Appointment, AppointmentFilter, AppointmentStatus};

pub fn filter_by_patient<'a>(
    appointments: &'a [Appointment],
    cpf: &str,
) -> Vec<&'a Appointment> {
    appointments
        .iter()
        .filter(|a| a.belongs_to_patient(cpf))
        .collect()
}

pub fn filter_by_doctor<'a>(
    appointments: &'a [Appointment],
    code: &str,
) -> Vec<&'a Appointment> {
    appointments
        .iter()
        .filter(|a| a.belongs_to_doctor(code))
        .collect()
}

/// `start <= date <= end`.
pub fn filter_by_period(
    appointments: &[Appointment],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<&Appointment> {
    appointments
        .iter()
        .filter(|a| a.is_in_period(start, end))
        .collect()
}

pub fn filter_pending(appointments: &[Appointment]) -> Vec<&Appointment> {
    appointments.iter().filter(|a| a.is_pending()).collect()
}

/// Slots strictly before `now`, regardless of status.
pub fn filter_occurred(appointments: &[Appointment], now: NaiveDateTime) -> Vec<&Appointment> {
    appointments.iter().filter(|a| a.has_occurred(now)).collect()
}

pub fn filter<'a>(
    appointments: &'a [Appointment],
    criteria: &AppointmentFilter,
) -> Vec<&'a Appointment> {
    appointments.iter().filter(|a| criteria.matches(a)).collect()
}

fn sort_ascending(list: &mut [&Appointment]) {
    list.sort_by(|a, b| a.cmp_by_date_time(b));
}

fn sort_descending(list: &mut [&Appointment]) {
    list.sort_by(|a, b| b.cmp_by_date_time(a));
}

/// A patient's PENDING appointments, soonest first.
pub fn upcoming_for_patient<'a>(
    appointments: &'a [Appointment],
    cpf: &str,
) -> Vec<&'a Appointment> {
    let mut list: Vec<_> = appointments
        .iter()
        .filter(|a| a.belongs_to_patient(cpf) && a.is_pending())
        .collect();
    sort_ascending(&mut list);
    list
}

/// Visits that happened: COMPLETED ones, plus anything not CANCELLED whose
/// slot has passed. Most recent first.
pub fn history_for_patient<'a>(
    appointments: &'a [Appointment],
    cpf: &str,
    now: NaiveDateTime,
) -> Vec<&'a Appointment> {
    let mut list: Vec<_> = appointments
        .iter()
        .filter(|a| a.belongs_to_patient(cpf))
        .filter(|a| {
            a.status == AppointmentStatus::Completed || (a.has_occurred(now) && !a.is_cancelled())
        })
        .collect();
    sort_descending(&mut list);
    list
}

/// A doctor's appointments within `[start, end]`, in time order.
pub fn doctor_agenda<'a>(
    appointments: &'a [Appointment],
    code: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<&'a Appointment> {
    let mut list: Vec<_> = appointments
        .iter()
        .filter(|a| a.belongs_to_doctor(code) && a.is_in_period(start, end))
        .collect();
    sort_ascending(&mut list);
    list
}

/// Distinct doctor codes a patient has appointments with, first-seen order.
pub fn doctors_for_patient<'a>(appointments: &'a [Appointment], cpf: &str) -> Vec<&'a str> {
    let mut codes: Vec<&str> = Vec::new();
    for a in appointments.iter().filter(|a| a.belongs_to_patient(cpf)) {
        if !codes.contains(&a.doctor_code.as_str()) {
            codes.push(&a.doctor_code);
        }
    }
    codes
}

/// Distinct patients a doctor has appointments with, first-seen order.
pub fn patients_of_doctor<'a>(appointments: &'a [Appointment], code: &str) -> Vec<&'a str> {
    let mut cpfs: Vec<&str> = Vec::new();
    for a in appointments.iter().filter(|a| a.belongs_to_doctor(code)) {
        if !cpfs.contains(&a.patient_cpf.as_str()) {
            cpfs.push(&a.patient_cpf);
        }
    }
    cpfs
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InactivePatient {
    pub cpf: String,
    /// Latest non-cancelled appointment date with this doctor, if any.
    pub last_visit: Option<NaiveDate>,
}

/// Patients of `code` whose latest non-cancelled appointment is older than
/// `months` calendar months before `today`, or who only ever cancelled.
pub fn inactive_patients(
    appointments: &[Appointment],
    code: &str,
    months: u32,
    today: NaiveDate,
) -> Vec<InactivePatient> {
    let cutoff = today
        .checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN);

    let mut order: Vec<&str> = Vec::new();
    let mut last_visit: HashMap<&str, Option<NaiveDate>> = HashMap::new();

    for a in appointments.iter().filter(|a| a.belongs_to_doctor(code)) {
        let entry = last_visit.entry(a.patient_cpf.as_str()).or_insert_with(|| {
            order.push(&a.patient_cpf);
            None
        });
        if !a.is_cancelled() {
            *entry = (*entry).max(Some(a.date));
        }
    }

    order
        .into_iter()
        .filter_map(|cpf| {
            let last = last_visit.get(cpf).copied().flatten();
            match last {
                Some(date) if date >= cutoff => None,
                _ => Some(InactivePatient {
                    cpf: cpf.to_string(),
                    last_visit: last,
                }),
            }
        })
        .collect()
}
