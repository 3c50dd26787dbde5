use chrono::{NaiveDate, NaiveTime};

use crate::models::{Appointment, AppointmentId};

/// Finds the PENDING appointment holding `(doctor_code, date, time)`, if
/// any. `excluding` skips one record, so a reschedule does not collide with
/// the appointment being moved.
pub fn find_conflict<'a>(
    appointments: &'a [Appointment],
    doctor_code: &str,
    date: NaiveDate,
    time: NaiveTime,
    excluding: Option<AppointmentId>,
) -> Option<&'a Appointment> {
    appointments.iter().find(|a| {
        Some(a.id) != excluding
            && a.is_pending()
            && a.belongs_to_doctor(doctor_code)
            && a.date == date
            && a.time == time
    })
}

/// COMPLETED and CANCELLED records never block a slot.
pub fn has_conflict(
    appointments: &[Appointment],
    doctor_code: &str,
    date: NaiveDate,
    time: NaiveTime,
    excluding: Option<AppointmentId>,
) -> bool {
    find_conflict(appointments, doctor_code, date, time, excluding).is_some()
}

/// Same-day is allowed; only dates before `today` are rejected.
pub fn is_future_date(date: NaiveDate, today: NaiveDate) -> bool {
    date >= today
}
