use std::cmp::Ordering;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AppointmentStatus;

/// Persisted date layout (`YYYY-MM-DD`).
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Persisted time layout (24-hour `HH:MM`).
pub const TIME_FORMAT: &str = "%H:%M";

pub fn parse_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
}

pub fn parse_time(s: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(s.trim(), TIME_FORMAT)
}

/// Session-scoped handle for one appointment.
///
/// Minted on construction and on load; never written to disk, so two loads
/// of the same file produce different ids for the same record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppointmentId(Uuid);

impl AppointmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AppointmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AppointmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The persisted identity of an appointment: what a caller can name without
/// holding an [`AppointmentId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppointmentKey {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub patient_cpf: String,
    pub doctor_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub patient_cpf: String,
    pub doctor_code: String,
    pub status: AppointmentStatus,
}

impl Appointment {
    /// Builds an appointment classified against `now`: anything already in
    /// the past starts out COMPLETED, everything else PENDING. The status is
    /// not re-evaluated afterwards.
    pub fn new(
        date: NaiveDate,
        time: NaiveTime,
        patient_cpf: impl Into<String>,
        doctor_code: impl Into<String>,
        now: NaiveDateTime,
    ) -> Self {
        let status = if date.and_time(time) < now {
            AppointmentStatus::Completed
        } else {
            AppointmentStatus::Pending
        };
        Self::with_status(date, time, patient_cpf, doctor_code, status)
    }

    pub fn with_status(
        date: NaiveDate,
        time: NaiveTime,
        patient_cpf: impl Into<String>,
        doctor_code: impl Into<String>,
        status: AppointmentStatus,
    ) -> Self {
        Self {
            id: AppointmentId::new(),
            date,
            time,
            patient_cpf: patient_cpf.into(),
            doctor_code: doctor_code.into(),
            status,
        }
    }

    pub fn key(&self) -> AppointmentKey {
        AppointmentKey {
            date: self.date,
            time: self.time,
            patient_cpf: self.patient_cpf.clone(),
            doctor_code: self.doctor_code.clone(),
        }
    }

    pub fn matches_key(&self, key: &AppointmentKey) -> bool {
        self.date == key.date
            && self.time == key.time
            && self.patient_cpf == key.patient_cpf
            && self.doctor_code == key.doctor_code
    }

    pub fn belongs_to_doctor(&self, doctor_code: &str) -> bool {
        self.doctor_code == doctor_code
    }

    pub fn belongs_to_patient(&self, patient_cpf: &str) -> bool {
        self.patient_cpf == patient_cpf
    }

    pub fn date_time(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    /// Time-based: true once the slot is strictly in the past, whatever the
    /// status says.
    pub fn has_occurred(&self, now: NaiveDateTime) -> bool {
        self.date_time() < now
    }

    pub fn is_pending(&self) -> bool {
        self.status == AppointmentStatus::Pending
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == AppointmentStatus::Cancelled
    }

    /// Inclusive on both ends.
    pub fn is_in_period(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.date && self.date <= end
    }

    pub fn formatted_date_time(&self) -> String {
        format!(
            "{} at {}",
            self.date.format("%d/%m/%Y"),
            self.time.format(TIME_FORMAT)
        )
    }

    pub fn cmp_by_date_time(&self, other: &Self) -> Ordering {
        self.date_time().cmp(&other.date_time())
    }

    /// Columns in `Date,Time,PatientCPF,DoctorCode,Status` order.
    pub fn to_row(&self) -> [String; 5] {
        [
            self.date.format(DATE_FORMAT).to_string(),
            self.time.format(TIME_FORMAT).to_string(),
            self.patient_cpf.clone(),
            self.doctor_code.clone(),
            self.status.as_str().to_string(),
        ]
    }
}

impl fmt::Display for Appointment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Appointment on {}, patient {}, doctor {} ({})",
            self.formatted_date_time(),
            self.patient_cpf,
            self.doctor_code,
            self.status.label()
        )
    }
}
