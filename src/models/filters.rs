use chrono::NaiveDate;

use super::appointment::Appointment;
use super::enums::AppointmentStatus;

/// All set criteria must hold. An empty filter matches everything.
#[derive(Debug, Default, Clone)]
pub struct AppointmentFilter {
    pub patient_cpf: Option<String>,
    pub doctor_code: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
}

impl AppointmentFilter {
    pub fn matches(&self, appt: &Appointment) -> bool {
        self.patient_cpf
            .as_deref()
            .map_or(true, |cpf| appt.belongs_to_patient(cpf))
            && self
                .doctor_code
                .as_deref()
                .map_or(true, |code| appt.belongs_to_doctor(code))
            && self.date_from.map_or(true, |from| appt.date >= from)
            && self.date_to.map_or(true, |to| appt.date <= to)
            && self.status.map_or(true, |status| appt.status == status)
    }
}
