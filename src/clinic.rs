//! The clinic service object.
//!
//! `Clinic` owns the doctor and patient tables, the appointment collection
//! and the paths of their files. Every mutation goes through it, so the
//! conflict gate cannot be bypassed and memory and disk are changed in one
//! place. "Now" is always passed in by the caller.
//!
//! Commit rules:
//! - scheduling appends one line to the appointments file;
//! - reschedule and cancel rewrite the whole file;
//! - registering a doctor or patient appends, every other identity edit
//!   rewrites that identity file.
//!
//! When a write fails the in-memory change is kept and the caller gets
//! [`ClinicError::Unsaved`]. Nothing is rolled back.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

use crate::config::DataPaths;
use crate::models::{
    is_valid_cpf, is_valid_crm, Appointment, AppointmentId, AppointmentKey, AppointmentStatus,
    Doctor, Patient,
};
use crate::scheduling::{find_conflict, is_future_date};
use crate::storage::{self, LoadWarning, StorageError};

#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("The appointment date must not be in the past ({date})")]
    PastDate { date: NaiveDate },

    #[error(
        "Doctor {doctor_code} already has an appointment on {date} at {}",
        .time.format("%H:%M")
    )]
    SlotTaken {
        doctor_code: String,
        date: NaiveDate,
        time: NaiveTime,
    },

    #[error("Appointment not found; the listing it came from is out of date")]
    AppointmentNotFound,

    #[error("No doctor with CRM {0}")]
    UnknownDoctor(String),

    #[error("Doctor with CRM {0} is marked as removed")]
    DoctorRemoved(String),

    #[error("Doctor with CRM {0} is not marked as removed")]
    DoctorNotRemoved(String),

    #[error("No patient with CPF {0}")]
    UnknownPatient(String),

    #[error("Invalid CPF '{0}': it must have exactly 11 digits")]
    InvalidCpf(String),

    #[error("Invalid CRM '{0}': digits only")]
    InvalidCrm(String),

    #[error("Name is required")]
    EmptyName,

    #[error("A doctor with CRM {0} is already registered")]
    DuplicateDoctor(String),

    #[error("A patient with CPF {0} is already registered")]
    DuplicatePatient(String),

    #[error("Appointment on {0} is not pending")]
    NotPending(String),

    #[error("Change applied but not saved: {source}")]
    Unsaved {
        #[source]
        source: StorageError,
    },
}

/// Warnings collected while opening the three record files.
#[derive(Debug, Default)]
pub struct OpenWarnings {
    pub doctors: Vec<LoadWarning>,
    pub patients: Vec<LoadWarning>,
    pub appointments: Vec<LoadWarning>,
}

impl OpenWarnings {
    pub fn is_empty(&self) -> bool {
        self.doctors.is_empty() && self.patients.is_empty() && self.appointments.is_empty()
    }
}

/// Record files are read one line per record, so names are kept on a
/// single line with runs of whitespace collapsed.
fn clean_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn unsaved(what: &str, source: StorageError) -> ClinicError {
    tracing::error!("Could not save {what}; in-memory state kept: {source}");
    ClinicError::Unsaved { source }
}

fn rejected(op: &str, err: ClinicError) -> ClinicError {
    tracing::info!(op, reason = %err, "Mutation rejected");
    err
}

pub struct Clinic {
    paths: DataPaths,
    doctors: Vec<Doctor>,
    patients: Vec<Patient>,
    appointments: Vec<Appointment>,
}

impl Clinic {
    /// Loads all three files. Never fails: unreadable content ends up in
    /// the returned warnings and the clinic starts with what could be read.
    pub fn open(paths: DataPaths, now: NaiveDateTime) -> (Self, OpenWarnings) {
        let doctors = storage::doctors::load(&paths.doctors);
        let patients = storage::patients::load(&paths.patients);
        let appointments = storage::appointments::load(&paths.appointments, now);

        tracing::info!(
            doctors = doctors.records.len(),
            patients = patients.records.len(),
            appointments = appointments.records.len(),
            "Clinic records loaded"
        );

        let warnings = OpenWarnings {
            doctors: doctors.warnings,
            patients: patients.warnings,
            appointments: appointments.warnings,
        };
        let clinic = Self {
            paths,
            doctors: doctors.records,
            patients: patients.records,
            appointments: appointments.records,
        };
        (clinic, warnings)
    }

    /// Builds a clinic from records already in memory. Nothing is written
    /// until the first mutation.
    pub fn with_records(
        paths: DataPaths,
        doctors: Vec<Doctor>,
        patients: Vec<Patient>,
        appointments: Vec<Appointment>,
    ) -> Self {
        Self {
            paths,
            doctors,
            patients,
            appointments,
        }
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    // ── Read access ─────────────────────────────────────────

    pub fn appointments(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn doctors(&self) -> &[Doctor] {
        &self.doctors
    }

    pub fn patients(&self) -> &[Patient] {
        &self.patients
    }

    pub fn get(&self, id: AppointmentId) -> Option<&Appointment> {
        self.appointments.iter().find(|a| a.id == id)
    }

    /// Resolves a persisted identity tuple. A PENDING match wins over
    /// historical records that happen to share the tuple.
    pub fn find(&self, key: &AppointmentKey) -> Option<AppointmentId> {
        let mut matching = self.appointments.iter().filter(|a| a.matches_key(key));
        let first = matching.next()?;
        if first.is_pending() {
            return Some(first.id);
        }
        Some(matching.find(|a| a.is_pending()).unwrap_or(first).id)
    }

    /// The per-patient view, in store order. Computed on every call.
    pub fn appointments_for(&self, cpf: &str) -> Vec<&Appointment> {
        self.appointments
            .iter()
            .filter(|a| a.belongs_to_patient(cpf))
            .collect()
    }

    pub fn doctor(&self, code: &str) -> Option<&Doctor> {
        self.doctors.iter().find(|d| d.code == code)
    }

    pub fn patient(&self, cpf: &str) -> Option<&Patient> {
        self.patients.iter().find(|p| p.cpf == cpf)
    }

    pub fn doctor_name(&self, code: &str) -> String {
        match self.doctor(code) {
            Some(d) => d.display_name().to_string(),
            None => format!("CRM {code} (doctor not found)"),
        }
    }

    pub fn patient_name(&self, cpf: &str) -> Option<&str> {
        self.patient(cpf).map(|p| p.name.as_str())
    }

    /// Alphabetical by name.
    pub fn doctors_by_name(&self) -> Vec<&Doctor> {
        let mut doctors: Vec<&Doctor> = self.doctors.iter().collect();
        doctors.sort_by(|a, b| a.name.cmp(&b.name));
        doctors
    }

    // ── Appointment lifecycle ───────────────────────────────

    /// Books a PENDING appointment.
    pub fn schedule(
        &mut self,
        cpf: &str,
        doctor_code: &str,
        date: NaiveDate,
        time: NaiveTime,
        today: NaiveDate,
    ) -> Result<Appointment, ClinicError> {
        self.check_patient(cpf).map_err(|e| rejected("schedule", e))?;
        self.check_bookable_doctor(doctor_code)
            .map_err(|e| rejected("schedule", e))?;
        self.check_slot(doctor_code, date, time, today, None)
            .map_err(|e| rejected("schedule", e))?;

        let appointment =
            Appointment::with_status(date, time, cpf, doctor_code, AppointmentStatus::Pending);
        self.appointments.push(appointment.clone());

        storage::appointments::append(&self.paths.appointments, &appointment)
            .map_err(|e| unsaved("new appointment", e))?;

        tracing::info!(
            patient = %cpf,
            doctor = %doctor_code,
            date = %date,
            time = %time.format("%H:%M"),
            "Appointment scheduled"
        );
        Ok(appointment)
    }

    /// Moves an appointment to a new slot.
    ///
    /// The record is replaced in place by a new PENDING appointment with a
    /// fresh id; the previous status, CANCELLED included, is discarded. The
    /// record itself does not count as a conflict for its new slot.
    pub fn reschedule(
        &mut self,
        id: AppointmentId,
        new_date: NaiveDate,
        new_time: NaiveTime,
        today: NaiveDate,
    ) -> Result<Appointment, ClinicError> {
        let index = self
            .index_of(id)
            .ok_or_else(|| rejected("reschedule", ClinicError::AppointmentNotFound))?;
        let current = &self.appointments[index];
        let doctor_code = current.doctor_code.clone();
        let patient_cpf = current.patient_cpf.clone();

        self.check_slot(&doctor_code, new_date, new_time, today, Some(id))
            .map_err(|e| rejected("reschedule", e))?;

        let replacement = Appointment::with_status(
            new_date,
            new_time,
            patient_cpf,
            doctor_code,
            AppointmentStatus::Pending,
        );
        let previous = std::mem::replace(&mut self.appointments[index], replacement.clone());

        self.save_appointments()?;

        tracing::info!(
            doctor = %replacement.doctor_code,
            from = %previous.date_time(),
            to = %replacement.date_time(),
            "Appointment rescheduled"
        );
        Ok(replacement)
    }

    /// Marks an appointment CANCELLED. The record stays in the store and in
    /// the file. Cancelling twice is harmless.
    pub fn cancel(&mut self, id: AppointmentId) -> Result<Appointment, ClinicError> {
        let index = self
            .index_of(id)
            .ok_or_else(|| rejected("cancel", ClinicError::AppointmentNotFound))?;
        self.appointments[index].status = AppointmentStatus::Cancelled;
        let cancelled = self.appointments[index].clone();

        self.save_appointments()?;

        tracing::info!(
            doctor = %cancelled.doctor_code,
            at = %cancelled.date_time(),
            "Appointment cancelled"
        );
        Ok(cancelled)
    }

    /// Attendance is not recorded; this only checks the appointment is
    /// still PENDING and hands it back for display.
    pub fn confirm_presence(&self, id: AppointmentId) -> Result<&Appointment, ClinicError> {
        let appointment = self.get(id).ok_or(ClinicError::AppointmentNotFound)?;
        if !appointment.is_pending() {
            return Err(ClinicError::NotPending(appointment.formatted_date_time()));
        }
        tracing::info!(at = %appointment.date_time(), "Presence confirmed");
        Ok(appointment)
    }

    /// Drops the in-memory appointments and reads the file again.
    pub fn reload_appointments(&mut self, now: NaiveDateTime) -> Vec<LoadWarning> {
        let report = storage::appointments::load(&self.paths.appointments, now);
        self.appointments = report.records;
        report.warnings
    }

    fn index_of(&self, id: AppointmentId) -> Option<usize> {
        self.appointments.iter().position(|a| a.id == id)
    }

    fn check_patient(&self, cpf: &str) -> Result<(), ClinicError> {
        if !is_valid_cpf(cpf) {
            return Err(ClinicError::InvalidCpf(cpf.to_string()));
        }
        if self.patient(cpf).is_none() {
            return Err(ClinicError::UnknownPatient(cpf.to_string()));
        }
        Ok(())
    }

    fn check_bookable_doctor(&self, code: &str) -> Result<(), ClinicError> {
        match self.doctor(code) {
            None => Err(ClinicError::UnknownDoctor(code.to_string())),
            Some(d) if d.is_removed() => Err(ClinicError::DoctorRemoved(code.to_string())),
            Some(_) => Ok(()),
        }
    }

    fn check_slot(
        &self,
        doctor_code: &str,
        date: NaiveDate,
        time: NaiveTime,
        today: NaiveDate,
        excluding: Option<AppointmentId>,
    ) -> Result<(), ClinicError> {
        if !is_future_date(date, today) {
            return Err(ClinicError::PastDate { date });
        }
        if find_conflict(&self.appointments, doctor_code, date, time, excluding).is_some() {
            return Err(ClinicError::SlotTaken {
                doctor_code: doctor_code.to_string(),
                date,
                time,
            });
        }
        Ok(())
    }

    fn save_appointments(&self) -> Result<(), ClinicError> {
        storage::appointments::rewrite(&self.paths.appointments, &self.appointments)
            .map_err(|e| unsaved("appointments", e))
    }

    // ── Doctors ─────────────────────────────────────────────

    pub fn register_doctor(&mut self, code: &str, name: &str) -> Result<Doctor, ClinicError> {
        let (code, name) = (code.trim(), clean_name(name));
        if !is_valid_crm(code) {
            return Err(ClinicError::InvalidCrm(code.to_string()));
        }
        if name.is_empty() {
            return Err(ClinicError::EmptyName);
        }
        if self.doctor(code).is_some() {
            return Err(ClinicError::DuplicateDoctor(code.to_string()));
        }

        let doctor = Doctor::new(code, name.as_str());
        self.doctors.push(doctor.clone());
        storage::doctors::append(&self.paths.doctors, &doctor)
            .map_err(|e| unsaved("new doctor", e))?;

        tracing::info!(doctor = %code, "Doctor registered");
        Ok(doctor)
    }

    pub fn rename_doctor(&mut self, code: &str, name: &str) -> Result<Doctor, ClinicError> {
        let name = clean_name(name);
        if name.is_empty() {
            return Err(ClinicError::EmptyName);
        }
        self.edit_doctor(code, |d| {
            d.rename(name);
            Ok(())
        })
    }

    /// Soft removal: the name gets the removal marker, the CRM stays.
    pub fn remove_doctor(&mut self, code: &str) -> Result<Doctor, ClinicError> {
        self.edit_doctor(code, |d| {
            d.mark_removed();
            Ok(())
        })
    }

    pub fn reintegrate_doctor(&mut self, code: &str) -> Result<Doctor, ClinicError> {
        self.edit_doctor(code, |d| {
            if d.reintegrate() {
                Ok(())
            } else {
                Err(ClinicError::DoctorNotRemoved(d.code.clone()))
            }
        })
    }

    fn edit_doctor<F>(&mut self, code: &str, edit: F) -> Result<Doctor, ClinicError>
    where
        F: FnOnce(&mut Doctor) -> Result<(), ClinicError>,
    {
        let code = code.trim();
        let doctor = self
            .doctors
            .iter_mut()
            .find(|d| d.code == code)
            .ok_or_else(|| ClinicError::UnknownDoctor(code.to_string()))?;
        edit(doctor)?;
        let updated = doctor.clone();

        storage::doctors::rewrite(&self.paths.doctors, &self.doctors)
            .map_err(|e| unsaved("doctors", e))?;

        tracing::info!(doctor = %code, "Doctor updated");
        Ok(updated)
    }

    // ── Patients ────────────────────────────────────────────

    pub fn register_patient(&mut self, cpf: &str, name: &str) -> Result<Patient, ClinicError> {
        let (cpf, name) = (cpf.trim(), clean_name(name));
        if !is_valid_cpf(cpf) {
            return Err(ClinicError::InvalidCpf(cpf.to_string()));
        }
        if name.is_empty() {
            return Err(ClinicError::EmptyName);
        }
        if self.patient(cpf).is_some() {
            return Err(ClinicError::DuplicatePatient(cpf.to_string()));
        }

        let patient = Patient::new(cpf, name.as_str());
        self.patients.push(patient.clone());
        storage::patients::append(&self.paths.patients, &patient)
            .map_err(|e| unsaved("new patient", e))?;

        tracing::info!(patient = %cpf, "Patient registered");
        Ok(patient)
    }

    pub fn rename_patient(&mut self, cpf: &str, name: &str) -> Result<Patient, ClinicError> {
        let (cpf, name) = (cpf.trim(), clean_name(name));
        if name.is_empty() {
            return Err(ClinicError::EmptyName);
        }
        let patient = self
            .patients
            .iter_mut()
            .find(|p| p.cpf == cpf)
            .ok_or_else(|| ClinicError::UnknownPatient(cpf.to_string()))?;
        patient.name = name;
        let updated = patient.clone();

        self.save_patients()?;
        tracing::info!(patient = %cpf, "Patient updated");
        Ok(updated)
    }

    /// Deletes the patient record. Their appointments stay in the store.
    pub fn remove_patient(&mut self, cpf: &str) -> Result<Patient, ClinicError> {
        let cpf = cpf.trim();
        let index = self
            .patients
            .iter()
            .position(|p| p.cpf == cpf)
            .ok_or_else(|| ClinicError::UnknownPatient(cpf.to_string()))?;
        let removed = self.patients.remove(index);

        self.save_patients()?;
        tracing::info!(patient = %cpf, "Patient removed");
        Ok(removed)
    }

    fn save_patients(&self) -> Result<(), ClinicError> {
        storage::patients::rewrite(&self.paths.patients, &self.patients)
            .map_err(|e| unsaved("patients", e))
    }

    /// Picks up doctors and patients added to the files by someone else.
    /// Known codes keep their in-memory entry. Returns how many were added.
    pub fn resync_identities(&mut self) -> usize {
        let mut added = 0;

        for doctor in storage::doctors::load(&self.paths.doctors).records {
            if self.doctor(&doctor.code).is_none() {
                self.doctors.push(doctor);
                added += 1;
            }
        }
        for patient in storage::patients::load(&self.paths.patients).records {
            if self.patient(&patient.cpf).is_none() {
                self.patients.push(patient);
                added += 1;
            }
        }

        if added > 0 {
            tracing::info!(added, "Identity tables resynced");
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{parse_date, parse_time};
    use std::fs;

    const ANA: &str = "11122233344";
    const BRUNO: &str = "55566677788";
    const CARLA: &str = "99988877766";

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        parse_time(s).unwrap()
    }

    fn today() -> NaiveDate {
        d("2026-10-14")
    }

    fn now() -> NaiveDateTime {
        today().and_time(t("12:00"))
    }

    fn setup() -> (tempfile::TempDir, Clinic) {
        let dir = tempfile::tempdir().unwrap();
        let (mut clinic, _) = Clinic::open(DataPaths::in_dir(dir.path()), now());
        clinic.register_doctor("111", "Dr. Silva").unwrap();
        clinic.register_doctor("222", "Dr. Souza").unwrap();
        clinic.register_patient(ANA, "Ana").unwrap();
        clinic.register_patient(BRUNO, "Bruno").unwrap();
        clinic.register_patient(CARLA, "Carla").unwrap();
        (dir, clinic)
    }

    fn reopen(clinic: &Clinic) -> Clinic {
        let (reopened, warnings) = Clinic::open(clinic.paths().clone(), now());
        assert!(warnings.doctors.is_empty() && warnings.patients.is_empty());
        reopened
    }

    #[test]
    fn cancelled_slot_can_be_booked_again() {
        let (_dir, mut clinic) = setup();

        let first = clinic
            .schedule(ANA, "111", d("2099-01-10"), t("09:00"), today())
            .unwrap();
        assert_eq!(first.status, AppointmentStatus::Pending);

        let err = clinic
            .schedule(BRUNO, "111", d("2099-01-10"), t("09:00"), today())
            .unwrap_err();
        assert!(matches!(err, ClinicError::SlotTaken { .. }));

        let cancelled = clinic.cancel(first.id).unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

        let third = clinic
            .schedule(CARLA, "111", d("2099-01-10"), t("09:00"), today())
            .unwrap();
        assert_eq!(third.status, AppointmentStatus::Pending);
        assert_eq!(clinic.appointments().len(), 2);
    }

    #[test]
    fn past_date_rejected_without_conflict() {
        let (_dir, mut clinic) = setup();
        let err = clinic
            .schedule(ANA, "111", d("2026-10-13"), t("09:00"), today())
            .unwrap_err();
        assert!(matches!(err, ClinicError::PastDate { .. }));
        assert!(clinic.appointments().is_empty());
    }

    #[test]
    fn same_day_is_allowed() {
        let (_dir, mut clinic) = setup();
        let appt = clinic
            .schedule(ANA, "111", today(), t("08:00"), today())
            .unwrap();
        assert_eq!(appt.status, AppointmentStatus::Pending);
    }

    #[test]
    fn schedule_requires_known_people() {
        let (_dir, mut clinic) = setup();
        let date = d("2099-01-10");
        assert!(matches!(
            clinic.schedule("12345678901", "111", date, t("09:00"), today()),
            Err(ClinicError::UnknownPatient(_))
        ));
        assert!(matches!(
            clinic.schedule("123", "111", date, t("09:00"), today()),
            Err(ClinicError::InvalidCpf(_))
        ));
        assert!(matches!(
            clinic.schedule(ANA, "999", date, t("09:00"), today()),
            Err(ClinicError::UnknownDoctor(_))
        ));
    }

    #[test]
    fn removed_doctor_cannot_be_booked_until_reintegrated() {
        let (_dir, mut clinic) = setup();
        clinic.remove_doctor("111").unwrap();
        assert!(matches!(
            clinic.schedule(ANA, "111", d("2099-01-10"), t("09:00"), today()),
            Err(ClinicError::DoctorRemoved(_))
        ));

        clinic.reintegrate_doctor("111").unwrap();
        assert!(clinic
            .schedule(ANA, "111", d("2099-01-10"), t("09:00"), today())
            .is_ok());
    }

    #[test]
    fn schedule_appends_to_file() {
        let (_dir, mut clinic) = setup();
        clinic
            .schedule(ANA, "111", d("2099-01-10"), t("09:00"), today())
            .unwrap();
        let content = fs::read_to_string(&clinic.paths().appointments).unwrap();
        assert_eq!(
            content,
            "Date,Time,PatientCPF,DoctorCode,Status\n2099-01-10,09:00,11122233344,111,PENDING\n"
        );
    }

    #[test]
    fn reschedule_keeps_people_and_resets_status() {
        let (_dir, mut clinic) = setup();
        let original = clinic
            .schedule(ANA, "111", d("2099-01-10"), t("09:00"), today())
            .unwrap();
        clinic.cancel(original.id).unwrap();

        let moved = clinic
            .reschedule(original.id, d("2099-02-01"), t("15:30"), today())
            .unwrap();
        assert_eq!(moved.patient_cpf, ANA);
        assert_eq!(moved.doctor_code, "111");
        assert_eq!(moved.status, AppointmentStatus::Pending);
        assert_eq!(moved.date, d("2099-02-01"));
        assert_eq!(moved.time, t("15:30"));

        assert_eq!(clinic.appointments().len(), 1);
        assert!(clinic.get(original.id).is_none());
        assert_eq!(clinic.get(moved.id).unwrap().date, d("2099-02-01"));

        let reopened = reopen(&clinic);
        assert_eq!(reopened.appointments()[0].to_row(), moved.to_row());
    }

    #[test]
    fn reschedule_into_occupied_slot_changes_nothing() {
        let (_dir, mut clinic) = setup();
        let ana = clinic
            .schedule(ANA, "111", d("2099-01-10"), t("09:00"), today())
            .unwrap();
        clinic
            .schedule(BRUNO, "111", d("2099-01-10"), t("10:00"), today())
            .unwrap();
        let before = fs::read_to_string(&clinic.paths().appointments).unwrap();

        let err = clinic
            .reschedule(ana.id, d("2099-01-10"), t("10:00"), today())
            .unwrap_err();
        assert!(matches!(err, ClinicError::SlotTaken { .. }));

        let unchanged = clinic.get(ana.id).unwrap();
        assert_eq!(unchanged.date, d("2099-01-10"));
        assert_eq!(unchanged.time, t("09:00"));
        assert_eq!(unchanged.status, AppointmentStatus::Pending);
        assert_eq!(fs::read_to_string(&clinic.paths().appointments).unwrap(), before);
    }

    #[test]
    fn reschedule_onto_own_slot_is_not_a_conflict() {
        let (_dir, mut clinic) = setup();
        let ana = clinic
            .schedule(ANA, "111", d("2099-01-10"), t("09:00"), today())
            .unwrap();
        assert!(clinic
            .reschedule(ana.id, d("2099-01-10"), t("09:00"), today())
            .is_ok());
    }

    #[test]
    fn reschedule_to_past_rejected() {
        let (_dir, mut clinic) = setup();
        let ana = clinic
            .schedule(ANA, "111", d("2099-01-10"), t("09:00"), today())
            .unwrap();
        assert!(matches!(
            clinic.reschedule(ana.id, d("2020-01-10"), t("09:00"), today()),
            Err(ClinicError::PastDate { .. })
        ));
    }

    #[test]
    fn stale_id_is_a_consistency_error() {
        let (_dir, mut clinic) = setup();
        let ana = clinic
            .schedule(ANA, "111", d("2099-01-10"), t("09:00"), today())
            .unwrap();
        let moved = clinic
            .reschedule(ana.id, d("2099-01-11"), t("09:00"), today())
            .unwrap();

        assert!(matches!(
            clinic.reschedule(ana.id, d("2099-01-12"), t("09:00"), today()),
            Err(ClinicError::AppointmentNotFound)
        ));
        assert!(matches!(clinic.cancel(ana.id), Err(ClinicError::AppointmentNotFound)));
        assert_eq!(clinic.get(moved.id).unwrap().date, d("2099-01-11"));
    }

    #[test]
    fn cancel_is_idempotent_and_kept_on_disk() {
        let (_dir, mut clinic) = setup();
        let ana = clinic
            .schedule(ANA, "111", d("2099-01-10"), t("09:00"), today())
            .unwrap();
        clinic.cancel(ana.id).unwrap();
        let again = clinic.cancel(ana.id).unwrap();
        assert_eq!(again.status, AppointmentStatus::Cancelled);

        let reopened = reopen(&clinic);
        assert_eq!(reopened.appointments().len(), 1);
        assert_eq!(reopened.appointments()[0].status, AppointmentStatus::Cancelled);
    }

    #[test]
    fn per_patient_view_follows_the_store() {
        let (_dir, mut clinic) = setup();
        let ana = clinic
            .schedule(ANA, "111", d("2099-01-10"), t("09:00"), today())
            .unwrap();
        clinic
            .schedule(BRUNO, "222", d("2099-01-10"), t("09:00"), today())
            .unwrap();
        clinic
            .reschedule(ana.id, d("2099-03-03"), t("11:00"), today())
            .unwrap();

        let view = clinic.appointments_for(ANA);
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].date, d("2099-03-03"));
    }

    #[test]
    fn find_by_key_prefers_pending() {
        let (_dir, mut clinic) = setup();
        let first = clinic
            .schedule(ANA, "111", d("2099-01-10"), t("09:00"), today())
            .unwrap();
        clinic.cancel(first.id).unwrap();
        let second = clinic
            .schedule(ANA, "111", d("2099-01-10"), t("09:00"), today())
            .unwrap();

        assert_eq!(clinic.find(&first.key()), Some(second.id));
        clinic.cancel(second.id).unwrap();
        assert_eq!(clinic.find(&first.key()), Some(first.id));
    }

    #[test]
    fn confirm_presence_changes_nothing() {
        let (_dir, mut clinic) = setup();
        let ana = clinic
            .schedule(ANA, "111", d("2099-01-10"), t("09:00"), today())
            .unwrap();
        let before = fs::read_to_string(&clinic.paths().appointments).unwrap();
        assert_eq!(clinic.confirm_presence(ana.id).unwrap().id, ana.id);
        assert_eq!(fs::read_to_string(&clinic.paths().appointments).unwrap(), before);

        clinic.cancel(ana.id).unwrap();
        assert!(matches!(
            clinic.confirm_presence(ana.id),
            Err(ClinicError::NotPending(_))
        ));
    }

    #[test]
    fn pending_slots_stay_unique() {
        let (_dir, mut clinic) = setup();
        let patients = [ANA, BRUNO, CARLA];
        let times = ["09:00", "09:30"];
        let mut booked = Vec::new();

        for (i, cpf) in patients.iter().cycle().take(12).enumerate() {
            let time = t(times[i % times.len()]);
            let doctor = if i % 3 == 0 { "111" } else { "222" };
            if let Ok(appt) = clinic.schedule(cpf, doctor, d("2099-05-05"), time, today()) {
                booked.push(appt.id);
            }
            if i % 4 == 0 {
                if let Some(id) = booked.first().copied() {
                    clinic.cancel(id).unwrap();
                }
            }
        }

        let pending: Vec<_> = clinic.appointments().iter().filter(|a| a.is_pending()).collect();
        for (i, a) in pending.iter().enumerate() {
            for b in &pending[i + 1..] {
                assert!(
                    (a.doctor_code.as_str(), a.date, a.time)
                        != (b.doctor_code.as_str(), b.date, b.time)
                );
            }
        }
    }

    #[test]
    fn failed_rewrite_keeps_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = DataPaths::in_dir(dir.path());
        // A directory where the file should be makes every write fail.
        paths.appointments = dir.path().join("blocked");
        fs::create_dir(&paths.appointments).unwrap();

        let appt = Appointment::with_status(
            d("2099-01-10"),
            t("09:00"),
            ANA,
            "111",
            AppointmentStatus::Pending,
        );
        let mut clinic = Clinic::with_records(
            paths,
            vec![Doctor::new("111", "Dr. Silva")],
            vec![Patient::new(ANA, "Ana")],
            vec![appt.clone()],
        );

        assert!(matches!(clinic.cancel(appt.id), Err(ClinicError::Unsaved { .. })));
        assert_eq!(clinic.get(appt.id).unwrap().status, AppointmentStatus::Cancelled);

        assert!(matches!(
            clinic.schedule(ANA, "111", d("2099-01-11"), t("09:00"), today()),
            Err(ClinicError::Unsaved { .. })
        ));
        assert_eq!(clinic.appointments().len(), 2);
    }

    #[test]
    fn doctor_edits_rewrite_file() {
        let (_dir, mut clinic) = setup();
        clinic.rename_doctor("222", "Dr. Lima").unwrap();
        clinic.remove_doctor("111").unwrap();

        let content = fs::read_to_string(&clinic.paths().doctors).unwrap();
        assert_eq!(content, "Name,CRM\nDr. Silva (Removed),111\nDr. Lima,222\n");

        assert!(matches!(
            clinic.reintegrate_doctor("222"),
            Err(ClinicError::DoctorNotRemoved(_))
        ));
        assert!(matches!(
            clinic.rename_doctor("999", "X"),
            Err(ClinicError::UnknownDoctor(_))
        ));
    }

    #[test]
    fn duplicate_and_malformed_registrations_rejected() {
        let (_dir, mut clinic) = setup();
        assert!(matches!(
            clinic.register_doctor("111", "Dr. Other"),
            Err(ClinicError::DuplicateDoctor(_))
        ));
        assert!(matches!(
            clinic.register_doctor("1x1", "Dr. Other"),
            Err(ClinicError::InvalidCrm(_))
        ));
        assert!(matches!(
            clinic.register_patient(ANA, "Ana again"),
            Err(ClinicError::DuplicatePatient(_))
        ));
        assert!(matches!(
            clinic.register_patient("1234", "Short"),
            Err(ClinicError::InvalidCpf(_))
        ));
        assert!(matches!(
            clinic.register_patient("12345678901", "  "),
            Err(ClinicError::EmptyName)
        ));
    }

    #[test]
    fn removing_patient_keeps_their_appointments() {
        let (_dir, mut clinic) = setup();
        clinic
            .schedule(ANA, "111", d("2099-01-10"), t("09:00"), today())
            .unwrap();
        clinic.remove_patient(ANA).unwrap();

        assert!(clinic.patient(ANA).is_none());
        assert_eq!(clinic.appointments_for(ANA).len(), 1);

        let reopened = reopen(&clinic);
        assert_eq!(reopened.patients().len(), 2);
        assert_eq!(reopened.appointments().len(), 1);
    }

    #[test]
    fn rename_patient_persists() {
        let (_dir, mut clinic) = setup();
        clinic.rename_patient(BRUNO, "Bruno Costa").unwrap();
        let reopened = reopen(&clinic);
        assert_eq!(reopened.patient_name(BRUNO), Some("Bruno Costa"));
    }

    #[test]
    fn resync_adds_only_unknown_codes() {
        let (_dir, mut clinic) = setup();
        clinic.rename_doctor("111", "Dr. Silva Jr.").unwrap();

        let mut content = fs::read_to_string(&clinic.paths().doctors).unwrap();
        content = content.replace("Dr. Silva Jr.", "Edited Elsewhere");
        content.push_str("Dr. Nova,333\n");
        fs::write(&clinic.paths().doctors, content).unwrap();

        assert_eq!(clinic.resync_identities(), 1);
        assert_eq!(clinic.doctor_name("333"), "Dr. Nova");
        assert_eq!(clinic.doctor_name("111"), "Dr. Silva Jr.");
    }

    #[test]
    fn cancel_after_unreadable_line_keeps_later_records() {
        let (_dir, mut clinic) = setup();
        fs::write(
            &clinic.paths().appointments,
            "Date,Time,PatientCPF,DoctorCode,Status\n\
             \"2099-01-09,09:00,11122233344,111,PENDING\n\
             2099-01-10,09:00,11122233344,111,PENDING\n\
             2099-01-11,09:00,55566677788,111,PENDING\n",
        )
        .unwrap();
        assert_eq!(clinic.reload_appointments(now()).len(), 1);

        let id = clinic.appointments()[0].id;
        clinic.cancel(id).unwrap();

        let reopened = reopen(&clinic);
        assert_eq!(reopened.appointments().len(), 2);
        assert_eq!(reopened.appointments()[1].patient_cpf, BRUNO);
    }

    #[test]
    fn names_are_kept_on_one_line() {
        let (_dir, mut clinic) = setup();
        clinic.register_doctor("333", "  Dr.\nNova   Lima ").unwrap();
        clinic.rename_patient(BRUNO, "Bruno\r\nCosta").unwrap();

        let reopened = reopen(&clinic);
        assert_eq!(reopened.doctor_name("333"), "Dr. Nova Lima");
        assert_eq!(reopened.patient_name(BRUNO), Some("Bruno Costa"));
        assert!(matches!(
            clinic.register_patient("12312312312", " \n "),
            Err(ClinicError::EmptyName)
        ));
    }

    #[test]
    fn doctor_name_falls_back_to_code() {
        let (_dir, clinic) = setup();
        assert_eq!(clinic.doctor_name("404"), "CRM 404 (doctor not found)");
    }

    #[test]
    fn doctors_sorted_by_name() {
        let (_dir, mut clinic) = setup();
        clinic.register_doctor("333", "Dr. Almeida").unwrap();
        let names: Vec<_> = clinic
            .doctors_by_name()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["Dr. Almeida", "Dr. Silva", "Dr. Souza"]);
    }

    #[test]
    fn reload_reads_external_changes() {
        let (_dir, mut clinic) = setup();
        clinic
            .schedule(ANA, "111", d("2099-01-10"), t("09:00"), today())
            .unwrap();
        fs::write(
            &clinic.paths().appointments,
            "Date,Time,PatientCPF,DoctorCode,Status\n\
             2099-01-10,09:00,11122233344,111,CANCELLED\n\
             not,a,valid,line,at all\n",
        )
        .unwrap();

        let warnings = clinic.reload_appointments(now());
        assert_eq!(warnings.len(), 1);
        assert_eq!(clinic.appointments()[0].status, AppointmentStatus::Cancelled);
    }
}
