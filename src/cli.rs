//! One-shot command line front end.
//!
//! Each invocation opens the clinic files, runs one subcommand and exits.
//! Appointments are addressed by their persisted tuple
//! (`--cpf --doctor --date --time`), which is resolved to a session id
//! through [`Clinic::find`].

use std::io::Write;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use thiserror::Error;

use crate::clinic::{Clinic, ClinicError};
use crate::config::{self, DataPaths};
use crate::models::{
    format_cpf, parse_date, parse_time, Appointment, AppointmentFilter, AppointmentId,
    AppointmentKey, AppointmentStatus, DATE_FORMAT, TIME_FORMAT,
};
use crate::reports;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Clinic(#[from] ClinicError),

    #[error("No appointment for CPF {cpf} with CRM {doctor} on {date} at {time}")]
    NoSuchAppointment {
        cpf: String,
        doctor: String,
        date: String,
        time: String,
    },

    #[error("Could not encode output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not write output: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "clinic-desk", version, about = "Appointment desk for a small clinic")]
pub struct Cli {
    /// Directory holding doctors.csv, patients.csv and appointments.csv.
    /// Defaults to $CLINIC_DESK_HOME, then ~/ClinicDesk.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage the doctor table
    #[command(subcommand)]
    Doctors(DoctorCommand),

    /// Manage the patient table
    #[command(subcommand)]
    Patients(PatientCommand),

    /// Book a new appointment
    Schedule(SlotArgs),

    /// Move an appointment to another slot
    Reschedule {
        #[command(flatten)]
        slot: SlotArgs,
        #[arg(long, value_parser = date_arg)]
        new_date: NaiveDate,
        #[arg(long, value_parser = time_arg)]
        new_time: NaiveTime,
    },

    /// Cancel an appointment
    Cancel(SlotArgs),

    /// Confirm a patient showed up for a pending appointment
    Confirm(SlotArgs),

    /// A patient's pending appointments, soonest first
    Upcoming {
        #[arg(long)]
        cpf: String,
        #[arg(long)]
        json: bool,
    },

    /// A patient's past visits, most recent first
    History {
        #[arg(long)]
        cpf: String,
        #[arg(long)]
        json: bool,
    },

    /// A doctor's appointments over a date range
    Agenda {
        #[arg(long)]
        doctor: String,
        /// First day, inclusive. Defaults to today.
        #[arg(long, value_parser = date_arg)]
        from: Option<NaiveDate>,
        /// Last day, inclusive. Defaults to `--from`.
        #[arg(long, value_parser = date_arg)]
        to: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },

    /// Every patient a doctor has appointments with
    PatientsOf {
        #[arg(long)]
        doctor: String,
        #[arg(long)]
        json: bool,
    },

    /// Patients with no recent visit to a doctor
    Inactive {
        #[arg(long)]
        doctor: String,
        #[arg(long, default_value_t = 6)]
        months: u32,
        #[arg(long)]
        json: bool,
    },

    /// Appointments matching every given criterion
    List {
        #[arg(long)]
        cpf: Option<String>,
        #[arg(long)]
        doctor: Option<String>,
        #[arg(long, value_parser = date_arg)]
        from: Option<NaiveDate>,
        #[arg(long, value_parser = date_arg)]
        to: Option<NaiveDate>,
        #[arg(long, value_parser = status_arg)]
        status: Option<AppointmentStatus>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum DoctorCommand {
    /// Alphabetical listing
    List {
        #[arg(long)]
        json: bool,
    },
    Add {
        #[arg(long)]
        crm: String,
        #[arg(long)]
        name: String,
    },
    Rename {
        #[arg(long)]
        crm: String,
        #[arg(long)]
        name: String,
    },
    /// Mark a doctor as removed; the record is kept
    Remove {
        #[arg(long)]
        crm: String,
    },
    /// Undo a removal
    Reintegrate {
        #[arg(long)]
        crm: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum PatientCommand {
    List {
        #[arg(long)]
        json: bool,
    },
    Add {
        #[arg(long)]
        cpf: String,
        #[arg(long)]
        name: String,
    },
    Rename {
        #[arg(long)]
        cpf: String,
        #[arg(long)]
        name: String,
    },
    /// Delete a patient record; their appointments are kept
    Remove {
        #[arg(long)]
        cpf: String,
    },
}

/// The persisted identity of one appointment.
#[derive(Args, Debug, Clone)]
pub struct SlotArgs {
    #[arg(long)]
    pub cpf: String,
    /// Doctor CRM
    #[arg(long)]
    pub doctor: String,
    #[arg(long, value_parser = date_arg)]
    pub date: NaiveDate,
    #[arg(long, value_parser = time_arg)]
    pub time: NaiveTime,
}

impl SlotArgs {
    fn key(&self) -> AppointmentKey {
        AppointmentKey {
            date: self.date,
            time: self.time,
            patient_cpf: self.cpf.trim().to_string(),
            doctor_code: self.doctor.trim().to_string(),
        }
    }
}

fn date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).map_err(|e| format!("expected YYYY-MM-DD ({e})"))
}

fn time_arg(s: &str) -> Result<NaiveTime, String> {
    parse_time(s).map_err(|e| format!("expected HH:MM ({e})"))
}

fn status_arg(s: &str) -> Result<AppointmentStatus, String> {
    s.trim()
        .to_uppercase()
        .parse::<AppointmentStatus>()
        .map_err(|e| format!("{e}"))
}

/// Flattened appointment for listings, with names resolved.
#[derive(Debug, Serialize)]
struct AppointmentRow {
    date: String,
    time: String,
    patient_cpf: String,
    patient_name: Option<String>,
    doctor_code: String,
    doctor_name: String,
    status: AppointmentStatus,
}

impl AppointmentRow {
    fn new(clinic: &Clinic, appt: &Appointment) -> Self {
        Self {
            date: appt.date.format(DATE_FORMAT).to_string(),
            time: appt.time.format(TIME_FORMAT).to_string(),
            patient_cpf: appt.patient_cpf.clone(),
            patient_name: clinic.patient_name(&appt.patient_cpf).map(str::to_string),
            doctor_code: appt.doctor_code.clone(),
            doctor_name: clinic.doctor_name(&appt.doctor_code),
            status: appt.status,
        }
    }
}

fn describe(clinic: &Clinic, appt: &Appointment) -> String {
    let patient = clinic
        .patient_name(&appt.patient_cpf)
        .map(str::to_string)
        .unwrap_or_else(|| format!("CPF {}", format_cpf(&appt.patient_cpf)));
    format!(
        "{} | {} | {} | {}",
        appt.formatted_date_time(),
        clinic.doctor_name(&appt.doctor_code),
        patient,
        appt.status.label()
    )
}

fn print_appointments(
    out: &mut dyn Write,
    clinic: &Clinic,
    list: &[&Appointment],
    json: bool,
    empty: &str,
) -> Result<(), CliError> {
    if json {
        let rows: Vec<AppointmentRow> = list
            .iter()
            .map(|a| AppointmentRow::new(clinic, a))
            .collect();
        writeln!(out, "{}", serde_json::to_string_pretty(&rows)?)?;
        return Ok(());
    }
    if list.is_empty() {
        writeln!(out, "{empty}")?;
    }
    for appt in list {
        writeln!(out, "{}", describe(clinic, appt))?;
    }
    Ok(())
}

fn resolve(clinic: &Clinic, slot: &SlotArgs) -> Result<AppointmentId, CliError> {
    clinic
        .find(&slot.key())
        .ok_or_else(|| CliError::NoSuchAppointment {
            cpf: slot.cpf.clone(),
            doctor: slot.doctor.clone(),
            date: slot.date.format(DATE_FORMAT).to_string(),
            time: slot.time.format(TIME_FORMAT).to_string(),
        })
}

impl Cli {
    pub fn data_paths(&self) -> DataPaths {
        match &self.data_dir {
            Some(dir) => DataPaths::in_dir(dir),
            None => DataPaths::default(),
        }
    }
}

/// Opens the clinic and runs one subcommand against it.
pub fn execute(cli: Cli, now: NaiveDateTime, out: &mut dyn Write) -> Result<(), CliError> {
    let paths = cli.data_paths();
    tracing::debug!(dir = ?paths.appointments.parent(), "Opening {}", config::APP_NAME);
    let (mut clinic, warnings) = Clinic::open(paths, now);
    if !warnings.is_empty() {
        tracing::warn!(
            doctors = warnings.doctors.len(),
            patients = warnings.patients.len(),
            appointments = warnings.appointments.len(),
            "Some records could not be read"
        );
    }
    let today = now.date();

    match cli.command {
        Command::Doctors(cmd) => run_doctors(&mut clinic, cmd, out),
        Command::Patients(cmd) => run_patients(&mut clinic, cmd, out),

        Command::Schedule(slot) => {
            let appt = clinic.schedule(&slot.cpf, &slot.doctor, slot.date, slot.time, today)?;
            writeln!(out, "Scheduled: {}", describe(&clinic, &appt))?;
            Ok(())
        }
        Command::Reschedule {
            slot,
            new_date,
            new_time,
        } => {
            let id = resolve(&clinic, &slot)?;
            let appt = clinic.reschedule(id, new_date, new_time, today)?;
            writeln!(out, "Rescheduled: {}", describe(&clinic, &appt))?;
            Ok(())
        }
        Command::Cancel(slot) => {
            let id = resolve(&clinic, &slot)?;
            let appt = clinic.cancel(id)?;
            writeln!(out, "Cancelled: {}", describe(&clinic, &appt))?;
            Ok(())
        }
        Command::Confirm(slot) => {
            let id = resolve(&clinic, &slot)?;
            let appt = clinic.confirm_presence(id)?;
            writeln!(out, "Presence confirmed: {}", describe(&clinic, appt))?;
            Ok(())
        }

        Command::Upcoming { cpf, json } => {
            let list = reports::upcoming_for_patient(clinic.appointments(), &cpf);
            print_appointments(out, &clinic, &list, json, "No upcoming appointments.")
        }
        Command::History { cpf, json } => {
            let list = reports::history_for_patient(clinic.appointments(), &cpf, now);
            print_appointments(out, &clinic, &list, json, "No past visits.")
        }
        Command::Agenda {
            doctor,
            from,
            to,
            json,
        } => {
            let start = from.unwrap_or(today);
            let end = to.unwrap_or(start);
            let list = reports::doctor_agenda(clinic.appointments(), &doctor, start, end);
            print_appointments(out, &clinic, &list, json, "No appointments in this period.")
        }
        Command::PatientsOf { doctor, json } => {
            let cpfs = reports::patients_of_doctor(clinic.appointments(), &doctor);
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&cpfs)?)?;
                return Ok(());
            }
            if cpfs.is_empty() {
                writeln!(out, "No patients for CRM {doctor}.")?;
            }
            for cpf in cpfs {
                let name = clinic.patient_name(cpf).unwrap_or("(not registered)");
                writeln!(out, "{}  {}", format_cpf(cpf), name)?;
            }
            Ok(())
        }
        Command::Inactive {
            doctor,
            months,
            json,
        } => {
            let inactive =
                reports::inactive_patients(clinic.appointments(), &doctor, months, today);
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&inactive)?)?;
                return Ok(());
            }
            if inactive.is_empty() {
                writeln!(out, "No inactive patients over {months} months.")?;
            }
            for p in inactive {
                let last = p
                    .last_visit
                    .map(|d| d.format("%d/%m/%Y").to_string())
                    .unwrap_or_else(|| "never".to_string());
                let name = clinic.patient_name(&p.cpf).unwrap_or("(not registered)");
                writeln!(out, "{}  {}  last visit: {}", format_cpf(&p.cpf), name, last)?;
            }
            Ok(())
        }
        Command::List {
            cpf,
            doctor,
            from,
            to,
            status,
            json,
        } => {
            let criteria = AppointmentFilter {
                patient_cpf: cpf,
                doctor_code: doctor,
                date_from: from,
                date_to: to,
                status,
            };
            let list = reports::filter(clinic.appointments(), &criteria);
            print_appointments(out, &clinic, &list, json, "No matching appointments.")
        }
    }
}

fn run_doctors(
    clinic: &mut Clinic,
    cmd: DoctorCommand,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    match cmd {
        DoctorCommand::List { json } => {
            let doctors = clinic.doctors_by_name();
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&doctors)?)?;
                return Ok(());
            }
            for d in doctors {
                writeln!(out, "{}  {}", d.code, d.name)?;
            }
        }
        DoctorCommand::Add { crm, name } => {
            let d = clinic.register_doctor(&crm, &name)?;
            writeln!(out, "Registered doctor {} (CRM {})", d.name, d.code)?;
        }
        DoctorCommand::Rename { crm, name } => {
            let d = clinic.rename_doctor(&crm, &name)?;
            writeln!(out, "Doctor {} is now {}", d.code, d.name)?;
        }
        DoctorCommand::Remove { crm } => {
            let d = clinic.remove_doctor(&crm)?;
            writeln!(out, "Removed: {}", d.name)?;
        }
        DoctorCommand::Reintegrate { crm } => {
            let d = clinic.reintegrate_doctor(&crm)?;
            writeln!(out, "Reintegrated: {}", d.name)?;
        }
    }
    Ok(())
}

fn run_patients(
    clinic: &mut Clinic,
    cmd: PatientCommand,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    match cmd {
        PatientCommand::List { json } => {
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(clinic.patients())?)?;
                return Ok(());
            }
            for p in clinic.patients() {
                writeln!(out, "{p}")?;
            }
        }
        PatientCommand::Add { cpf, name } => {
            let p = clinic.register_patient(&cpf, &name)?;
            writeln!(out, "Registered {p}")?;
        }
        PatientCommand::Rename { cpf, name } => {
            let p = clinic.rename_patient(&cpf, &name)?;
            writeln!(out, "Renamed {p}")?;
        }
        PatientCommand::Remove { cpf } => {
            let p = clinic.remove_patient(&cpf)?;
            writeln!(out, "Removed {p}")?;
        }
    }
    Ok(())
}
