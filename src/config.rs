use std::path::{Path, PathBuf};

/// Application-level constants
pub const APP_NAME: &str = "Clinic Desk";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "CLINIC_DESK_HOME";

pub const DOCTORS_FILE: &str = "doctors.csv";
pub const PATIENTS_FILE: &str = "patients.csv";
pub const APPOINTMENTS_FILE: &str = "appointments.csv";

/// Get the application data directory.
/// `$CLINIC_DESK_HOME` when set, otherwise ~/ClinicDesk/, otherwise the
/// current directory (no home on some service accounts).
pub fn app_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join("ClinicDesk"),
        None => PathBuf::from("."),
    }
}

/// Filter directive used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "clinic_desk=info"
}

/// Locations of the three record files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub doctors: PathBuf,
    pub patients: PathBuf,
    pub appointments: PathBuf,
}

impl DataPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            doctors: dir.join(DOCTORS_FILE),
            patients: dir.join(PATIENTS_FILE),
            appointments: dir.join(APPOINTMENTS_FILE),
        }
    }
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::in_dir(&app_data_dir())
    }
}
