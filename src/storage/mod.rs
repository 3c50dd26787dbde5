//! Durable record files.
//!
//! One CSV file per record type, header line first. Loads never fail as a
//! whole: unreadable lines and I/O problems come back as [`LoadWarning`]s
//! next to whatever could be parsed. Writes either append one line or
//! replace the whole file.

pub mod appointments;
pub mod csv_file;
pub mod doctors;
pub mod patients;

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Could not replace {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A line (or the whole file, when `line` is `None`) that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadWarning {
    pub line: Option<u64>,
    pub reason: String,
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {line}: {}", self.reason),
            None => f.write_str(&self.reason),
        }
    }
}

#[derive(Debug)]
pub struct LoadReport<T> {
    pub records: Vec<T>,
    pub warnings: Vec<LoadWarning>,
}

impl<T> LoadReport<T> {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            warnings: Vec::new(),
        }
    }
}
