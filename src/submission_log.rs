use serde::{Deserialize, Serialize};
use std::{
    fs::OpenOptions,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};
use time::{macros::format_description, OffsetDateTime};

use crate::card::CardRequest;
use crate::error::{ContextError, ErrorKind};

/// One row of the submissions log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    #[serde(rename = "Full Name")]
    pub full_name: String,
    #[serde(rename = "Role")]
    pub role: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Contact Number")]
    pub contact_number: String,
    /// Local time of the submission, formatted as `YYYY-MM-DD HH:MM:SS`.
    #[serde(rename = "Submission Time")]
    pub submission_time: String,
}

impl SubmissionRecord {
    pub fn new(request: &CardRequest, submission_time: String) -> Self {
        SubmissionRecord {
            full_name: request.name.clone(),
            role: request.role.clone(),
            email: request.email.clone(),
            contact_number: request.phone.clone(),
            submission_time,
        }
    }
}

/// An append-only CSV file with one row per submitted card request. The header is written when
/// the file is empty and every append opens, writes and closes the file again.
#[derive(Debug)]
pub struct SubmissionLog {
    path: PathBuf,
    /// Serializes the appends of this process, so that rows are never interleaved and their
    /// timestamps are non-decreasing in file order.
    append_lock: Mutex<()>,
}

impl SubmissionLog {
    pub fn new(path: PathBuf) -> Self {
        SubmissionLog {
            path,
            append_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Timestamps the request and appends it to the log, returning the written record.
    pub fn append(&self, request: &CardRequest) -> Result<SubmissionRecord, ContextError> {
        let _append_guard = self
            .append_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let record = SubmissionRecord::new(request, current_timestamp()?);

        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|error| self.io_error("Failed to open", &error))?;
        let is_empty = log_file
            .metadata()
            .map_err(|error| self.io_error("Failed to inspect", &error))?
            .len()
            == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_empty)
            .from_writer(log_file);
        writer
            .serialize(&record)
            .map_err(|error| self.io_error("Failed to write to", &error))?;
        writer
            .flush()
            .map_err(|error| self.io_error("Failed to flush", &error))?;

        Ok(record)
    }

    /// Reads every record which has been logged so far.
    pub fn records(&self) -> Result<Vec<SubmissionRecord>, ContextError> {
        csv::Reader::from_path(&self.path)
            .map_err(|error| self.io_error("Failed to open", &error))?
            .deserialize()
            .collect::<Result<Vec<SubmissionRecord>, _>>()
            .map_err(|error| self.io_error("Failed to read", &error))
    }

    fn io_error(&self, action: &str, error: &dyn std::error::Error) -> ContextError {
        ContextError::with_error(
            format!("{} the submissions log {:?}", action, self.path),
            error,
        )
        .of_kind(ErrorKind::Io)
    }
}

/// The current local time as `YYYY-MM-DD HH:MM:SS`, falling back to UTC when the local offset
/// cannot be determined (which is always the case in multi-threaded processes on some platforms).
fn current_timestamp() -> Result<String, ContextError> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
    .map_err(|error| ContextError::with_error("Failed to format the submission time", &error))
}
