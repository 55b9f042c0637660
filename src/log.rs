//! Append-only open log.
//!
//! One fixed-column CSV row per accepted open, with the header written once
//! when the file is created. The log is best-effort by contract: an append
//! failure is reported to the caller, who records it for operators and moves
//! on — it never alters the response or suppresses the alert.
//!
//! Columns: `time_utc,track_id,subject_b64,subject,recipient,ip,user_agent,nonce`.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

use crate::types::OpenEvent;

/// CSV header, written exactly once per file.
const HEADER: &str = "time_utc,track_id,subject_b64,subject,recipient,ip,user_agent,nonce\n";

/// Timestamp format used in the `time_utc` column.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors that can occur during open log operations.
#[derive(Debug, Error)]
pub enum OpenLogError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for open log operations.
pub type Result<T> = std::result::Result<T, OpenLogError>;

/// An append-only CSV log of accepted opens.
///
/// The file handle is opened once and held for the process lifetime; a mutex
/// serializes appends so concurrent accepts never interleave rows.
#[derive(Debug)]
pub struct OpenLog {
    file: Mutex<File>,
    path: PathBuf,
}

impl OpenLog {
    /// Opens (or creates) the log at `path`, writing the header if the file
    /// is new or empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        if file.metadata()?.len() == 0 {
            file.write_all(HEADER.as_bytes())?;
            file.flush()?;
        }

        Ok(OpenLog {
            file: Mutex::new(file),
            path,
        })
    }

    /// Appends one row for an accepted event.
    pub fn append(&self, event: &OpenEvent) -> Result<()> {
        let row = format_row(event);
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(row.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Formats one CSV row. The whole row is built before any write so a row is
/// appended with a single `write_all`.
fn format_row(event: &OpenEvent) -> String {
    let mut row = String::new();
    let fields = [
        event.observed_at.format(TIME_FORMAT).to_string(),
        event.track_id.to_string(),
        event.subject_b64.clone(),
        event.subject.clone(),
        event.recipient.clone(),
        event.source_ip.clone(),
        event.user_agent.clone(),
        event.nonce.to_string(),
    ];
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            row.push(',');
        }
        row.push_str(&escape_field(field));
    }
    row.push('\n');
    row
}

/// Quotes a CSV field when it contains a delimiter, quote, or line break.
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
