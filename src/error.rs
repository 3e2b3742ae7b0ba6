//! Error and warning types shared across the engine and its collaborators.
//!
//! Row-level problems ([`MalformedRowError`]) are recovered locally and
//! counted. Session-level problems ([`UnboundedSessionWarning`]) are kept as
//! warnings. File-level problems ([`ImportError`]) let the caller skip just
//! that file and continue the batch.

use crate::config::ConfigError;
use crate::ingest::LogSource;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Why a single log row could not be turned into an event.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedReason {
    #[error("row is not valid UTF-8")]
    BadEncoding,
    #[error("missing timestamp")]
    MissingTimestamp,
    #[error("unparsable timestamp '{0}'")]
    BadTimestamp(String),
    #[error("missing code")]
    MissingCode,
    #[error("missing value")]
    MissingValue,
    #[error("non-numeric value '{0}'")]
    BadValue(String),
    #[error("unit '{0}' not in hr_param_dict")]
    UnknownUnit(String),
}

/// A log row that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("line {line}: {reason}")]
pub struct MalformedRowError {
    /// 1-based line number in the source file
    pub line: usize,
    pub reason: MalformedReason,
}

/// A session that never saw an End code. Tolerated and marked ongoing.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{device_type}_{device_id} {date}: test {test_id} started at {start_time} has no end code")]
pub struct UnboundedSessionWarning {
    pub device_type: String,
    pub device_id: String,
    pub date: String,
    pub test_id: u32,
    pub start_time: NaiveDateTime,
}

/// The device+date of a file is already persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{device_type}_{device_id} {date} is already imported")]
pub struct DuplicateFileError {
    pub device_type: String,
    pub device_id: String,
    pub date: String,
}

impl DuplicateFileError {
    pub fn for_source(source: &LogSource) -> Self {
        Self {
            device_type: source.device_type.clone(),
            device_id: source.device_id.clone(),
            date: source.date_key(),
        }
    }
}

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store record {path:?} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Duplicate(#[from] DuplicateFileError),
}

/// File-level failures. The batch skips the file and carries on.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("{path:?}: file name must look like <DEVICE_TYPE>_<DEVICE_ID>_<DATE>.csv")]
    BadFileName { path: PathBuf },

    #[error("{path:?}: unrecognized device type '{device_type}'")]
    UnknownDevice { path: PathBuf, device_type: String },

    #[error("{path:?}: cannot read log: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path:?}: CSV error: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Duplicate(#[from] DuplicateFileError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ImportError {
    /// Whether the file was rejected because it was already imported.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            ImportError::Duplicate(_) | ImportError::Store(StoreError::Duplicate(_))
        )
    }
}
