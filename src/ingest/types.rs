//! Event types produced from device log rows.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Device-local wall-clock time. Logs carry no timezone.
pub type Timestamp = NaiveDateTime;

/// The device and day a log file belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogSource {
    /// Device family, lower-cased (e.g. `hset`)
    pub device_type: String,
    pub device_id: String,
    pub date: NaiveDate,
}

impl LogSource {
    pub fn new(device_type: impl Into<String>, device_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            device_type: device_type.into().trim().to_lowercase(),
            device_id: device_id.into().trim().to_string(),
            date,
        }
    }

    /// `<device_type>_<device_id>`
    pub fn title(&self) -> String {
        format!("{}_{}", self.device_type, self.device_id)
    }

    /// `YYYY-MM-DD`
    pub fn date_key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

impl std::fmt::Display for LogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.title(), self.date_key())
    }
}

/// Classification of a log code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Opens a test session
    Start,
    /// Closes the open test session
    End,
    /// Instantaneous heart-rate reading
    Measurement,
    /// Device-native cumulative beat counter
    TotalBeats,
    /// Anything else; ignored downstream
    Other,
}

/// One unparsed log line. Empty fields are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    /// 1-based line number in the file
    pub line: usize,
    pub time: Option<String>,
    pub log_version: Option<String>,
    pub code: Option<String>,
    pub data1: Option<String>,
    pub data2: Option<String>,
    pub data3: Option<String>,
    /// Set when the row's bytes are not valid UTF-8; all fields are then empty
    pub bad_encoding: bool,
}

impl RawRow {
    /// Placeholder for a row whose bytes could not be decoded.
    pub fn undecodable(line: usize) -> Self {
        Self {
            line,
            bad_encoding: true,
            ..Self::default()
        }
    }

    /// Build a row from positional fields, treating blanks as missing.
    pub fn from_fields<'a, I>(line: usize, fields: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut it = fields.into_iter().map(|f| {
            let f = f.trim();
            (!f.is_empty()).then(|| f.to_string())
        });
        let mut next = || it.next().flatten();

        Self {
            line,
            time: next(),
            log_version: next(),
            code: next(),
            data1: next(),
            data2: next(),
            data3: next(),
            bad_encoding: false,
        }
    }
}

/// A parsed, classified log event.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub timestamp: Timestamp,
    /// The code as written in the log
    pub code: String,
    pub kind: EventKind,
    /// First data column, when numeric
    pub value: Option<f64>,
    /// Second data column (the rate unit for measurements)
    pub unit: Option<String>,
    pub log_version: String,
    /// Line the event came from
    pub line: usize,
    pub source: Arc<LogSource>,
}

impl RawEvent {
    pub fn device_type(&self) -> &str {
        &self.source.device_type
    }

    pub fn device_id(&self) -> &str {
        &self.source.device_id
    }
}
