//! Persistence of analyzed files.
//!
//! A store keeps one record per device+date. Committing a device+date that
//! is already present fails with [`DuplicateFileError`](crate::error::DuplicateFileError);
//! files are rejected, never merged.

pub mod json;
pub mod memory;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

use crate::core::{FileAnalysis, FileReport, RateSample, SessionSummary, TotalBeatsSample};
use crate::error::StoreError;
use crate::ingest::LogSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a store holds for one device+date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub source: LogSource,
    /// Identifies the import run that committed this record
    pub run_id: Uuid,
    pub imported_at: DateTime<Utc>,
    pub sessions: Vec<SessionSummary>,
    pub rate_samples: Vec<RateSample>,
    pub total_beats: Vec<TotalBeatsSample>,
    pub report: FileReport,
}

impl StoredFile {
    pub fn from_analysis(analysis: &FileAnalysis) -> Self {
        Self {
            source: analysis.source.clone(),
            run_id: Uuid::new_v4(),
            imported_at: Utc::now(),
            sessions: analysis.sessions.clone(),
            rate_samples: analysis.rate_samples.clone(),
            total_beats: analysis.total_beats.clone(),
            report: analysis.report.clone(),
        }
    }
}

/// Storage seam between the batch importer and wherever samples end up.
pub trait SampleStore: Send + Sync {
    /// Whether this device+date has already been committed.
    fn contains(&self, source: &LogSource) -> Result<bool, StoreError>;

    /// Persist all rows of one file, or nothing.
    fn commit(&self, analysis: &FileAnalysis) -> Result<StoredFile, StoreError>;

    /// Every stored device+date, sorted.
    fn sources(&self) -> Result<Vec<LogSource>, StoreError>;

    fn load(&self, source: &LogSource) -> Result<Option<StoredFile>, StoreError>;
}

/// Sort key used by every store listing.
fn source_order(source: &LogSource) -> (String, String, chrono::NaiveDate) {
    (
        source.device_type.clone(),
        source.device_id.clone(),
        source.date,
    )
}
