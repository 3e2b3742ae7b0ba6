//! Import statistics.
//!
//! Counters are atomic so every batch worker can record into one shared
//! instance. Cumulative totals can be persisted between runs.

use crate::core::FileAnalysis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for one or more import runs.
#[derive(Debug)]
pub struct ImportStats {
    files_imported: AtomicU64,
    /// Files whose device+date was already stored
    files_duplicate: AtomicU64,
    files_failed: AtomicU64,
    rows_read: AtomicU64,
    rows_malformed: AtomicU64,
    sessions: AtomicU64,
    rate_samples: AtomicU64,
    total_beat_rows: AtomicU64,
    run_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl ImportStats {
    pub fn new() -> Self {
        Self {
            files_imported: AtomicU64::new(0),
            files_duplicate: AtomicU64::new(0),
            files_failed: AtomicU64::new(0),
            rows_read: AtomicU64::new(0),
            rows_malformed: AtomicU64::new(0),
            sessions: AtomicU64::new(0),
            rate_samples: AtomicU64::new(0),
            total_beat_rows: AtomicU64::new(0),
            run_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Stats that start from (and save back to) the totals at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            tracing::warn!("could not load previous import stats: {e}");
        }

        stats
    }

    /// Record a committed file.
    pub fn record_imported(&self, analysis: &FileAnalysis) {
        let report = &analysis.report;
        self.files_imported.fetch_add(1, Ordering::Relaxed);
        self.rows_read
            .fetch_add(report.rows_read as u64, Ordering::Relaxed);
        self.rows_malformed
            .fetch_add(report.malformed.len() as u64, Ordering::Relaxed);
        self.sessions
            .fetch_add(report.sessions as u64, Ordering::Relaxed);
        self.rate_samples
            .fetch_add(analysis.rate_samples.len() as u64, Ordering::Relaxed);
        self.total_beat_rows
            .fetch_add(analysis.total_beats.len() as u64, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.files_duplicate.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            files_imported: self.files_imported.load(Ordering::Relaxed),
            files_duplicate: self.files_duplicate.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            rows_read: self.rows_read.load(Ordering::Relaxed),
            rows_malformed: self.rows_malformed.load(Ordering::Relaxed),
            sessions: self.sessions.load(Ordering::Relaxed),
            rate_samples: self.rate_samples.load(Ordering::Relaxed),
            total_beat_rows: self.total_beat_rows.load(Ordering::Relaxed),
            run_start: self.run_start,
        }
    }

    /// Text block for the CLI.
    pub fn summary(&self) -> String {
        let s = self.snapshot();
        format!(
            "Import Statistics:\n\
             - Files imported: {}\n\
             - Files rejected as duplicates: {}\n\
             - Files failed: {}\n\
             - Rows read: {} ({} malformed)\n\
             - Test sessions: {}\n\
             - Rate samples: {}\n\
             - Hourly total-beat rows: {}",
            s.files_imported,
            s.files_duplicate,
            s.files_failed,
            s.rows_read,
            s.rows_malformed,
            s.sessions,
            s.rate_samples,
            s.total_beat_rows
        )
    }

    /// Write cumulative totals, if persistence is enabled.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let s = self.snapshot();
        let persisted = PersistedStats {
            files_imported: s.files_imported,
            files_duplicate: s.files_duplicate,
            files_failed: s.files_failed,
            rows_read: s.rows_read,
            rows_malformed: s.rows_malformed,
            sessions: s.sessions,
            rate_samples: s.rate_samples,
            total_beat_rows: s.total_beat_rows,
            last_updated: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(path)?;
        let p: PersistedStats = serde_json::from_str(&content).map_err(std::io::Error::other)?;
        self.files_imported.store(p.files_imported, Ordering::Relaxed);
        self.files_duplicate.store(p.files_duplicate, Ordering::Relaxed);
        self.files_failed.store(p.files_failed, Ordering::Relaxed);
        self.rows_read.store(p.rows_read, Ordering::Relaxed);
        self.rows_malformed.store(p.rows_malformed, Ordering::Relaxed);
        self.sessions.store(p.sessions, Ordering::Relaxed);
        self.rate_samples.store(p.rate_samples, Ordering::Relaxed);
        self.total_beat_rows.store(p.total_beat_rows, Ordering::Relaxed);
        Ok(())
    }
}

impl Default for ImportStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub files_imported: u64,
    pub files_duplicate: u64,
    pub files_failed: u64,
    pub rows_read: u64,
    pub rows_malformed: u64,
    pub sessions: u64,
    pub rate_samples: u64,
    pub total_beat_rows: u64,
    pub run_start: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    files_imported: u64,
    files_duplicate: u64,
    files_failed: u64,
    rows_read: u64,
    rows_malformed: u64,
    sessions: u64,
    rate_samples: u64,
    total_beat_rows: u64,
    last_updated: DateTime<Utc>,
}

/// Stats shared across batch workers.
pub type SharedImportStats = Arc<ImportStats>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let stats = ImportStats::new();
        stats.record_duplicate();
        stats.record_failed();
        stats.record_failed();

        let s = stats.snapshot();
        assert_eq!(s.files_duplicate, 1);
        assert_eq!(s.files_failed, 2);
        assert_eq!(s.files_imported, 0);
    }

    #[test]
    fn test_summary_format() {
        let summary = ImportStats::new().summary();
        assert!(summary.contains("Files imported: 0"));
        assert!(summary.contains("duplicates"));
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats").join("import_stats.json");

        let stats = ImportStats::with_persistence(path.clone());
        stats.record_duplicate();
        stats.save().unwrap();

        let reloaded = ImportStats::with_persistence(path);
        assert_eq!(reloaded.snapshot().files_duplicate, 1);
    }
}
