//! Runs the full reconstruction over one log file.

use crate::config::EngineConfig;
use crate::core::capper::RateCapper;
use crate::core::gaps::GapFiller;
use crate::core::rate::{RateSample, RateSeriesBuilder};
use crate::core::segmenter::{SessionClose, TestIdSequence, TestSegmenter};
use crate::core::totals::{TotalBeatsAggregator, TotalBeatsSample};
use crate::error::{ImportError, MalformedRowError, UnboundedSessionWarning};
use crate::ingest::{EventParser, LogFile, LogSource, RawRow, Timestamp};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Per-file counts of everything the engine kept, dropped or flagged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub rows_read: usize,
    pub malformed: Vec<MalformedRowError>,
    pub other_codes: usize,
    pub outside_session: usize,
    pub stray_ends: usize,
    pub duplicates_dropped: usize,
    pub capped_samples: usize,
    pub synthetic_samples: usize,
    pub sessions: usize,
    pub discarded_sessions: usize,
    pub warnings: Vec<UnboundedSessionWarning>,
    /// The optional third data column was blank on every row
    pub extra_column_empty: bool,
    pub extrapolated_secs: f64,
}

impl FileReport {
    /// Events that were read but never reached a session.
    pub fn ignored_events(&self) -> usize {
        self.other_codes + self.outside_session + self.stray_ends
    }
}

/// Shape of one emitted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub test_id: u32,
    pub log_version: String,
    pub start_time: Timestamp,
    pub end_time: Option<Timestamp>,
    pub closed_by: Option<SessionClose>,
    pub ongoing: bool,
    pub rate_samples: usize,
    pub hour_buckets: usize,
}

/// Everything produced from one device+date log.
#[derive(Debug, Clone)]
pub struct FileAnalysis {
    pub source: LogSource,
    pub sessions: Vec<SessionSummary>,
    pub rate_samples: Vec<RateSample>,
    pub total_beats: Vec<TotalBeatsSample>,
    pub report: FileReport,
}

/// Reconstruction engine. Cheap to clone; one per worker.
#[derive(Debug, Clone)]
pub struct Engine {
    config: Arc<EngineConfig>,
}

impl Engine {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Analyze a file that has already been read.
    pub fn process(&self, file: &LogFile) -> Result<FileAnalysis, ImportError> {
        self.analyze(file.path.clone(), file.source.clone(), &file.rows)
    }

    /// Analyze rows that did not come from disk.
    pub fn process_rows(
        &self,
        source: LogSource,
        rows: &[RawRow],
    ) -> Result<FileAnalysis, ImportError> {
        self.analyze(PathBuf::from(source.title()), source, rows)
    }

    fn analyze(
        &self,
        path: PathBuf,
        source: LogSource,
        rows: &[RawRow],
    ) -> Result<FileAnalysis, ImportError> {
        let capper = RateCapper::for_device(&self.config, &source.device_type).ok_or_else(|| {
            ImportError::UnknownDevice {
                path,
                device_type: source.device_type.clone(),
            }
        })?;
        let builder = RateSeriesBuilder::new(capper, GapFiller::new(self.config.max_gap));
        let aggregator = TotalBeatsAggregator::new(self.config.max_gap);

        let shared = Arc::new(source.clone());
        let parsed = EventParser::new(&self.config, shared).parse_rows(rows);
        let segmentation = TestSegmenter::new(TestIdSequence::default()).segment(parsed.events);

        let mut report = FileReport {
            rows_read: parsed.rows_read,
            malformed: parsed.malformed,
            other_codes: segmentation.other_codes,
            outside_session: segmentation.outside_session,
            stray_ends: segmentation.stray_ends,
            discarded_sessions: segmentation.discarded_sessions,
            warnings: segmentation.warnings,
            extra_column_empty: parsed.extra_column_empty,
            ..FileReport::default()
        };

        let mut sessions = Vec::with_capacity(segmentation.sessions.len());
        let mut rate_samples = Vec::new();
        let mut total_beats = Vec::new();

        for session in &segmentation.sessions {
            let series = builder.clean(session);
            let samples = builder.build(session, &series);
            let hourly = aggregator.aggregate(session, &series);

            report.duplicates_dropped += series.duplicates_dropped;
            report.capped_samples += series.capped;
            report.synthetic_samples += samples.iter().filter(|s| s.synthetic).count();
            report.extrapolated_secs += hourly.extrapolated_secs;

            sessions.push(SessionSummary {
                test_id: session.test_id,
                log_version: session.log_version.clone(),
                start_time: session.start_time,
                end_time: session.end_time,
                closed_by: session.closed_by,
                ongoing: session.is_ongoing(),
                rate_samples: samples.len(),
                hour_buckets: hourly.samples.len(),
            });
            rate_samples.extend(samples);
            total_beats.extend(hourly.samples);
        }
        report.sessions = sessions.len();

        if report.extra_column_empty && report.rows_read > 0 {
            tracing::debug!(%source, "log_data3 empty for every row; dropped");
        }
        tracing::info!(
            %source,
            rows = report.rows_read,
            malformed = report.malformed.len(),
            sessions = report.sessions,
            rate_samples = rate_samples.len(),
            hour_buckets = total_beats.len(),
            "analyzed log"
        );

        Ok(FileAnalysis {
            source,
            sessions,
            rate_samples,
            total_beats,
            report,
        })
    }
}
