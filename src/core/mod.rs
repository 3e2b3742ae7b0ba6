//! Reconstruction pipeline.
//!
//! This module contains:
//! - Session segmentation from start/end codes
//! - First-wins deduplication, unit normalization and rate ceilings
//! - Gap filling into the final rate series
//! - Hourly total-beat aggregation with completeness labels
//! - The per-file [`Engine`] that runs all of the above

pub mod capper;
pub mod dedup;
pub mod engine;
pub mod gaps;
pub mod rate;
pub mod segmenter;
pub mod totals;

pub use capper::{RateCapper, RatePoint};
pub use dedup::{first_wins, Deduped};
pub use engine::{Engine, FileAnalysis, FileReport, SessionSummary};
pub use gaps::{GapFiller, SeriesPoint};
pub use rate::{CleanSeries, RateSample, RateSeriesBuilder};
pub use segmenter::{Segmentation, SessionClose, TestIdSequence, TestSegmenter, TestSession};
pub use totals::{hour_floor, CounterReading, HourlyTotals, TotalBeatsAggregator, TotalBeatsSample};
