//! Per-session rate-over-time series.
//!
//! Deduplicate -> normalize and cap -> fill gaps, then tag every sample
//! with the session's ongoing flag.

use crate::core::capper::{RateCapper, RatePoint};
use crate::core::dedup::first_wins;
use crate::core::gaps::GapFiller;
use crate::core::segmenter::TestSession;
use crate::core::totals::CounterReading;
use crate::ingest::Timestamp;
use serde::{Deserialize, Serialize};

/// One persisted rate row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSample {
    pub device_type: String,
    pub device_id: String,
    pub log_version: String,
    pub test_id: u32,
    pub time: Timestamp,
    /// Beats per second
    pub rate: f64,
    /// Session had no End code when the file was processed
    pub ongoing: bool,
    /// Zero point inserted after a gap
    pub synthetic: bool,
}

/// Deduplicated, capped measurement and counter sequences of a session.
#[derive(Debug, Clone, Default)]
pub struct CleanSeries {
    pub rates: Vec<RatePoint>,
    pub counters: Vec<CounterReading>,
    pub duplicates_dropped: usize,
    pub capped: usize,
}

pub struct RateSeriesBuilder<'a> {
    capper: RateCapper<'a>,
    gaps: GapFiller,
}

impl<'a> RateSeriesBuilder<'a> {
    pub fn new(capper: RateCapper<'a>, gaps: GapFiller) -> Self {
        Self { capper, gaps }
    }

    /// Deduplicate measurements and counter readings separately, then
    /// normalize and cap the measurements.
    pub fn clean(&self, session: &TestSession) -> CleanSeries {
        let measurements = first_wins(session.measurements());
        let counters = first_wins(session.counter_readings());

        let rates: Vec<RatePoint> = measurements
            .kept
            .iter()
            .filter_map(|e| self.capper.apply(e))
            .collect();
        let capped = rates.iter().filter(|p| p.capped).count();

        let readings = counters
            .kept
            .iter()
            .filter_map(|e| {
                e.value.map(|value| CounterReading {
                    time: e.timestamp,
                    value,
                })
            })
            .collect();

        CleanSeries {
            rates,
            counters: readings,
            duplicates_dropped: measurements.dropped + counters.dropped,
            capped,
        }
    }

    /// Final sample sequence for a session.
    pub fn build(&self, session: &TestSession, series: &CleanSeries) -> Vec<RateSample> {
        let ongoing = session.is_ongoing();

        self.gaps
            .fill(&series.rates)
            .into_iter()
            .map(|point| RateSample {
                device_type: session.source.device_type.clone(),
                device_id: session.source.device_id.clone(),
                log_version: session.log_version.clone(),
                test_id: session.test_id,
                time: point.time,
                rate: point.rate,
                ongoing,
                synthetic: point.synthetic,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::core::segmenter::{TestIdSequence, TestSegmenter};
    use crate::ingest::{EventKind, LogSource, RawEvent};
    use chrono::{Duration, NaiveDate};
    use std::sync::Arc;

    fn session(events: &[(EventKind, u32, f64)]) -> TestSession {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let source = Arc::new(LogSource::new("hset", "001", date));
        let events = events
            .iter()
            .map(|&(kind, second, value)| RawEvent {
                timestamp: date.and_hms_opt(0, 0, second).unwrap(),
                code: String::new(),
                kind,
                value: Some(value),
                unit: Some("s".to_string()),
                log_version: "v1".to_string(),
                line: 0,
                source: Arc::clone(&source),
            })
            .collect();
        TestSegmenter::new(TestIdSequence::default())
            .segment(events)
            .sessions
            .remove(0)
    }

    #[test]
    fn test_clean_counts_duplicates_and_caps() {
        let config = EngineConfig::default();
        let capper = RateCapper::for_device(&config, "hset").unwrap();
        let builder = RateSeriesBuilder::new(capper, GapFiller::new(config.max_gap));

        let s = session(&[
            (EventKind::Start, 0, 0.0),
            (EventKind::Measurement, 10, 3.0),
            (EventKind::Measurement, 10, 4.0),
            (EventKind::TotalBeats, 10, 30.0),
            (EventKind::TotalBeats, 10, 31.0),
            (EventKind::Measurement, 20, 9.0),
            (EventKind::End, 30, 0.0),
        ]);
        let clean = builder.clean(&s);

        assert_eq!(clean.rates.len(), 2);
        assert_eq!(clean.rates[0].rate, 3.0);
        assert_eq!(clean.rates[1].rate, 5.0);
        assert_eq!(clean.capped, 1);
        assert_eq!(clean.counters.len(), 1);
        assert_eq!(clean.counters[0].value, 30.0);
        assert_eq!(clean.duplicates_dropped, 2);
    }

    #[test]
    fn test_build_tags_ongoing_and_synthetic() {
        let config = EngineConfig::default();
        let capper = RateCapper::for_device(&config, "hset").unwrap();
        let builder = RateSeriesBuilder::new(capper, GapFiller::new(Duration::seconds(20)));

        let s = session(&[
            (EventKind::Start, 0, 0.0),
            (EventKind::Measurement, 0, 2.0),
            (EventKind::Measurement, 30, 2.0),
        ]);
        let clean = builder.clean(&s);
        let samples = builder.build(&s, &clean);

        assert_eq!(samples.len(), 3);
        assert!(samples.iter().all(|r| r.ongoing && r.test_id == 1));
        assert!(samples[1].synthetic);
        assert_eq!(samples[1].rate, 0.0);
        assert_eq!(samples[0].device_type, "hset");
    }
}
