//! Hourly total-beat buckets.
//!
//! Two sources feed a bucket:
//! - **Counter**: device-native cumulative readings, interpolated linearly
//!   between readings. Inside `[first reading, last reading]` the counter is
//!   authoritative and no estimate is added.
//! - **Derived**: outside the counter span, each measurement holds its rate
//!   until the next measurement (or the session end). Spans longer than the
//!   gap threshold are rate x elapsed extrapolations.
//!
//! A bucket is complete when real events cover minute 0 through minute 59
//! with no gap above the threshold.

use crate::core::rate::CleanSeries;
use crate::core::segmenter::TestSession;
use crate::ingest::Timestamp;
use chrono::{Duration, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A device-native cumulative beat reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterReading {
    pub time: Timestamp,
    pub value: f64,
}

/// One persisted hourly row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalBeatsSample {
    pub device_type: String,
    pub device_id: String,
    pub log_version: String,
    pub test_id: u32,
    /// Start of the hour
    pub hour_bucket: Timestamp,
    /// `counter_beats + derived_beats`
    pub total_beats: f64,
    pub counter_beats: f64,
    pub derived_beats: f64,
    pub is_hour_complete: bool,
    pub ongoing: bool,
    /// First real event inside the hour
    pub first_event: Option<Timestamp>,
    /// Last real event inside the hour
    pub last_event: Option<Timestamp>,
}

/// Buckets for one session.
#[derive(Debug, Clone, Default)]
pub struct HourlyTotals {
    pub samples: Vec<TotalBeatsSample>,
    /// Seconds credited by rate x elapsed extrapolation over long silences
    pub extrapolated_secs: f64,
}

#[derive(Debug, Default)]
struct Bucket {
    counter_beats: f64,
    derived_beats: f64,
    events: Vec<Timestamp>,
}

impl Bucket {
    /// An hour with no event of its own is only kept if beats landed in it.
    fn holds_anything(&self) -> bool {
        !self.events.is_empty() || self.counter_beats + self.derived_beats > 0.0
    }
}

pub struct TotalBeatsAggregator {
    max_gap: Duration,
}

impl TotalBeatsAggregator {
    pub fn new(max_gap: Duration) -> Self {
        Self { max_gap }
    }

    pub fn aggregate(&self, session: &TestSession, series: &CleanSeries) -> HourlyTotals {
        let mut buckets: BTreeMap<Timestamp, Bucket> = BTreeMap::new();

        let real_events = series
            .rates
            .iter()
            .map(|p| p.time)
            .chain(series.counters.iter().map(|c| c.time));
        for time in real_events {
            buckets.entry(hour_floor(time)).or_default().events.push(time);
        }

        for pair in series.counters.windows(2) {
            let beats = counter_delta(pair[0].value, pair[1].value);
            let span = secs(pair[1].time - pair[0].time);
            for (hour, piece) in split_by_hour(pair[0].time, pair[1].time) {
                buckets.entry(hour).or_default().counter_beats += beats * piece / span;
            }
        }

        let covered = match (series.counters.first(), series.counters.last()) {
            (Some(first), Some(last)) => Some((first.time, last.time)),
            _ => None,
        };
        let session_end = session.effective_end();
        let mut extrapolated_secs = 0.0;

        for (i, point) in series.rates.iter().enumerate() {
            let span_end = series
                .rates
                .get(i + 1)
                .map(|next| next.time)
                .unwrap_or(session_end);
            if span_end <= point.time {
                continue;
            }
            let extrapolated = span_end - point.time > self.max_gap;

            for (from, to) in uncovered(point.time, span_end, covered) {
                for (hour, piece) in split_by_hour(from, to) {
                    buckets.entry(hour).or_default().derived_beats += point.rate * piece;
                    if extrapolated {
                        extrapolated_secs += piece;
                    }
                }
            }
        }

        let ongoing = session.is_ongoing();
        let samples = buckets
            .into_iter()
            .filter(|(_, bucket)| bucket.holds_anything())
            .map(|(hour, mut bucket)| {
                bucket.events.sort();
                TotalBeatsSample {
                    device_type: session.source.device_type.clone(),
                    device_id: session.source.device_id.clone(),
                    log_version: session.log_version.clone(),
                    test_id: session.test_id,
                    hour_bucket: hour,
                    total_beats: bucket.counter_beats + bucket.derived_beats,
                    counter_beats: bucket.counter_beats,
                    derived_beats: bucket.derived_beats,
                    is_hour_complete: self.is_complete(&bucket.events),
                    ongoing,
                    first_event: bucket.events.first().copied(),
                    last_event: bucket.events.last().copied(),
                }
            })
            .collect();

        HourlyTotals {
            samples,
            extrapolated_secs,
        }
    }

    /// Sorted events inside one hour span minute 0 to minute 59 without gaps.
    fn is_complete(&self, events: &[Timestamp]) -> bool {
        match (events.first(), events.last()) {
            (Some(first), Some(last)) => {
                first.minute() == 0
                    && last.minute() == 59
                    && events.windows(2).all(|w| w[1] - w[0] <= self.max_gap)
            }
            _ => false,
        }
    }
}

/// Beats between two counter readings. A drop means the device counter was
/// reset, so the later reading is the count since the reset.
fn counter_delta(previous: f64, current: f64) -> f64 {
    if current >= previous {
        current - previous
    } else {
        current
    }
}

/// Parts of `[from, to)` outside the counter-covered span.
fn uncovered(
    from: Timestamp,
    to: Timestamp,
    covered: Option<(Timestamp, Timestamp)>,
) -> Vec<(Timestamp, Timestamp)> {
    let Some((start, end)) = covered else {
        return vec![(from, to)];
    };

    let mut pieces = Vec::with_capacity(2);
    let before_end = to.min(start);
    if from < before_end {
        pieces.push((from, before_end));
    }
    let after_start = from.max(end);
    if after_start < to {
        pieces.push((after_start, to));
    }
    pieces
}

/// Split `[from, to)` at hour boundaries into (hour, seconds) pieces.
fn split_by_hour(from: Timestamp, to: Timestamp) -> Vec<(Timestamp, f64)> {
    let mut pieces = Vec::new();
    let mut cursor = from;
    while cursor < to {
        let hour = hour_floor(cursor);
        let piece_end = to.min(hour + Duration::hours(1));
        pieces.push((hour, secs(piece_end - cursor)));
        cursor = piece_end;
    }
    pieces
}

/// Truncate a timestamp to the start of its hour.
pub fn hour_floor(time: Timestamp) -> Timestamp {
    time.date().and_time(NaiveTime::default()) + Duration::hours(i64::from(time.hour()))
}

fn secs(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 1000.0
}
