//! Groups one file's events into bounded test sessions.
//!
//! A Start code opens a session, an End code closes it. A second Start while
//! a session is open force-closes the first at the new Start's timestamp.
//! A session still open at the end of the log is kept as ongoing.

use crate::error::UnboundedSessionWarning;
use crate::ingest::{EventKind, LogSource, RawEvent, Timestamp};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Sequential test ids for one device+date unit of work.
#[derive(Debug, Clone)]
pub struct TestIdSequence {
    next: u32,
}

impl TestIdSequence {
    pub fn starting_at(first: u32) -> Self {
        Self { next: first }
    }

    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl Default for TestIdSequence {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

/// How a session was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionClose {
    /// An End code was seen
    EndCode,
    /// Another Start code arrived first
    Restart,
}

/// One recording interval of a device.
#[derive(Debug, Clone)]
pub struct TestSession {
    pub test_id: u32,
    pub source: Arc<LogSource>,
    /// Log version of the Start event
    pub log_version: String,
    pub start_time: Timestamp,
    /// `None` while the session is open
    pub end_time: Option<Timestamp>,
    pub closed_by: Option<SessionClose>,
    /// Measurement and TotalBeats events, in time order
    pub events: Vec<RawEvent>,
}

impl TestSession {
    fn open(test_id: u32, start: &RawEvent) -> Self {
        Self {
            test_id,
            source: Arc::clone(&start.source),
            log_version: start.log_version.clone(),
            start_time: start.timestamp,
            end_time: None,
            closed_by: None,
            events: Vec::new(),
        }
    }

    fn close(&mut self, at: Timestamp, how: SessionClose) {
        self.end_time = Some(at);
        self.closed_by = Some(how);
    }

    /// No End code observed yet.
    pub fn is_ongoing(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn measurements(&self) -> impl Iterator<Item = &RawEvent> {
        self.events.iter().filter(|e| e.kind == EventKind::Measurement)
    }

    pub fn counter_readings(&self) -> impl Iterator<Item = &RawEvent> {
        self.events.iter().filter(|e| e.kind == EventKind::TotalBeats)
    }

    /// End time, or the last observed event for an open session.
    pub fn effective_end(&self) -> Timestamp {
        self.end_time.unwrap_or_else(|| {
            self.events
                .iter()
                .map(|e| e.timestamp)
                .max()
                .unwrap_or(self.start_time)
        })
    }
}

/// Output of segmenting one file.
#[derive(Debug, Default)]
pub struct Segmentation {
    pub sessions: Vec<TestSession>,
    /// Events with codes outside every configured list
    pub other_codes: usize,
    /// Measurement/TotalBeats events seen with no open session
    pub outside_session: usize,
    /// End codes seen with no open session
    pub stray_ends: usize,
    /// Sessions dropped because they had no measurements
    pub discarded_sessions: usize,
    pub warnings: Vec<UnboundedSessionWarning>,
}

impl Segmentation {
    fn finish(&mut self, session: TestSession) {
        if session.measurements().next().is_none() {
            tracing::debug!(
                source = %session.source,
                test_id = session.test_id,
                "discarding session without measurements"
            );
            self.discarded_sessions += 1;
            return;
        }

        if session.is_ongoing() {
            let warning = UnboundedSessionWarning {
                device_type: session.source.device_type.clone(),
                device_id: session.source.device_id.clone(),
                date: session.source.date_key(),
                test_id: session.test_id,
                start_time: session.start_time,
            };
            tracing::warn!("{warning}");
            self.warnings.push(warning);
        }

        self.sessions.push(session);
    }
}

/// Splits a single device/date event stream into sessions.
pub struct TestSegmenter {
    ids: TestIdSequence,
}

impl TestSegmenter {
    pub fn new(ids: TestIdSequence) -> Self {
        Self { ids }
    }

    /// Segment events. Events are ordered by timestamp first; file order is
    /// kept for equal timestamps.
    pub fn segment(mut self, mut events: Vec<RawEvent>) -> Segmentation {
        events.sort_by_key(|e| e.timestamp);

        let mut out = Segmentation::default();
        let mut open: Option<TestSession> = None;

        for event in events {
            match event.kind {
                EventKind::Start => {
                    if let Some(mut previous) = open.take() {
                        tracing::warn!(
                            source = %previous.source,
                            test_id = previous.test_id,
                            at = %event.timestamp,
                            "start code inside an open test; closing it"
                        );
                        previous.close(event.timestamp, SessionClose::Restart);
                        out.finish(previous);
                    }
                    open = Some(TestSession::open(self.ids.next_id(), &event));
                }
                EventKind::End => match open.take() {
                    Some(mut session) => {
                        session.close(event.timestamp, SessionClose::EndCode);
                        out.finish(session);
                    }
                    None => out.stray_ends += 1,
                },
                EventKind::Measurement | EventKind::TotalBeats => match open.as_mut() {
                    Some(session) => session.events.push(event),
                    None => out.outside_session += 1,
                },
                EventKind::Other => out.other_codes += 1,
            }
        }

        if let Some(session) = open {
            out.finish(session);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn event(kind: EventKind, ts: Timestamp) -> RawEvent {
        RawEvent {
            timestamp: ts,
            code: format!("{kind:?}"),
            kind,
            value: Some(1.0),
            unit: Some("s".to_string()),
            log_version: "v1".to_string(),
            line: 0,
            source: Arc::new(LogSource::new("hset", "001", ts.date())),
        }
    }

    #[test]
    fn test_id_sequence() {
        let mut ids = TestIdSequence::default();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);

        let mut ids = TestIdSequence::starting_at(10);
        assert_eq!(ids.next_id(), 10);
    }

    #[test]
    fn test_start_end_bounds_session() {
        let events = vec![
            event(EventKind::Measurement, at(9, 59, 0)),
            event(EventKind::Start, at(10, 0, 0)),
            event(EventKind::Measurement, at(10, 0, 10)),
            event(EventKind::Other, at(10, 0, 15)),
            event(EventKind::End, at(10, 0, 20)),
            event(EventKind::End, at(10, 0, 30)),
        ];

        let seg = TestSegmenter::new(TestIdSequence::default()).segment(events);
        assert_eq!(seg.sessions.len(), 1);
        let session = &seg.sessions[0];
        assert_eq!(session.test_id, 1);
        assert_eq!(session.start_time, at(10, 0, 0));
        assert_eq!(session.end_time, Some(at(10, 0, 20)));
        assert_eq!(session.closed_by, Some(SessionClose::EndCode));
        assert_eq!(session.events.len(), 1);
        assert!(!session.is_ongoing());

        assert_eq!(seg.outside_session, 1);
        assert_eq!(seg.other_codes, 1);
        assert_eq!(seg.stray_ends, 1);
        assert!(seg.warnings.is_empty());
    }

    #[test]
    fn test_double_start_forces_close() {
        let events = vec![
            event(EventKind::Start, at(10, 0, 0)),
            event(EventKind::Measurement, at(10, 0, 10)),
            event(EventKind::Start, at(10, 5, 0)),
            event(EventKind::Measurement, at(10, 5, 10)),
            event(EventKind::End, at(10, 6, 0)),
        ];

        let seg = TestSegmenter::new(TestIdSequence::default()).segment(events);
        assert_eq!(seg.sessions.len(), 2);
        assert_eq!(seg.sessions[0].end_time, Some(at(10, 5, 0)));
        assert_eq!(seg.sessions[0].closed_by, Some(SessionClose::Restart));
        assert_eq!(seg.sessions[1].test_id, 2);
        assert_eq!(seg.sessions[1].closed_by, Some(SessionClose::EndCode));
    }

    #[test]
    fn test_unbounded_session_is_ongoing() {
        let events = vec![
            event(EventKind::Start, at(10, 0, 0)),
            event(EventKind::Measurement, at(10, 0, 10)),
            event(EventKind::TotalBeats, at(10, 0, 40)),
        ];

        let seg = TestSegmenter::new(TestIdSequence::default()).segment(events);
        assert_eq!(seg.sessions.len(), 1);
        assert!(seg.sessions[0].is_ongoing());
        assert_eq!(seg.sessions[0].effective_end(), at(10, 0, 40));
        assert_eq!(seg.warnings.len(), 1);
        assert_eq!(seg.warnings[0].test_id, 1);
    }

    #[test]
    fn test_sessions_without_measurements_are_discarded() {
        let events = vec![
            event(EventKind::Start, at(10, 0, 0)),
            event(EventKind::TotalBeats, at(10, 0, 5)),
            event(EventKind::End, at(10, 0, 10)),
            event(EventKind::Start, at(11, 0, 0)),
            event(EventKind::Measurement, at(11, 0, 5)),
            event(EventKind::End, at(11, 0, 10)),
        ];

        let seg = TestSegmenter::new(TestIdSequence::default()).segment(events);
        assert_eq!(seg.discarded_sessions, 1);
        assert_eq!(seg.sessions.len(), 1);
        assert_eq!(seg.sessions[0].test_id, 2);
    }

    #[test]
    fn test_out_of_order_rows_are_sorted_stably() {
        let mut first = event(EventKind::Measurement, at(10, 0, 10));
        first.value = Some(3.0);
        let mut second = event(EventKind::Measurement, at(10, 0, 10));
        second.value = Some(4.0);

        let events = vec![
            event(EventKind::End, at(10, 0, 30)),
            first,
            event(EventKind::Start, at(10, 0, 0)),
            second,
        ];

        let seg = TestSegmenter::new(TestIdSequence::default()).segment(events);
        let values: Vec<_> = seg.sessions[0].events.iter().map(|e| e.value).collect();
        assert_eq!(values, vec![Some(3.0), Some(4.0)]);
    }
}
