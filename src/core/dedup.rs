//! First-value-wins resolution of events sharing a timestamp.
//!
//! Only the first event at a given timestamp (in input order) survives.
//! Downstream totals depend on this exact rule, so no averaging is done.

use crate::ingest::{RawEvent, Timestamp};
use std::collections::HashSet;

/// Events left after deduplication, plus how many were dropped.
#[derive(Debug)]
pub struct Deduped<'a> {
    pub kept: Vec<&'a RawEvent>,
    pub dropped: usize,
}

/// Keep the first event per timestamp, preserving input order.
pub fn first_wins<'a, I>(events: I) -> Deduped<'a>
where
    I: IntoIterator<Item = &'a RawEvent>,
{
    let mut seen: HashSet<Timestamp> = HashSet::new();
    let mut kept = Vec::new();
    let mut dropped = 0;

    for event in events {
        if seen.insert(event.timestamp) {
            kept.push(event);
        } else {
            dropped += 1;
        }
    }

    Deduped { kept, dropped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{EventKind, LogSource};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn meas(second: u32, value: f64) -> RawEvent {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        RawEvent {
            timestamp: date.and_hms_opt(0, 0, second).unwrap(),
            code: "200".to_string(),
            kind: EventKind::Measurement,
            value: Some(value),
            unit: Some("s".to_string()),
            log_version: "v1".to_string(),
            line: 0,
            source: Arc::new(LogSource::new("hset", "1", date)),
        }
    }

    #[test]
    fn test_first_value_wins() {
        let events = vec![meas(10, 3.0), meas(10, 4.5), meas(20, 9.0), meas(10, 1.0)];
        let deduped = first_wins(&events);

        let values: Vec<_> = deduped.kept.iter().map(|e| e.value).collect();
        assert_eq!(values, vec![Some(3.0), Some(9.0)]);
        assert_eq!(deduped.dropped, 2);
    }

    #[test]
    fn test_empty_input() {
        let deduped = first_wins(std::iter::empty());
        assert!(deduped.kept.is_empty());
        assert_eq!(deduped.dropped, 0);
    }
}
