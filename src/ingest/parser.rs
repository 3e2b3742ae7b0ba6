//! Turns raw log rows into classified [`RawEvent`]s.

use crate::config::EngineConfig;
use crate::error::{MalformedReason, MalformedRowError};
use crate::ingest::types::{EventKind, LogSource, RawEvent, RawRow, Timestamp};
use chrono::{NaiveDateTime, NaiveTime};
use std::sync::Arc;

/// Result of parsing every row of one file.
#[derive(Debug, Default)]
pub struct ParsedLog {
    /// Events in file order
    pub events: Vec<RawEvent>,
    /// Rows that were skipped
    pub malformed: Vec<MalformedRowError>,
    pub rows_read: usize,
    /// True when no row used the third data column, so it can be dropped
    pub extra_column_empty: bool,
}

/// Parses rows for one log file.
pub struct EventParser<'a> {
    config: &'a EngineConfig,
    source: Arc<LogSource>,
}

impl<'a> EventParser<'a> {
    pub fn new(config: &'a EngineConfig, source: Arc<LogSource>) -> Self {
        Self { config, source }
    }

    /// Parse all rows. Malformed rows are collected, never fatal.
    pub fn parse_rows<'r, I>(&self, rows: I) -> ParsedLog
    where
        I: IntoIterator<Item = &'r RawRow>,
    {
        let mut parsed = ParsedLog {
            extra_column_empty: true,
            ..ParsedLog::default()
        };

        for row in rows {
            parsed.rows_read += 1;
            if row.data3.is_some() {
                parsed.extra_column_empty = false;
            }
            match self.parse_row(row) {
                Ok(event) => parsed.events.push(event),
                Err(err) => {
                    tracing::debug!(source = %self.source, "skipping row: {err}");
                    parsed.malformed.push(err);
                }
            }
        }

        parsed
    }

    /// Parse one row.
    pub fn parse_row(&self, row: &RawRow) -> Result<RawEvent, MalformedRowError> {
        let fail = |reason| MalformedRowError {
            line: row.line,
            reason,
        };

        if row.bad_encoding {
            return Err(fail(MalformedReason::BadEncoding));
        }

        let time = row
            .time
            .as_deref()
            .ok_or_else(|| fail(MalformedReason::MissingTimestamp))?;
        let timestamp = self
            .parse_timestamp(time)
            .ok_or_else(|| fail(MalformedReason::BadTimestamp(time.to_string())))?;

        let code = row
            .code
            .as_deref()
            .ok_or_else(|| fail(MalformedReason::MissingCode))?;
        let kind = self.config.codes.classify(code);

        let value = match (kind, row.data1.as_deref()) {
            (EventKind::Measurement | EventKind::TotalBeats, None) => {
                return Err(fail(MalformedReason::MissingValue));
            }
            (EventKind::Measurement | EventKind::TotalBeats, Some(raw)) => Some(
                parse_number(raw).ok_or_else(|| fail(MalformedReason::BadValue(raw.to_string())))?,
            ),
            (_, raw) => raw.and_then(parse_number),
        };

        if kind == EventKind::Measurement {
            let unit = row.data2.as_deref().unwrap_or_default();
            if !self.config.units.contains(unit) {
                return Err(fail(MalformedReason::UnknownUnit(unit.to_string())));
            }
        }

        Ok(RawEvent {
            timestamp,
            code: code.trim().to_string(),
            kind,
            value,
            unit: row.data2.clone(),
            log_version: row.log_version.clone().unwrap_or_default(),
            line: row.line,
            source: Arc::clone(&self.source),
        })
    }

    /// Accepts `HH:MM:SS` (placed on the file's date) or a full
    /// `YYYY-MM-DD HH:MM:SS`.
    fn parse_timestamp(&self, raw: &str) -> Option<Timestamp> {
        let raw = raw.trim();
        for fmt in ["%H:%M:%S", "%H:%M:%S%.f"] {
            if let Ok(time) = NaiveTime::parse_from_str(raw, fmt) {
                return Some(self.source.date.and_time(time));
            }
        }
        for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
                return Some(ts);
            }
        }
        None
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn source() -> Arc<LogSource> {
        Arc::new(LogSource::new(
            "hset",
            "001",
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        ))
    }

    fn row(line: usize, fields: &[&str]) -> RawRow {
        RawRow::from_fields(line, fields.iter().copied())
    }

    #[test]
    fn test_parse_measurement() {
        let config = EngineConfig::default();
        let parser = EventParser::new(&config, source());

        let event = parser
            .parse_row(&row(1, &["10:00:05", "v1", "1.7.0.1", "120", "m"]))
            .unwrap();
        assert_eq!(event.kind, EventKind::Measurement);
        assert_eq!(event.value, Some(120.0));
        assert_eq!(event.unit.as_deref(), Some("m"));
        assert_eq!(event.log_version, "v1");
        assert_eq!(
            event.timestamp,
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(10, 0, 5)
                .unwrap()
        );
        assert_eq!(event.device_type(), "hset");
    }

    #[test]
    fn test_other_codes_are_kept_as_other() {
        let config = EngineConfig::default();
        let parser = EventParser::new(&config, source());
        let event = parser.parse_row(&row(2, &["10:00:05", "v1", "5.5.5"])).unwrap();
        assert_eq!(event.kind, EventKind::Other);
        assert_eq!(event.value, None);
    }

    #[test]
    fn test_malformed_rows_are_counted_not_fatal() {
        let config = EngineConfig::default();
        let parser = EventParser::new(&config, source());
        let rows = vec![
            row(1, &["10:00:00", "v1", "170"]),
            row(2, &["not-a-time", "v1", "200", "60", "m"]),
            row(3, &["10:00:10", "v1"]),
            row(4, &["10:00:20", "v1", "200", "abc", "m"]),
            row(5, &["10:00:30", "v1", "200", "60", "bpm"]),
            row(6, &["10:00:40", "v1", "1.7.0.2"]),
            row(7, &["10:00:50", "v1", "200", "60", "m"]),
            RawRow::undecodable(8),
        ];

        let parsed = parser.parse_rows(&rows);
        assert_eq!(parsed.rows_read, 8);
        assert_eq!(parsed.events.len(), 2);
        let reasons: Vec<_> = parsed.malformed.iter().map(|e| e.reason.clone()).collect();
        assert_eq!(
            reasons,
            vec![
                MalformedReason::BadTimestamp("not-a-time".to_string()),
                MalformedReason::MissingCode,
                MalformedReason::BadValue("abc".to_string()),
                MalformedReason::UnknownUnit("bpm".to_string()),
                MalformedReason::MissingValue,
                MalformedReason::BadEncoding,
            ]
        );
        assert_eq!(parsed.malformed[5].line, 8);
        assert!(parsed.extra_column_empty);
    }

    #[test]
    fn test_extra_column_detected() {
        let config = EngineConfig::default();
        let parser = EventParser::new(&config, source());
        let rows = vec![row(1, &["10:00:00", "v1", "200", "60", "m", "x"])];
        assert!(!parser.parse_rows(&rows).extra_column_empty);
    }

    #[test]
    fn test_full_datetime_timestamp() {
        let config = EngineConfig::default();
        let parser = EventParser::new(&config, source());
        let event = parser
            .parse_row(&row(1, &["2024-03-02 00:00:01", "v1", "171"]))
            .unwrap();
        assert_eq!(event.timestamp.date(), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }
}
