//! Synthetic zero-rate points across silence gaps.
//!
//! For consecutive real points more than `max_gap` apart, exactly one zero
//! point is placed at `earlier + max_gap`. Shorter gaps are left for the
//! chart renderer to join.

use crate::core::capper::RatePoint;
use crate::ingest::Timestamp;
use chrono::Duration;

/// A point of the final rate series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub time: Timestamp,
    pub rate: f64,
    /// Inserted by the gap filler
    pub synthetic: bool,
}

impl From<&RatePoint> for SeriesPoint {
    fn from(point: &RatePoint) -> Self {
        Self {
            time: point.time,
            rate: point.rate,
            synthetic: false,
        }
    }
}

pub struct GapFiller {
    max_gap: Duration,
}

impl GapFiller {
    pub fn new(max_gap: Duration) -> Self {
        Self { max_gap }
    }

    /// Fill gaps in a strictly increasing point sequence.
    pub fn fill(&self, points: &[RatePoint]) -> Vec<SeriesPoint> {
        let mut out = Vec::with_capacity(points.len());

        for (i, point) in points.iter().enumerate() {
            out.push(SeriesPoint::from(point));

            if let Some(next) = points.get(i + 1) {
                if next.time - point.time > self.max_gap {
                    out.push(SeriesPoint {
                        time: point.time + self.max_gap,
                        rate: 0.0,
                        synthetic: true,
                    });
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn point(second: i64, rate: f64) -> RatePoint {
        let base = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        RatePoint {
            time: base + Duration::seconds(second),
            rate,
            capped: false,
        }
    }

    #[test]
    fn test_gap_at_threshold_is_not_filled() {
        let filler = GapFiller::new(Duration::seconds(20));
        let filled = filler.fill(&[point(0, 2.0), point(20, 2.0)]);
        assert_eq!(filled.len(), 2);
        assert!(filled.iter().all(|p| !p.synthetic));
    }

    #[test]
    fn test_one_zero_point_per_gap() {
        let filler = GapFiller::new(Duration::seconds(20));
        let filled = filler.fill(&[point(0, 2.0), point(300, 3.0), point(310, 3.0), point(400, 1.0)]);

        let synthetic: Vec<_> = filled.iter().filter(|p| p.synthetic).collect();
        assert_eq!(synthetic.len(), 2);
        assert_eq!(synthetic[0].time, point(20, 0.0).time);
        assert_eq!(synthetic[1].time, point(330, 0.0).time);
        assert!(synthetic.iter().all(|p| p.rate == 0.0));
        assert!(filled.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn test_empty_and_single() {
        let filler = GapFiller::new(Duration::seconds(20));
        assert!(filler.fill(&[]).is_empty());
        assert_eq!(filler.fill(&[point(5, 1.0)]).len(), 1);
    }
}
