//! Unit normalization and per-device rate ceilings.

use crate::config::{EngineConfig, UnitTable};
use crate::ingest::{RawEvent, Timestamp};

/// A measurement normalized to beats/sec and clamped to the device ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatePoint {
    pub time: Timestamp,
    /// Beats per second
    pub rate: f64,
    /// Whether the ceiling was applied
    pub capped: bool,
}

/// Clamps rates for one device family.
#[derive(Debug, Clone, Copy)]
pub struct RateCapper<'a> {
    units: &'a UnitTable,
    ceiling: f64,
}

impl<'a> RateCapper<'a> {
    pub fn new(units: &'a UnitTable, ceiling: f64) -> Self {
        Self { units, ceiling }
    }

    /// Capper for a device type, if the type is configured.
    pub fn for_device(config: &'a EngineConfig, device_type: &str) -> Option<Self> {
        config
            .devices
            .lookup(device_type)
            .map(|family| Self::new(&config.units, family.ceiling))
    }

    /// `value / seconds_per_unit`, rounded to 3 decimals.
    pub fn beats_per_sec(&self, value: f64, unit: &str) -> Option<f64> {
        let secs = self.units.seconds(unit)?;
        Some(round3(value / secs))
    }

    /// Values above the ceiling become exactly the ceiling.
    pub fn clamp(&self, rate: f64) -> (f64, bool) {
        if rate > self.ceiling {
            (self.ceiling, true)
        } else {
            (rate, false)
        }
    }

    /// Normalize and clamp a measurement event.
    pub fn apply(&self, event: &RawEvent) -> Option<RatePoint> {
        let rate = self.beats_per_sec(event.value?, event.unit.as_deref()?)?;
        let (rate, capped) = self.clamp(rate);
        Some(RatePoint {
            time: event.timestamp,
            rate,
            capped,
        })
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
