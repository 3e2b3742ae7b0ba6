//! Analysis parameters: code lists, unit multipliers, device ceilings.
//!
//! [`AnalysisConfig`] mirrors `analysis_config.yaml` key for key. Every key is
//! optional; missing keys take the built-in defaults. [`AnalysisConfig::compile`]
//! validates it into an [`EngineConfig`], the immutable value every engine
//! instance receives.

use crate::config::ConfigError;
use crate::ingest::EventKind;
use chrono::Duration;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Gap thresholds longer than one log file's day are rejected.
const MAX_TIME_DELTA_SECS: f64 = 86_400.0;

/// Raw analysis configuration as read from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Unit name -> seconds per unit (e.g. `m: 60`)
    pub hr_param_dict: BTreeMap<String, f64>,

    /// Session start codes, one per device generation
    #[serde(deserialize_with = "code_list")]
    pub start_code: Vec<String>,

    /// Session end codes
    #[serde(deserialize_with = "code_list")]
    pub end_code: Vec<String>,

    /// Rate measurement codes
    #[serde(deserialize_with = "code_list")]
    pub meas_code: Vec<String>,

    /// Cumulative beat counter codes (a single code is accepted too)
    #[serde(deserialize_with = "code_list")]
    pub total_beats_code: Vec<String>,

    /// Recognized device families, ordered to match `cup`
    pub device_types: Vec<String>,

    /// Rate ceilings in beats/sec, one per entry of `device_types`
    #[serde(alias = "cap")]
    pub cup: Vec<f64>,

    /// Nominal seconds between samples
    #[serde(alias = "sample_rate")]
    pub sample_len: u32,

    /// Silence longer than this (seconds) counts as a gap
    #[serde(alias = "max_gap")]
    pub time_delta: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let hr_param_dict = [("s", 1.0), ("m", 60.0), ("h", 3600.0), ("SEC", 1.0), ("MIN", 60.0)]
            .into_iter()
            .map(|(unit, secs)| (unit.to_string(), secs))
            .collect();

        Self {
            hr_param_dict,
            start_code: strings(&["1.7.0.0", "170"]),
            end_code: strings(&["1.7.1.0", "171"]),
            meas_code: strings(&["1.7.0.1", "200"]),
            total_beats_code: strings(&["1.7.0.2"]),
            device_types: strings(&["hset", "hphire"]),
            cup: vec![5.0, 6.0],
            sample_len: 10,
            time_delta: 20.0,
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl AnalysisConfig {
    /// Load from a YAML file. A missing file is an error, not a silent default.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Parse from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })
    }

    /// Render as YAML (used by `beatlog show-defaults`).
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Validate and freeze into the value the engine runs on.
    pub fn compile(&self) -> Result<EngineConfig, ConfigError> {
        let codes = CodeBook::new(
            &self.start_code,
            &self.end_code,
            &self.meas_code,
            &self.total_beats_code,
        )?;
        let units = UnitTable::new(&self.hr_param_dict)?;
        let devices = DeviceTable::new(&self.device_types, &self.cup)?;

        if !self.time_delta.is_finite() || self.time_delta <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "time_delta must be a positive number of seconds, got {}",
                self.time_delta
            )));
        }
        let gap_millis = (self.time_delta * 1000.0).round();
        if gap_millis < 1.0 || self.time_delta > MAX_TIME_DELTA_SECS {
            return Err(ConfigError::Invalid(format!(
                "time_delta must be between 0.001 and {MAX_TIME_DELTA_SECS} seconds, got {}",
                self.time_delta
            )));
        }
        if self.sample_len == 0 {
            return Err(ConfigError::Invalid("sample_len must be at least 1".into()));
        }
        if f64::from(self.sample_len) > self.time_delta {
            tracing::warn!(
                sample_len = self.sample_len,
                time_delta = self.time_delta,
                "nominal sample length exceeds the gap threshold; every interval will count as a gap"
            );
        }

        Ok(EngineConfig {
            codes,
            units,
            devices,
            max_gap: Duration::milliseconds(gap_millis as i64),
            sample_len: Duration::seconds(i64::from(self.sample_len)),
        })
    }
}

/// Validated, immutable analysis parameters shared by engine instances.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub codes: CodeBook,
    pub units: UnitTable,
    pub devices: DeviceTable,
    /// Gap threshold
    pub max_gap: Duration,
    /// Nominal sample spacing (informational)
    pub sample_len: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        AnalysisConfig::default()
            .compile()
            .expect("built-in analysis defaults are valid")
    }
}

/// Membership sets used to classify log codes.
#[derive(Debug, Clone)]
pub struct CodeBook {
    start: HashSet<String>,
    end: HashSet<String>,
    meas: HashSet<String>,
    total_beats: HashSet<String>,
}

impl CodeBook {
    pub fn new(
        start: &[String],
        end: &[String],
        meas: &[String],
        total_beats: &[String],
    ) -> Result<Self, ConfigError> {
        let start = code_set("start_code", start, true)?;
        let end = code_set("end_code", end, true)?;
        let meas = code_set("meas_code", meas, true)?;
        let total_beats = code_set("total_beats_code", total_beats, false)?;

        let named = [
            ("start_code", &start),
            ("end_code", &end),
            ("meas_code", &meas),
            ("total_beats_code", &total_beats),
        ];
        for (i, (a_name, a)) in named.iter().enumerate() {
            for (b_name, b) in &named[i + 1..] {
                if let Some(code) = a.intersection(b).next() {
                    return Err(ConfigError::Invalid(format!(
                        "code '{code}' appears in both {a_name} and {b_name}"
                    )));
                }
            }
        }

        Ok(Self {
            start,
            end,
            meas,
            total_beats,
        })
    }

    /// Classify a raw code string.
    pub fn classify(&self, code: &str) -> EventKind {
        let code = code.trim();
        if self.start.contains(code) {
            EventKind::Start
        } else if self.end.contains(code) {
            EventKind::End
        } else if self.meas.contains(code) {
            EventKind::Measurement
        } else if self.total_beats.contains(code) {
            EventKind::TotalBeats
        } else {
            EventKind::Other
        }
    }
}

fn code_set(name: &str, codes: &[String], required: bool) -> Result<HashSet<String>, ConfigError> {
    let set: HashSet<String> = codes
        .iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if required && set.is_empty() {
        return Err(ConfigError::Invalid(format!("{name} must list at least one code")));
    }
    Ok(set)
}

/// Unit name -> seconds per unit.
#[derive(Debug, Clone)]
pub struct UnitTable {
    seconds: HashMap<String, f64>,
}

impl UnitTable {
    pub fn new(units: &BTreeMap<String, f64>) -> Result<Self, ConfigError> {
        if units.is_empty() {
            return Err(ConfigError::Invalid("hr_param_dict is empty".into()));
        }
        for (unit, secs) in units {
            if !secs.is_finite() || *secs <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "hr_param_dict['{unit}'] must be positive, got {secs}"
                )));
            }
        }
        Ok(Self {
            seconds: units.iter().map(|(u, s)| (u.clone(), *s)).collect(),
        })
    }

    /// Seconds per unit, if the unit is known.
    pub fn seconds(&self, unit: &str) -> Option<f64> {
        self.seconds.get(unit.trim()).copied()
    }

    pub fn contains(&self, unit: &str) -> bool {
        self.seconds(unit).is_some()
    }

    /// Convert a beats/sec rate into beats per `unit`, rounded to whole beats.
    pub fn from_beats_per_sec(&self, rate: f64, unit: &str) -> Option<f64> {
        let secs = self.seconds(unit)?;
        if secs == 1.0 {
            Some(rate)
        } else {
            Some((rate * secs).round())
        }
    }
}

/// One device family and its rate ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceFamily {
    pub name: String,
    /// Beats/sec ceiling
    pub ceiling: f64,
}

/// Device families keyed by lower-cased device type.
#[derive(Debug, Clone)]
pub struct DeviceTable {
    families: Vec<DeviceFamily>,
}

impl DeviceTable {
    pub fn new(names: &[String], ceilings: &[f64]) -> Result<Self, ConfigError> {
        if names.is_empty() {
            return Err(ConfigError::Invalid("device_types must not be empty".into()));
        }
        if names.len() != ceilings.len() {
            return Err(ConfigError::Invalid(format!(
                "cup lists {} ceilings for {} device types",
                ceilings.len(),
                names.len()
            )));
        }

        let mut families: Vec<DeviceFamily> = Vec::with_capacity(names.len());
        for (name, &ceiling) in names.iter().zip(ceilings) {
            let name = name.trim().to_lowercase();
            if !ceiling.is_finite() || ceiling <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "ceiling for '{name}' must be positive, got {ceiling}"
                )));
            }
            if families.iter().any(|f| f.name == name) {
                return Err(ConfigError::Invalid(format!("device type '{name}' listed twice")));
            }
            families.push(DeviceFamily { name, ceiling });
        }

        Ok(Self { families })
    }

    /// Case-insensitive lookup.
    pub fn lookup(&self, device_type: &str) -> Option<&DeviceFamily> {
        let key = device_type.trim().to_lowercase();
        self.families.iter().find(|f| f.name == key)
    }

    pub fn families(&self) -> impl Iterator<Item = &DeviceFamily> {
        self.families.iter()
    }
}

/// YAML lets codes be written as strings (`1.7.0.0`) or numbers (`170`), and
/// `total_beats_code` historically as a single value.
fn code_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Text(String),
        Int(i64),
        Float(f64),
    }

    impl Code {
        fn into_string(self) -> String {
            match self {
                Code::Text(s) => s,
                Code::Int(i) => i.to_string(),
                Code::Float(f) => f.to_string(),
            }
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Code),
        Many(Vec<Code>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(code) => vec![code.into_string()],
        OneOrMany::Many(codes) => codes.into_iter().map(Code::into_string).collect(),
    })
}
