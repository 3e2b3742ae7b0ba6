//! Log file discovery and CSV reading.
//!
//! Files are named `<DEVICE_TYPE>_<DEVICE_ID>_<DATE>.csv` and hold headerless
//! rows `time, log_version, log_code, log_data1, log_data2, log_data3`.

use crate::config::DeviceTable;
use crate::error::ImportError;
use crate::ingest::types::{LogSource, RawRow};
use chrono::NaiveDate;
use std::io::Read;
use std::path::{Path, PathBuf};

/// A log file read into memory.
#[derive(Debug, Clone)]
pub struct LogFile {
    pub path: PathBuf,
    pub source: LogSource,
    pub rows: Vec<RawRow>,
}

impl LogFile {
    /// Validate the file name against the known devices and read all rows.
    pub fn open(path: &Path, devices: &DeviceTable) -> Result<Self, ImportError> {
        let source = parse_file_name(path, devices)?;
        let file = std::fs::File::open(path).map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let rows = read_rows(file).map_err(|source| ImportError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            source,
            rows,
        })
    }
}

/// List `*.csv` files (any case) directly inside `dir`, sorted by name.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>, ImportError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ImportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_csv(p))
        .collect();
    files.sort();
    Ok(files)
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Split `<DEVICE_TYPE>_<DEVICE_ID>_<DATE>.csv` into a [`LogSource`].
pub fn parse_file_name(path: &Path, devices: &DeviceTable) -> Result<LogSource, ImportError> {
    let bad_name = || ImportError::BadFileName {
        path: path.to_path_buf(),
    };

    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(bad_name)?;
    let parts: Vec<&str> = stem.split('_').collect();
    let [device_type, device_id, date] = parts.as_slice() else {
        return Err(bad_name());
    };
    if device_type.is_empty() || device_id.is_empty() {
        return Err(bad_name());
    }

    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date, "%Y%m%d"))
        .map_err(|_| bad_name())?;

    if devices.lookup(device_type).is_none() {
        return Err(ImportError::UnknownDevice {
            path: path.to_path_buf(),
            device_type: device_type.to_string(),
        });
    }

    Ok(LogSource::new(*device_type, *device_id, date))
}

/// Read headerless, possibly ragged CSV rows.
///
/// A row that is not valid UTF-8 is kept as [`RawRow::undecodable`] so the
/// parser can report it without losing the rest of the file.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<RawRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (index, record) in csv_reader.byte_records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(index + 1);
        let fields: Result<Vec<&str>, _> = record.iter().map(std::str::from_utf8).collect();
        match fields {
            Ok(fields) => rows.push(RawRow::from_fields(line, fields)),
            Err(_) => rows.push(RawRow::undecodable(line)),
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    #[test]
    fn test_parse_file_name() {
        let config = EngineConfig::default();
        let source = parse_file_name(Path::new("/data/HSet_017_2024-03-01.csv"), &config.devices)
            .unwrap();
        assert_eq!(source.device_type, "hset");
        assert_eq!(source.device_id, "017");
        assert_eq!(source.date_key(), "2024-03-01");

        let compact =
            parse_file_name(Path::new("hphire_9_20240302.CSV"), &config.devices).unwrap();
        assert_eq!(compact.date_key(), "2024-03-02");
    }

    #[test]
    fn test_bad_file_names() {
        let config = EngineConfig::default();
        for name in ["hset_001.csv", "hset_001_2024-03-01_x.csv", "hset_001_March.csv", "_1_20240301.csv"] {
            let err = parse_file_name(Path::new(name), &config.devices).unwrap_err();
            assert!(matches!(err, ImportError::BadFileName { .. }), "{name}");
        }

        let err = parse_file_name(Path::new("watch_1_2024-03-01.csv"), &config.devices).unwrap_err();
        assert!(matches!(err, ImportError::UnknownDevice { .. }));
    }

    #[test]
    fn test_read_ragged_rows() {
        let data = "10:00:00,v1,170\n10:00:10,v1,200,72,m\n10:00:20,v1,200,75,m,\n";
        let rows = read_rows(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].line, 1);
        assert_eq!(rows[1].data1.as_deref(), Some("72"));
        assert_eq!(rows[2].line, 3);
        assert!(rows[2].data3.is_none());
    }

    #[test]
    fn test_undecodable_row_does_not_fail_the_file() {
        let mut data = b"10:00:00,v1,170\n10:00:10,v1,200,".to_vec();
        data.extend_from_slice(b"\xff\xfe,m\n10:00:20,v1,200,75,m\n10:00:30,v1,171\n");
        let rows = read_rows(data.as_slice()).unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows[1].bad_encoding);
        assert_eq!(rows[1].line, 2);
        assert!(rows[1].time.is_none());
        assert!(!rows[2].bad_encoding);
        assert_eq!(rows[2].data1.as_deref(), Some("75"));
        assert_eq!(rows[3].code.as_deref(), Some("171"));
    }

    #[test]
    fn test_discover_csv_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b_1_20240301.csv"), "").unwrap();
        std::fs::write(dir.path().join("a_1_20240301.CSV"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let files = discover(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a_1_20240301.CSV", "b_1_20240301.csv"]);
    }
}
