//! One JSON document per device+date under `<root>/<type>_<id>/<date>.json`.

use super::{source_order, SampleStore, StoredFile};
use crate::core::FileAnalysis;
use crate::error::{DuplicateFileError, StoreError};
use crate::ingest::LogSource;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, source: &LogSource) -> PathBuf {
        self.root
            .join(source.title())
            .join(format!("{}.json", source.date_key()))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl SampleStore for JsonFileStore {
    fn contains(&self, source: &LogSource) -> Result<bool, StoreError> {
        Ok(self.path_for(source).is_file())
    }

    fn commit(&self, analysis: &FileAnalysis) -> Result<StoredFile, StoreError> {
        let path = self.path_for(&analysis.source);
        if path.exists() {
            return Err(DuplicateFileError::for_source(&analysis.source).into());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error(parent))?;
        }

        let record = StoredFile::from_analysis(analysis);
        let json = serde_json::to_vec_pretty(&record)
            .map_err(std::io::Error::other)
            .map_err(io_error(&path))?;

        // Readers never see a half-written record.
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, json).map_err(io_error(&temp_path))?;
        std::fs::rename(&temp_path, &path).map_err(io_error(&path))?;

        tracing::debug!(source = %analysis.source, path = ?path, "committed");
        Ok(record)
    }

    fn sources(&self) -> Result<Vec<LogSource>, StoreError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut sources = Vec::new();
        for entry in std::fs::read_dir(&self.root).map_err(io_error(&self.root))? {
            let dir = entry.map_err(io_error(&self.root))?.path();
            let Some((device_type, device_id)) = dir
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.split_once('_'))
            else {
                continue;
            };
            if !dir.is_dir() {
                continue;
            }

            for file in std::fs::read_dir(&dir).map_err(io_error(&dir))? {
                let file = file.map_err(io_error(&dir))?.path();
                if file.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let date = file
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
                if let Some(date) = date {
                    sources.push(LogSource::new(device_type, device_id, date));
                }
            }
        }

        sources.sort_by_key(source_order);
        Ok(sources)
    }

    fn load(&self, source: &LogSource) -> Result<Option<StoredFile>, StoreError> {
        let path = self.path_for(source);
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(io_error(&path))?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StoreError::Corrupt { path, source })
    }
}
