//! In-process store, used by tests and dry runs.

use super::{source_order, SampleStore, StoredFile};
use crate::core::FileAnalysis;
use crate::error::{DuplicateFileError, StoreError};
use crate::ingest::LogSource;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<LogSource, StoredFile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<LogSource, StoredFile>> {
        // insert is the only mutation, so a poisoned map is still consistent
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SampleStore for MemoryStore {
    fn contains(&self, source: &LogSource) -> Result<bool, StoreError> {
        Ok(self.lock().contains_key(source))
    }

    fn commit(&self, analysis: &FileAnalysis) -> Result<StoredFile, StoreError> {
        let mut files = self.lock();
        if files.contains_key(&analysis.source) {
            return Err(DuplicateFileError::for_source(&analysis.source).into());
        }
        let record = StoredFile::from_analysis(analysis);
        files.insert(analysis.source.clone(), record.clone());
        Ok(record)
    }

    fn sources(&self) -> Result<Vec<LogSource>, StoreError> {
        let mut sources: Vec<LogSource> = self.lock().keys().cloned().collect();
        sources.sort_by_key(source_order);
        Ok(sources)
    }

    fn load(&self, source: &LogSource) -> Result<Option<StoredFile>, StoreError> {
        Ok(self.lock().get(source).cloned())
    }
}
