//! Parallel import of many log files.
//!
//! Each file is one unit of work. Workers pull paths from a bounded queue,
//! each with its own [`Engine`], and share only the compiled config, the
//! store and the stats. A file that fails is reported and the batch carries
//! on.

use crate::config::EngineConfig;
use crate::core::{Engine, FileReport};
use crate::error::{DuplicateFileError, ImportError};
use crate::ingest::{discover, parse_file_name, LogFile, LogSource};
use crate::stats::SharedImportStats;
use crate::store::SampleStore;
use crossbeam_channel::{bounded, unbounded};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Summary of one committed file.
#[derive(Debug, Clone)]
pub struct ImportedFile {
    pub source: LogSource,
    pub run_id: Uuid,
    pub rate_samples: usize,
    pub total_beats: usize,
    pub report: FileReport,
}

#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<ImportedFile, ImportError>,
}

/// Outcomes in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn imported(&self) -> impl Iterator<Item = &ImportedFile> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn duplicates(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(&o.result, Err(e) if e.is_duplicate()))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &ImportError)> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            Err(e) if !e.is_duplicate() => Some((o.path.as_path(), e)),
            _ => None,
        })
    }
}

pub struct BatchImporter {
    config: Arc<EngineConfig>,
    store: Arc<dyn SampleStore>,
    stats: SharedImportStats,
    workers: usize,
}

impl BatchImporter {
    pub fn new(
        config: Arc<EngineConfig>,
        store: Arc<dyn SampleStore>,
        stats: SharedImportStats,
    ) -> Self {
        Self {
            config,
            store,
            stats,
            workers: 1,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Import every `*.csv` directly inside `dir`.
    pub fn import_dir(&self, dir: &Path) -> Result<BatchReport, ImportError> {
        let files = discover(dir)?;
        tracing::info!(dir = ?dir, files = files.len(), workers = self.workers, "starting import");
        Ok(self.import_all(files))
    }

    pub fn import_all(&self, paths: Vec<PathBuf>) -> BatchReport {
        let workers = self.workers.min(paths.len()).max(1);
        let (job_tx, job_rx) = bounded::<(usize, PathBuf)>(workers * 2);
        let (done_tx, done_rx) = unbounded::<(usize, FileOutcome)>();

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();
                let engine = Engine::new(Arc::clone(&self.config));
                scope.spawn(move || {
                    for (index, path) in job_rx {
                        let result = self.import_file(&engine, &path);
                        if done_tx.send((index, FileOutcome { path, result })).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(job_rx);
            drop(done_tx);

            for job in paths.into_iter().enumerate() {
                if job_tx.send(job).is_err() {
                    break;
                }
            }
            drop(job_tx);
        });

        let mut outcomes: Vec<(usize, FileOutcome)> = done_rx.into_iter().collect();
        outcomes.sort_by_key(|(index, _)| *index);
        BatchReport {
            outcomes: outcomes.into_iter().map(|(_, o)| o).collect(),
        }
    }

    /// Import one file and record the outcome in the stats.
    pub fn import_file(&self, engine: &Engine, path: &Path) -> Result<ImportedFile, ImportError> {
        let result = self.try_import(engine, path);
        match &result {
            Ok(file) => tracing::info!(
                source = %file.source,
                sessions = file.report.sessions,
                rate_samples = file.rate_samples,
                hour_buckets = file.total_beats,
                "imported"
            ),
            Err(e) if e.is_duplicate() => {
                self.stats.record_duplicate();
                tracing::warn!("skipping {path:?}: {e}");
            }
            Err(e) => {
                self.stats.record_failed();
                tracing::error!("failed to import {path:?}: {e}");
            }
        }
        result
    }

    fn try_import(&self, engine: &Engine, path: &Path) -> Result<ImportedFile, ImportError> {
        let source = parse_file_name(path, &engine.config().devices)?;
        if self.store.contains(&source)? {
            return Err(DuplicateFileError::for_source(&source).into());
        }

        let file = LogFile::open(path, &engine.config().devices)?;
        let analysis = engine.process(&file)?;
        let record = self.store.commit(&analysis)?;
        self.stats.record_imported(&analysis);

        Ok(ImportedFile {
            source: record.source,
            run_id: record.run_id,
            rate_samples: analysis.rate_samples.len(),
            total_beats: analysis.total_beats.len(),
            report: analysis.report,
        })
    }
}
