//! beatlog - heartbeat log reconstruction for research devices.
//!
//! Device logs are irregular, code-tagged event streams. This library turns
//! them into clean per-test rate series and hourly total-beat buckets that
//! are safe to store and chart.
//!
//! # Guarantees
//!
//! - **One value per instant**: the first sample at a timestamp wins
//! - **Bounded rates**: every rate is clamped to its device family's ceiling
//! - **Visible silence**: gaps longer than the threshold get one zero point
//! - **Honest hours**: partially covered hours are labelled as such
//! - **No double imports**: a device+date is stored once, later files are rejected
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             beatlog                              │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌───────────┐   ┌───────────┐   ┌───────────┐   │
//! │  │ LogReader │──▶│  Parser   │──▶│ Segmenter │──▶│  Dedup    │   │
//! │  │  (csv)    │   │ (codes)   │   │ (tests)   │   │ (1st wins)│   │
//! │  └───────────┘   └───────────┘   └───────────┘   └─────┬─────┘   │
//! │                                                        │         │
//! │                  ┌───────────┐   ┌───────────┐   ┌─────▼─────┐   │
//! │                  │  Hourly   │◀──│   Gaps    │◀──│  Capper   │   │
//! │                  │  totals   │   │ (zeros)   │   │ (ceiling) │   │
//! │                  └─────┬─────┘   └───────────┘   └───────────┘   │
//! │                        ▼                                         │
//! │                  ┌───────────┐   ┌───────────┐                   │
//! │                  │  Sample   │◀──│   Batch   │                   │
//! │                  │  store    │   │ importer  │                   │
//! │                  └───────────┘   └───────────┘                   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use beatlog::{core::Engine, ingest::LogFile, EngineConfig};
//! use std::sync::Arc;
//!
//! let config = Arc::new(EngineConfig::default());
//! let engine = Engine::new(Arc::clone(&config));
//!
//! let file = LogFile::open("logs/hset_001_2024-03-01.csv".as_ref(), &config.devices)
//!     .expect("readable log");
//! let analysis = engine.process(&file).expect("known device");
//! println!("{} rate samples", analysis.rate_samples.len());
//! ```

pub mod batch;
pub mod config;
pub mod core;
pub mod error;
pub mod ingest;
pub mod stats;
pub mod store;

// Re-export key types at crate root for convenience
pub use batch::{BatchImporter, BatchReport, ImportedFile};
pub use config::{AnalysisConfig, Config, ConfigError, EngineConfig};
pub use core::{Engine, FileAnalysis, FileReport, RateSample, TotalBeatsSample};
pub use error::{DuplicateFileError, ImportError, MalformedRowError, StoreError, UnboundedSessionWarning};
pub use stats::{ImportStats, SharedImportStats};
pub use store::{JsonFileStore, MemoryStore, SampleStore, StoredFile};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
