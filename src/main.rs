//! beatlog CLI
//!
//! Imports device heartbeat logs into the sample store and exports the
//! reconstructed series.

use anyhow::{anyhow, bail, Context, Result};
use beatlog::{
    config::{AnalysisConfig, Config, EngineConfig},
    store::{JsonFileStore, SampleStore, StoredFile},
    BatchImporter, ImportStats, VERSION,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "beatlog")]
#[command(version = VERSION)]
#[command(about = "Reconstruct heart-rate series from device event logs", long_about = None)]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Analysis config YAML (defaults to the one in config.json, then built-ins)
    #[arg(long, global = true)]
    analysis_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import every log file in a directory
    Import {
        /// Directory of <DEVICE_TYPE>_<DEVICE_ID>_<DATE>.csv logs
        #[arg(long, short)]
        dir: Option<PathBuf>,

        /// Worker threads
        #[arg(long, short)]
        workers: Option<usize>,
    },

    /// Show configuration and stored files
    Status,

    /// Export stored series
    Export {
        #[arg(long, value_enum, default_value = "rates")]
        series: Series,

        #[arg(long, value_enum, default_value = "csv")]
        format: Format,

        /// Unit from hr_param_dict for exported rates
        #[arg(long, default_value = "s")]
        unit: String,

        /// Which sessions to include
        #[arg(long, value_enum, default_value = "all")]
        ongoing: OngoingFilter,

        /// Only this device (`<type>_<id>`)
        #[arg(long)]
        device: Option<String>,

        /// Output file (stdout if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show or initialize the application configuration
    Config {
        /// Write the current configuration to the config file
        #[arg(long)]
        init: bool,
    },

    /// Print the built-in analysis configuration as YAML
    ShowDefaults,
}

#[derive(Clone, Copy, ValueEnum)]
enum Series {
    Rates,
    Totals,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Jsonl,
}

#[derive(Clone, Copy, PartialEq, ValueEnum)]
enum OngoingFilter {
    All,
    Only,
    Exclude,
}

impl OngoingFilter {
    fn keeps(self, ongoing: bool) -> bool {
        match self {
            OngoingFilter::All => true,
            OngoingFilter::Only => ongoing,
            OngoingFilter::Exclude => !ongoing,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let mut config = Config::load().context("loading config.json")?;
    if let Some(path) = cli.analysis_config {
        config.analysis_config = Some(path);
    }

    match cli.command {
        Commands::Import { dir, workers } => cmd_import(&config, dir, workers),
        Commands::Status => cmd_status(&config),
        Commands::Export {
            series,
            format,
            unit,
            ongoing,
            device,
            output,
        } => cmd_export(&config, series, format, &unit, ongoing, device, output),
        Commands::Config { init } => cmd_config(&config, init),
        Commands::ShowDefaults => cmd_show_defaults(),
    }
}

fn engine_config(config: &Config) -> Result<EngineConfig> {
    let analysis = config.analysis().context("loading analysis config")?;
    analysis.compile().context("invalid analysis config")
}

fn cmd_import(config: &Config, dir: Option<PathBuf>, workers: Option<usize>) -> Result<()> {
    let engine_config = Arc::new(engine_config(config)?);
    config.ensure_directories()?;

    let dir = dir.unwrap_or_else(|| config.data_path.clone());
    let store = Arc::new(JsonFileStore::new(&config.store_path));
    let stats = Arc::new(ImportStats::with_persistence(config.stats_path()));

    let importer = BatchImporter::new(engine_config, store, Arc::clone(&stats))
        .with_workers(workers.unwrap_or(config.workers));
    let report = importer
        .import_dir(&dir)
        .with_context(|| format!("importing {dir:?}"))?;

    println!("beatlog v{VERSION}");
    println!();
    let mut imported = 0;
    for file in report.imported() {
        imported += 1;
        println!(
            "  imported {} ({} sessions, {} rate samples, {} hours, {} malformed rows)",
            file.source,
            file.report.sessions,
            file.rate_samples,
            file.total_beats,
            file.report.malformed.len()
        );
        for warning in &file.report.warnings {
            println!("    warning: {warning}");
        }
    }
    let mut failed = 0;
    for (path, err) in report.failures() {
        failed += 1;
        eprintln!("  failed {path:?}: {err}");
    }

    println!();
    println!(
        "This run: {imported} imported, {} duplicate(s) skipped, {failed} failed",
        report.duplicates()
    );
    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save import stats: {e}");
    }

    println!();
    println!("Cumulative {}", stats.summary());
    Ok(())
}

fn cmd_status(config: &Config) -> Result<()> {
    println!("beatlog Status");
    println!("==============");
    println!();
    println!("Configuration:");
    println!("  Config file: {:?}", Config::config_path());
    println!("  Log directory: {:?}", config.data_path);
    println!("  Store: {:?}", config.store_path);
    match &config.analysis_config {
        Some(path) => println!("  Analysis config: {path:?}"),
        None => println!("  Analysis config: built-in defaults"),
    }
    println!("  Workers: {}", config.workers);
    println!();

    let engine_config = engine_config(config)?;
    println!("Analysis:");
    for family in engine_config.devices.families() {
        println!("  {}: ceiling {}/s", family.name, family.ceiling);
    }
    println!("  Gap threshold: {}s", engine_config.max_gap.num_milliseconds() as f64 / 1000.0);
    println!("  Nominal sample length: {}s", engine_config.sample_len.num_seconds());
    println!();

    let store = JsonFileStore::new(&config.store_path);
    let sources = store.sources()?;
    println!("Stored files: {}", sources.len());
    for source in &sources {
        println!("  {source}");
    }
    println!();

    if config.stats_path().exists() {
        let stats = ImportStats::with_persistence(config.stats_path());
        println!("Cumulative {}", stats.summary());
    } else {
        println!("No previous import data found.");
    }
    Ok(())
}

/// Rate row as exported, in the requested unit.
#[derive(Serialize)]
struct RateRow<'a> {
    device_type: &'a str,
    device_id: &'a str,
    log_version: &'a str,
    test_id: u32,
    time: String,
    rate: f64,
    unit: &'a str,
    ongoing: bool,
    synthetic: bool,
}

#[derive(Serialize)]
struct TotalRow<'a> {
    device_type: &'a str,
    device_id: &'a str,
    log_version: &'a str,
    test_id: u32,
    hour_bucket: String,
    total_beats: f64,
    counter_beats: f64,
    derived_beats: f64,
    is_hour_complete: bool,
    ongoing: bool,
}

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn cmd_export(
    config: &Config,
    series: Series,
    format: Format,
    unit: &str,
    ongoing: OngoingFilter,
    device: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let engine_config = engine_config(config)?;
    if !engine_config.units.contains(unit) {
        bail!("unit '{unit}' is not in hr_param_dict");
    }

    let store = JsonFileStore::new(&config.store_path);
    let mut records: Vec<StoredFile> = Vec::new();
    for source in store.sources()? {
        if device.as_deref().is_some_and(|d| !d.eq_ignore_ascii_case(&source.title())) {
            continue;
        }
        if let Some(record) = store.load(&source)? {
            records.push(record);
        }
    }
    if records.is_empty() {
        println!("No stored files found in {:?}", config.store_path);
        println!("Run 'beatlog import' first.");
        return Ok(());
    }

    let sink: Box<dyn Write> = match &output {
        Some(path) => Box::new(
            std::fs::File::create(path).with_context(|| format!("creating {path:?}"))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut writer = RowWriter::new(format, sink);

    let mut written = 0usize;
    for record in &records {
        match series {
            Series::Rates => {
                for s in record.rate_samples.iter().filter(|s| ongoing.keeps(s.ongoing)) {
                    let rate = engine_config
                        .units
                        .from_beats_per_sec(s.rate, unit)
                        .ok_or_else(|| anyhow!("unit '{unit}' vanished from hr_param_dict"))?;
                    writer.write(&RateRow {
                        device_type: &s.device_type,
                        device_id: &s.device_id,
                        log_version: &s.log_version,
                        test_id: s.test_id,
                        time: s.time.format(TIME_FORMAT).to_string(),
                        rate,
                        unit,
                        ongoing: s.ongoing,
                        synthetic: s.synthetic,
                    })?;
                    written += 1;
                }
            }
            Series::Totals => {
                for t in record.total_beats.iter().filter(|t| ongoing.keeps(t.ongoing)) {
                    writer.write(&TotalRow {
                        device_type: &t.device_type,
                        device_id: &t.device_id,
                        log_version: &t.log_version,
                        test_id: t.test_id,
                        hour_bucket: t.hour_bucket.format(TIME_FORMAT).to_string(),
                        total_beats: t.total_beats,
                        counter_beats: t.counter_beats,
                        derived_beats: t.derived_beats,
                        is_hour_complete: t.is_hour_complete,
                        ongoing: t.ongoing,
                    })?;
                    written += 1;
                }
            }
        }
    }
    writer.finish()?;

    if let Some(path) = output {
        println!("Exported {written} rows from {} file(s) to {path:?}", records.len());
    }
    Ok(())
}

/// CSV or JSON Lines over any sink.
enum RowWriter {
    Csv(csv::Writer<Box<dyn Write>>),
    Jsonl(Box<dyn Write>),
}

impl RowWriter {
    fn new(format: Format, sink: Box<dyn Write>) -> Self {
        match format {
            Format::Csv => RowWriter::Csv(csv::Writer::from_writer(sink)),
            Format::Jsonl => RowWriter::Jsonl(sink),
        }
    }

    fn write<T: Serialize>(&mut self, row: &T) -> Result<()> {
        match self {
            RowWriter::Csv(w) => w.serialize(row)?,
            RowWriter::Jsonl(w) => {
                serde_json::to_writer(&mut *w, row)?;
                w.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<()> {
        match self {
            RowWriter::Csv(mut w) => w.flush()?,
            RowWriter::Jsonl(mut w) => w.flush()?,
        }
        Ok(())
    }
}

fn cmd_config(config: &Config, init: bool) -> Result<()> {
    if init {
        config.save()?;
        println!("Wrote {:?}", Config::config_path());
        return Ok(());
    }

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    println!();
    println!("Analysis:");
    print!("{}", config.analysis()?.to_yaml()?);
    Ok(())
}

fn cmd_show_defaults() -> Result<()> {
    print!("{}", AnalysisConfig::default().to_yaml()?);
    Ok(())
}
