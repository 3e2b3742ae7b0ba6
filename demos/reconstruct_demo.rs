//! Reconstruct one in-memory log and print both series.
//!
//! Run with: cargo run --example reconstruct_demo

use beatlog::core::Engine;
use beatlog::ingest::{LogSource, RawRow};
use beatlog::EngineConfig;
use chrono::NaiveDate;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let rows: Vec<RawRow> = [
        "09:58:00,v2,1.7.0.0,,",
        "09:58:00,v2,1.7.0.1,90,m",
        "09:58:10,v2,1.7.0.1,96,m",
        "09:58:10,v2,1.7.0.1,400,m",
        "09:58:20,v2,1.7.0.1,420,m",
        "10:00:00,v2,1.7.0.2,1500,",
        "10:05:00,v2,1.7.0.2,1950,",
        "10:05:00,v2,1.7.0.1,88,m",
        "10:07:00,v2,1.7.1.0,,",
    ]
    .iter()
    .enumerate()
    .map(|(i, line)| RawRow::from_fields(i + 1, line.split(',')))
    .collect();

    let source = LogSource::new("hset", "042", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    let engine = Engine::new(Arc::new(EngineConfig::default()));
    let analysis = engine.process_rows(source, &rows)?;

    println!("Rate series (beats/sec):");
    for s in &analysis.rate_samples {
        let tag = if s.synthetic { " (gap)" } else { "" };
        println!("  test {} {} {:>6.3}{tag}", s.test_id, s.time.time(), s.rate);
    }

    println!();
    println!("Hourly totals:");
    for t in &analysis.total_beats {
        println!(
            "  {} total={:.1} counter={:.1} derived={:.1} complete={}",
            t.hour_bucket, t.total_beats, t.counter_beats, t.derived_beats, t.is_hour_complete
        );
    }

    println!();
    println!("{:#?}", analysis.report);
    Ok(())
}
