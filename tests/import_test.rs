//! Batch import against the JSON file store.

use beatlog::store::{JsonFileStore, SampleStore};
use beatlog::{AnalysisConfig, BatchImporter, ImportStats};
use std::path::Path;
use std::sync::Arc;

const HSET_LOG: &str = "\
00:00:00,v1,1.7.0.0,,
00:00:10,v1,1.7.0.1,180,m
00:00:10,v1,1.7.0.1,200,m
00:00:20,v1,1.7.0.1,600,m
00:00:30,v1,1.7.1.0,,
";

const HPHIRE_LOG: &str = "\
08:00:00,v3,170,,
08:00:00,v3,200,2,s
08:01:00,v3,200,2,s
08:01:00,v3,1.7.0.2,100,
08:02:00,v3,1.7.0.2,220,
";

fn write(dir: &Path, name: &str, body: &str) {
    std::fs::write(dir.join(name), body).unwrap();
}

fn importer(store: Arc<JsonFileStore>, stats: Arc<ImportStats>) -> BatchImporter {
    let config = AnalysisConfig::default().compile().unwrap();
    BatchImporter::new(Arc::new(config), store, stats).with_workers(4)
}

#[test]
fn test_import_directory_into_json_store() {
    let logs = tempfile::tempdir().unwrap();
    let store_dir = tempfile::tempdir().unwrap();
    write(logs.path(), "hset_001_2024-03-01.csv", HSET_LOG);
    write(logs.path(), "HPHIRE_9_20240302.CSV", HPHIRE_LOG);
    write(logs.path(), "readme.txt", "not a log");

    let store = Arc::new(JsonFileStore::new(store_dir.path()));
    let stats = Arc::new(ImportStats::new());
    let report = importer(store.clone(), stats.clone())
        .import_dir(logs.path())
        .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.imported().count(), 2);
    assert_eq!(stats.snapshot().files_imported, 2);

    let sources = store.sources().unwrap();
    let titles: Vec<String> = sources.iter().map(|s| s.title()).collect();
    assert_eq!(titles, vec!["hphire_9", "hset_001"]);

    let hset = store.load(&sources[1]).unwrap().unwrap();
    let rates: Vec<f64> = hset.rate_samples.iter().map(|s| s.rate).collect();
    assert_eq!(rates, vec![3.0, 5.0]);
    assert_eq!(hset.report.duplicates_dropped, 1);

    let hphire = store.load(&sources[0]).unwrap().unwrap();
    assert!(hphire.rate_samples.iter().all(|s| s.ongoing));
    assert_eq!(hphire.report.warnings.len(), 1);
    let counted: f64 = hphire.total_beats.iter().map(|t| t.counter_beats).sum();
    assert!((counted - 120.0).abs() < 1e-9);
}

#[test]
fn test_reimport_is_rejected_as_duplicate() {
    let logs = tempfile::tempdir().unwrap();
    let store_dir = tempfile::tempdir().unwrap();
    write(logs.path(), "hset_001_2024-03-01.csv", HSET_LOG);

    let store = Arc::new(JsonFileStore::new(store_dir.path()));
    let stats = Arc::new(ImportStats::new());
    importer(store.clone(), stats.clone())
        .import_dir(logs.path())
        .unwrap();
    let before = store.load(&store.sources().unwrap()[0]).unwrap().unwrap();

    // Same device and date under a different file name spelling.
    let again = tempfile::tempdir().unwrap();
    write(again.path(), "HSET_001_20240301.csv", HSET_LOG);
    let report = importer(store.clone(), stats.clone())
        .import_dir(again.path())
        .unwrap();

    assert_eq!(report.duplicates(), 1);
    assert_eq!(report.imported().count(), 0);
    let err = report.outcomes[0].result.as_ref().unwrap_err();
    assert!(err.to_string().contains("already imported"));

    let after = store.load(&store.sources().unwrap()[0]).unwrap().unwrap();
    assert_eq!(before.run_id, after.run_id);
    assert_eq!(stats.snapshot().files_duplicate, 1);
}

#[test]
fn test_undecodable_row_is_reported_not_fatal() {
    let logs = tempfile::tempdir().unwrap();
    let store_dir = tempfile::tempdir().unwrap();
    let mut body = b"00:00:00,v1,170,,\n00:00:10,v1,200,".to_vec();
    body.extend_from_slice(b"\xff\xfe,s\n00:00:20,v1,200,2,s\n00:00:30,v1,171,,\n");
    std::fs::write(logs.path().join("hset_002_2024-03-01.csv"), body).unwrap();

    let store = Arc::new(JsonFileStore::new(store_dir.path()));
    let stats = Arc::new(ImportStats::new());
    let report = importer(store.clone(), stats.clone())
        .import_dir(logs.path())
        .unwrap();

    assert_eq!(report.imported().count(), 1);
    let file = report.imported().next().unwrap();
    assert_eq!(file.report.rows_read, 4);
    assert_eq!(file.report.malformed.len(), 1);
    assert_eq!(file.report.malformed[0].line, 2);
    assert_eq!(file.report.sessions, 1);
    assert_eq!(file.rate_samples, 1);
}

#[test]
fn test_yaml_config_aliases_and_overrides() {
    let yaml = "\
cap: [4, 8]
max_gap: 30
sample_rate: 5
total_beats_code: [1.7.0.2, 300]
";
    let config = AnalysisConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(config.cup, vec![4.0, 8.0]);
    assert_eq!(config.time_delta, 30.0);
    assert_eq!(config.sample_len, 5);

    let engine = config.compile().unwrap();
    assert_eq!(engine.devices.lookup("hset").unwrap().ceiling, 4.0);
    assert_eq!(engine.max_gap, chrono::Duration::seconds(30));
}

#[test]
fn test_invalid_config_is_fatal() {
    let yaml = "device_types: [hset, hphire]\ncup: [5]\n";
    let config = AnalysisConfig::from_yaml_str(yaml).unwrap();
    assert!(config.compile().is_err());
}
