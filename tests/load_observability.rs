use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use udise_metrics::LoadError;
use udise_metrics::config::ColumnSelection;
use udise_metrics::ingestion::{
    CompositeObserver, FileObserver, LoadContext, LoadObserver, LoadOptions, LoadSeverity, LoadStats, SourceFormat,
    load_from_path, load_glob, load_sources,
};

#[derive(Default)]
struct RecordingObserver {
    successes: Mutex<Vec<LoadStats>>,
    failures: Mutex<Vec<LoadSeverity>>,
    alerts: Mutex<Vec<LoadSeverity>>,
}

impl LoadObserver for RecordingObserver {
    fn on_success(&self, _ctx: &LoadContext, stats: LoadStats) {
        self.successes.lock().unwrap().push(stats);
    }

    fn on_failure(&self, _ctx: &LoadContext, severity: LoadSeverity, _error: &LoadError) {
        self.failures.lock().unwrap().push(severity);
    }

    fn on_alert(&self, _ctx: &LoadContext, severity: LoadSeverity, _error: &LoadError) {
        self.alerts.lock().unwrap().push(severity);
    }
}

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("udise-metrics-{name}-{nanos}"));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn observer_receives_success_stats() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = LoadOptions {
        observer: Some(obs.clone()),
        ..Default::default()
    };

    load_from_path("tests/fixtures/schools.csv", &ColumnSelection::default(), &opts).unwrap();

    let successes = obs.successes.lock().unwrap().clone();
    assert_eq!(
        successes,
        vec![LoadStats {
            rows_read: 10,
            rows_loaded: 8,
            rows_dropped: 2,
        }]
    );
}

#[test]
fn observer_receives_failure_and_alert_on_critical_io_error() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = LoadOptions {
        format: Some(SourceFormat::Csv),
        observer: Some(obs.clone()),
        alert_at_or_above: LoadSeverity::Critical,
        ..Default::default()
    };

    // Missing file -> Io error -> Critical
    let _ = load_from_path("tests/fixtures/does_not_exist.csv", &ColumnSelection::default(), &opts).unwrap_err();

    assert_eq!(obs.failures.lock().unwrap().clone(), vec![LoadSeverity::Critical]);
    assert_eq!(obs.alerts.lock().unwrap().clone(), vec![LoadSeverity::Critical]);
}

#[test]
fn observer_receives_failure_without_alert_for_schema_error() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = LoadOptions {
        observer: Some(obs.clone()),
        alert_at_or_above: LoadSeverity::Critical,
        ..Default::default()
    };
    let mut selection = ColumnSelection::default();
    selection.state = vec!["definitely_missing".to_string()];

    let _ = load_from_path("tests/fixtures/schools.csv", &selection, &opts).unwrap_err();

    assert_eq!(obs.failures.lock().unwrap().clone(), vec![LoadSeverity::Error]);
    assert!(obs.alerts.lock().unwrap().is_empty());
}

#[test]
fn composite_and_file_observers_fan_out() {
    let dir = tmp_dir("observers");
    let log_path = dir.join("load.log");
    let recording = Arc::new(RecordingObserver::default());
    let recording_obs: Arc<dyn LoadObserver> = recording.clone();
    let file_obs: Arc<dyn LoadObserver> = Arc::new(FileObserver::new(&log_path));
    let composite = CompositeObserver::new(vec![recording_obs, file_obs]);
    let opts = LoadOptions {
        observer: Some(Arc::new(composite)),
        ..Default::default()
    };

    load_from_path("tests/fixtures/schools.json", &ColumnSelection::default(), &opts).unwrap();

    assert_eq!(recording.successes.lock().unwrap().len(), 1);
    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("ok format=Json"));
    assert!(log.contains("kept=4"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn shards_are_concatenated_with_unique_ids() {
    let dir = tmp_dir("shards");
    let part1 = dir.join("profile_data_1.csv");
    let part2 = dir.join("profile_data_2.csv");
    std::fs::write(&part1, "pseudocode,state\n1,Goa\n2,Goa\n").unwrap();
    // The second part repeats id 2 and uses a different header spelling.
    std::fs::write(&part2, "udise_code,state_name\n2,Goa\n3,Kerala\n").unwrap();

    let obs = Arc::new(RecordingObserver::default());
    let opts = LoadOptions {
        observer: Some(obs.clone()),
        ..Default::default()
    };
    let loaded = load_sources(&[part1.clone(), part2.clone()], &ColumnSelection::default(), &opts).unwrap();
    assert_eq!(loaded.records.len(), 3);
    assert_eq!(loaded.report.dropped_duplicate_id, 1);
    assert_eq!(loaded.report.sources.len(), 2);
    assert_eq!(obs.successes.lock().unwrap()[1].rows_dropped, 1);

    let pattern = format!("{}/profile_data_*.csv", dir.display());
    let globbed = load_glob(&pattern, &ColumnSelection::default(), &LoadOptions::default()).unwrap();
    assert_eq!(globbed.records, loaded.records);

    let none = format!("{}/nothing_*.csv", dir.display());
    let err = load_glob(&none, &ColumnSelection::default(), &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, LoadError::NoSources { .. }));

    let _ = std::fs::remove_dir_all(&dir);
}
