use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use udise_metrics::config::PipelineConfig;
use udise_metrics::execution::{ExecutionEvent, ExecutionObserver};
use udise_metrics::export::ExportFormat;
use udise_metrics::pipeline::{Pipeline, run_to_dir};
use udise_metrics::processing::{MetricValue, NormalizationWarning, Tier};
use udise_metrics::types::{ColumnRole, GeoKey, GeoLevel, RawSchoolRecord};

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("udise-metrics-{name}-{nanos}"))
}

fn state(name: &str) -> GeoKey {
    GeoKey::State(name.to_string())
}

fn close(v: MetricValue, expected: f64) -> bool {
    v.as_f64().is_some_and(|x| (x - expected).abs() < 1e-9)
}

fn two_state_records() -> Vec<RawSchoolRecord> {
    let mut raw = Vec::new();
    for i in 0..4 {
        raw.push(RawSchoolRecord::new(format!("a-r{i}"), Some("Goa")).with_rural_urban("1"));
    }
    for i in 0..2 {
        raw.push(RawSchoolRecord::new(format!("a-u{i}"), Some("Goa")).with_rural_urban("2"));
    }
    for i in 0..4 {
        raw.push(RawSchoolRecord::new(format!("b-{i}"), Some("Sikkim")));
    }
    raw
}

#[test]
fn completeness_and_share_for_two_states() {
    let out = Pipeline::new(PipelineConfig::default())
        .unwrap()
        .run_records(two_state_records());

    let goa = out.metrics.states.get(&state("GOA")).unwrap();
    assert!(close(goa.completeness_ratio, 1.0));
    assert!(close(goa.concentration_share, 60.0));

    let sikkim = out.metrics.states.get(&state("SIKKIM")).unwrap();
    assert_eq!(sikkim.completeness_ratio, MetricValue::Defined(0.0));
    assert!(close(sikkim.concentration_share, 40.0));

    assert_eq!(out.states[&state("SIKKIM")].unclassified_count(), 4);
    assert!(close(out.metrics.national.completeness_ratio, 0.6));
    assert!(close(out.metrics.national.density_ratio, 1.5));
}

#[test]
fn csv_fixture_end_to_end() {
    let out = Pipeline::new(PipelineConfig::default())
        .unwrap()
        .run("tests/fixtures/schools.csv")
        .unwrap();

    assert_eq!(out.national.total(), 8);
    assert_eq!(out.diagnostics.rows_dropped, 2);
    assert_eq!(out.diagnostics.dropped_missing_id, 1);
    assert_eq!(out.diagnostics.dropped_duplicate_id, 1);

    // "KERALA " and "Orissa" collapse onto their canonical labels.
    assert_eq!(out.states[&state("KERALA")].total(), 3);
    assert_eq!(out.states[&state("ODISHA")].total(), 3);
    assert_eq!(out.states.len(), 4);

    // Code 9 is neither rural nor urban.
    let goa = &out.states[&state("GOA")];
    assert_eq!(goa.unclassified_count(), 1);
    assert!(out.diagnostics.warnings.iter().any(|w| w.warning
        == NormalizationWarning::UnrecognizedCode {
            field: ColumnRole::RuralUrban,
            raw: "9".to_string(),
        }));

    // Atlantis (unknown state) and its blank district.
    assert_eq!(out.diagnostics.flagged_names, 2);
    assert_eq!(out.diagnostics.missing_codes[&ColumnRole::RuralUrban], 1);
    assert!(
        out.districts
            .contains_key(&GeoKey::District {
                state: "ATLANTIS".to_string(),
                district: "Unknown".to_string(),
            })
    );

    let ranked: Vec<String> = out
        .summary(GeoLevel::State)
        .rows
        .iter()
        .map(|r| r.key.clone())
        .collect();
    assert_eq!(ranked, vec!["KERALA", "ODISHA", "ATLANTIS", "GOA"]);
    assert!(close(out.metrics.national.completeness_ratio, 0.75));
}

#[test]
fn concentration_shares_sum_to_one_hundred() {
    let out = Pipeline::new(PipelineConfig::default())
        .unwrap()
        .run("tests/fixtures/schools.csv")
        .unwrap();
    let sum: f64 = out
        .metrics
        .states
        .rows
        .iter()
        .filter_map(|m| m.concentration_share.as_f64())
        .sum();
    assert!((sum - 100.0).abs() < 1e-9);

    for m in &out.metrics.districts.rows {
        let c = m.completeness_ratio.as_f64().unwrap();
        assert!((0.0..=1.0).contains(&c));
    }
    assert!(out.states.values().all(|a| a.is_consistent()));
}

#[test]
fn tiers_use_configured_thresholds() {
    let cfg = PipelineConfig::from_json_str(r#"{"tiers": {"top_bottom": {"top_n": 1, "bottom_n": 2}}}"#).unwrap();
    let out = Pipeline::new(cfg).unwrap().run("tests/fixtures/schools.csv").unwrap();

    assert_eq!(out.metrics.tiers[&state("KERALA")], Tier::High);
    assert_eq!(out.metrics.tiers[&state("ODISHA")], Tier::Medium);
    assert_eq!(out.metrics.tiers[&state("ATLANTIS")], Tier::Low);
    assert_eq!(out.metrics.tiers[&state("GOA")], Tier::Low);
}

#[derive(Default)]
struct RunCounter {
    runs: AtomicUsize,
}

impl ExecutionObserver for RunCounter {
    fn on_event(&self, event: &ExecutionEvent) {
        if let ExecutionEvent::RunFinished { .. } = event {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[test]
fn parallel_run_matches_sequential_run() {
    let raw: Vec<RawSchoolRecord> = (0..2_000)
        .map(|i| {
            let state = ["Goa", "Kerala", "Sikkim", "Assam"][i % 4];
            RawSchoolRecord::new(i.to_string(), Some(state))
                .with_district(&format!("D{}", i % 9))
                .with_rural_urban(["1", "2", "", "7"][i % 4])
                .with_school_type(&(i % 3).to_string())
        })
        .collect();

    let sequential = Pipeline::new(PipelineConfig::default())
        .unwrap()
        .run_records(raw.clone());

    let mut cfg = PipelineConfig::default();
    cfg.execution.parallel = true;
    cfg.execution.num_threads = Some(4);
    cfg.execution.chunk_size = 64;
    let counter = Arc::new(RunCounter::default());
    let obs: Arc<dyn ExecutionObserver> = counter.clone();
    let parallel = Pipeline::new(cfg)
        .unwrap()
        .with_execution_observer(obs)
        .run_records(raw);

    assert_eq!(parallel.states, sequential.states);
    assert_eq!(parallel.districts, sequential.districts);
    assert_eq!(parallel.metrics, sequential.metrics);
    // One run per grouped level.
    assert_eq!(counter.runs.load(Ordering::SeqCst), 2);
}

#[test]
fn repeated_runs_write_identical_bytes() {
    let first = tmp_dir("idempotent-a");
    let second = tmp_dir("idempotent-b");
    let sources = [PathBuf::from("tests/fixtures/schools.csv")];

    for format in [ExportFormat::Csv, ExportFormat::Json] {
        let a = run_to_dir(PipelineConfig::default(), &sources, &first, format).unwrap();
        let b = run_to_dir(PipelineConfig::default(), &sources, &second, format).unwrap();
        assert_eq!(a.metrics, b.metrics);

        let written = a.write_to_dir(&first, format).unwrap();
        assert_eq!(written.len(), 8);
        for path in written {
            let name = path.file_name().unwrap();
            let left = std::fs::read(&path).unwrap();
            let right = std::fs::read(second.join(name)).unwrap();
            assert_eq!(left, right, "{} differs between runs", path.display());
        }
    }

    let _ = std::fs::remove_dir_all(&first);
    let _ = std::fs::remove_dir_all(&second);
}

#[test]
fn source_without_district_column_flags_no_names() {
    let dir = tmp_dir("no-district");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("schools.csv");
    std::fs::write(&path, "pseudocode,state,rural_urban\n1,Goa,1\n2,Goa,2\n3,Kerala,1\n").unwrap();

    let out = Pipeline::new(PipelineConfig::default()).unwrap().run(&path).unwrap();
    assert_eq!(out.national.total(), 3);
    assert_eq!(out.diagnostics.flagged_names, 0);
    assert!(out.diagnostics.sources[0].missing_optional.contains(&ColumnRole::District));
    assert_eq!(out.districts.len(), 2);

    let _ = std::fs::remove_dir_all(&dir);
}
