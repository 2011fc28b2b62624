use udise_metrics::config::ColumnSelection;
use udise_metrics::ingestion::json::{load_json_from_path, load_json_from_str};

#[test]
fn load_json_array_from_path() {
    let loaded = load_json_from_path("tests/fixtures/schools.json", &ColumnSelection::default()).unwrap();

    assert_eq!(loaded.report.rows_read, 5);
    assert_eq!(loaded.records.len(), 4);
    assert_eq!(loaded.report.dropped_missing_id, 1);

    let first = &loaded.records[0];
    assert_eq!(first.school_id, "29010100101");
    assert_eq!(first.state.as_deref(), Some("Karnataka"));
    // Numeric codes are kept as their JSON text.
    assert_eq!(first.rural_urban.as_deref(), Some("1"));
    assert_eq!(loaded.records[1].rural_urban.as_deref(), Some("2.0"));
    assert_eq!(loaded.records[2].block, None);
    assert_eq!(loaded.records[2].rural_urban, None);
}

#[test]
fn ndjson_lines_are_records() {
    let input = r#"{"pseudocode": 1, "state": "Goa", "district": "North Goa"}
{"pseudocode": 2, "state": "Goa", "district": "South Goa"}

{"pseudocode": 3, "state": "Goa"}
"#;
    let loaded = load_json_from_str(input, &ColumnSelection::default()).unwrap();
    assert_eq!(loaded.records.len(), 3);
    assert_eq!(loaded.records[0].school_id, "1");
    assert_eq!(loaded.records[2].district, None);
}

#[test]
fn nested_fields_resolve_through_dot_paths() {
    let mut selection = ColumnSelection::default();
    selection.state = vec!["location.state".to_string()];
    selection.district = vec!["location.district".to_string()];
    let input = r#"[{"pseudocode": "9", "location": {"state": "Sikkim", "district": "Gangtok"}}]"#;

    let loaded = load_json_from_str(input, &selection).unwrap();
    assert_eq!(loaded.records[0].state.as_deref(), Some("Sikkim"));
    assert_eq!(loaded.records[0].district.as_deref(), Some("Gangtok"));
}

#[test]
fn missing_identifier_field_is_a_load_error() {
    let input = r#"[{"state": "Goa"}]"#;
    let err = load_json_from_str(input, &ColumnSelection::default()).unwrap_err();
    assert!(err.to_string().contains("missing required column for school_id"));
}

#[test]
fn invalid_json_is_an_error() {
    let err = load_json_from_str("[{\"pseudocode\": ", &ColumnSelection::default()).unwrap_err();
    assert!(err.to_string().contains("json error"));
}
