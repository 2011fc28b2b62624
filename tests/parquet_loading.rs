use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parquet::data_type::{ByteArray, ByteArrayType, DoubleType, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;

use udise_metrics::config::ColumnSelection;
use udise_metrics::ingestion::parquet::load_parquet_from_path;
use udise_metrics::ingestion::{LoadOptions, load_from_path};
use udise_metrics::types::ColumnRole;

fn tmp_file(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("udise-metrics-{name}-{nanos}.parquet"))
}

/// Writes a UDISE-like table: numeric ids, a float rural-urban code (nullable) and an extra
/// unselected column.
fn write_schools_parquet(path: &PathBuf, include_state: bool) {
    let schema_str = if include_state {
        r#"
        message schema {
          REQUIRED INT64 pseudocode;
          REQUIRED BINARY state (UTF8);
          OPTIONAL DOUBLE rural_urban;
          REQUIRED INT64 total_teachers;
        }
        "#
    } else {
        r#"
        message schema {
          REQUIRED INT64 pseudocode;
          OPTIONAL DOUBLE rural_urban;
          REQUIRED INT64 total_teachers;
        }
        "#
    };

    let schema = Arc::new(parse_message_type(schema_str).unwrap());
    let props = Arc::new(WriterProperties::builder().build());
    let file = File::create(path).unwrap();
    let mut writer = SerializedFileWriter::new(file, schema, props).unwrap();

    let mut rg = writer.next_row_group().unwrap();
    let mut col_idx: usize = 0;
    while let Some(mut col) = rg.next_column().unwrap() {
        let name = if include_state {
            ["pseudocode", "state", "rural_urban", "total_teachers"][col_idx]
        } else {
            ["pseudocode", "rural_urban", "total_teachers"][col_idx]
        };
        match name {
            "pseudocode" => {
                col.typed::<Int64Type>()
                    .write_batch(&[3201, 3202, 3203], None, None)
                    .unwrap();
            }
            "state" => {
                let v: Vec<ByteArray> = ["Kerala", "Kerala", "Goa"].into_iter().map(ByteArray::from).collect();
                col.typed::<ByteArrayType>().write_batch(&v, None, None).unwrap();
            }
            "rural_urban" => {
                // Third row is null.
                col.typed::<DoubleType>()
                    .write_batch(&[1.0, 2.0], Some(&[1, 1, 0]), None)
                    .unwrap();
            }
            _ => {
                col.typed::<Int64Type>()
                    .write_batch(&[10, 12, 4], None, None)
                    .unwrap();
            }
        }
        col.close().unwrap();
        col_idx += 1;
    }
    rg.close().unwrap();
    writer.close().unwrap();
}

#[test]
fn load_parquet_happy_path() {
    let path = tmp_file("schools");
    write_schools_parquet(&path, true);

    let loaded = load_parquet_from_path(&path, &ColumnSelection::default()).unwrap();
    assert_eq!(loaded.records.len(), 3);
    assert_eq!(loaded.records[0].school_id, "3201");
    assert_eq!(loaded.records[0].state.as_deref(), Some("Kerala"));
    // Float codes are rendered without a fractional part.
    assert_eq!(loaded.records[0].rural_urban.as_deref(), Some("1"));
    assert_eq!(loaded.records[1].rural_urban.as_deref(), Some("2"));
    assert_eq!(loaded.records[2].rural_urban, None);

    let source = &loaded.report.sources[0];
    assert!(source.missing_optional.contains(&ColumnRole::District));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn load_parquet_errors_on_missing_state_column() {
    let path = tmp_file("no-state");
    write_schools_parquet(&path, false);

    let err = load_parquet_from_path(&path, &ColumnSelection::default()).unwrap_err();
    assert!(err.to_string().contains("missing required column for state"));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn unified_loader_detects_parquet_extension() {
    let path = tmp_file("unified");
    write_schools_parquet(&path, true);

    let options = LoadOptions {
        row_limit: Some(2),
        ..LoadOptions::default()
    };
    let loaded = load_from_path(&path, &ColumnSelection::default(), &options).unwrap();
    assert_eq!(loaded.records.len(), 2);
    assert!(loaded.report.truncated);

    let _ = std::fs::remove_file(&path);
}
