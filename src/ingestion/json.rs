//! JSON loading.
//!
//! Supported inputs:
//! - A JSON array of objects: `[{"a":1}, {"a":2}]`
//! - A single JSON object
//! - Newline-delimited JSON (NDJSON): `{"a":1}\n{"a":2}\n`, parsed one line at a time
//!
//! Column candidates may be dot paths into nested objects (e.g. `location.state`). Columns are
//! resolved against the first object; later objects missing a resolved path yield missing values.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::config::ColumnSelection;
use crate::error::{LoadError, LoadResult};
use crate::types::ColumnRole;

use super::records::{ColumnMap, LoadedRecords, RecordCollector, RoleCells, clean_cell, resolve_columns};
use super::unified::SourceFormat;

/// Load school records from a JSON or NDJSON file.
pub fn load_json_from_path(path: impl AsRef<Path>, selection: &ColumnSelection) -> LoadResult<LoadedRecords> {
    let mut collector = RecordCollector::new(None);
    read_json_path_into(path.as_ref(), selection, &mut collector)?;
    Ok(collector.finish())
}

/// Load school records from an in-memory JSON / NDJSON string.
pub fn load_json_from_str(input: &str, selection: &ColumnSelection) -> LoadResult<LoadedRecords> {
    let mut collector = RecordCollector::new(None);
    read_json_str_into(input, "<string>".to_string(), selection, &mut collector)?;
    Ok(collector.finish())
}

pub(crate) fn read_json_path_into(
    path: &Path,
    selection: &ColumnSelection,
    collector: &mut RecordCollector,
) -> LoadResult<()> {
    let text = fs::read_to_string(path)?;
    read_json_str_into(&text, path.display().to_string(), selection, collector)
}

pub(crate) fn read_json_str_into(
    input: &str,
    source: String,
    selection: &ColumnSelection,
    collector: &mut RecordCollector,
) -> LoadResult<()> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(LoadError::UnsupportedFormat {
            message: format!("json input is empty ({source})"),
        });
    }

    if trimmed.starts_with('[') {
        let items: Vec<Value> = serde_json::from_str(trimmed)?;
        let mut sink = JsonSink::new(source, selection);
        for (idx0, v) in items.iter().enumerate() {
            if !sink.push(idx0 + 1, v, collector)? {
                break;
            }
        }
        return sink.finish(collector);
    }

    // A lone object parses as one value; NDJSON fails fast after its first line.
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        if !v.is_object() {
            return Err(LoadError::UnsupportedFormat {
                message: "json must be an object, an array of objects, or NDJSON".to_string(),
            });
        }
        let mut sink = JsonSink::new(source, selection);
        sink.push(1, &v, collector)?;
        return sink.finish(collector);
    }

    let mut sink = JsonSink::new(source, selection);
    for (idx0, line) in trimmed.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let v = serde_json::from_str::<Value>(line).map_err(|e| LoadError::UnsupportedFormat {
            message: format!("invalid ndjson at line {}: {}", idx0 + 1, e),
        })?;
        if !sink.push(idx0 + 1, &v, collector)? {
            break;
        }
    }
    sink.finish(collector)
}

/// Resolves columns lazily on the first object, then feeds rows to the collector.
struct JsonSink<'a> {
    source: String,
    selection: &'a ColumnSelection,
    resolved: Option<(ColumnMap, Vec<String>)>,
}

impl<'a> JsonSink<'a> {
    fn new(source: String, selection: &'a ColumnSelection) -> Self {
        Self {
            source,
            selection,
            resolved: None,
        }
    }

    /// Returns `false` once the row limit stopped the load.
    fn push(&mut self, row_num: usize, v: &Value, collector: &mut RecordCollector) -> LoadResult<bool> {
        let obj = v.as_object().ok_or_else(|| LoadError::UnsupportedFormat {
            message: format!("row {row_num} is not a json object"),
        })?;

        if self.resolved.is_none() {
            let paths = candidate_paths_present(obj, self.selection);
            let columns = resolve_columns(&paths, self.selection)?;
            collector.begin_source(self.source.clone(), SourceFormat::Json, &columns);
            self.resolved = Some((columns, paths));
        }
        let Some((columns, paths)) = self.resolved.as_ref() else {
            return Ok(false);
        };

        let mut cells: RoleCells = Default::default();
        for role in ColumnRole::ALL {
            if let Some(idx) = columns.index(role) {
                cells[role.index()] = get_by_dot_path(obj, &paths[idx]).and_then(json_text);
            }
        }
        Ok(collector.push(row_num, cells))
    }

    /// An input without any object still has to register (and validate) its columns, unless the
    /// row limit stopped reading before the first object.
    fn finish(self, collector: &mut RecordCollector) -> LoadResult<()> {
        if self.resolved.is_none() && !collector.is_full() {
            let columns = resolve_columns(&[], self.selection)?;
            collector.begin_source(self.source, SourceFormat::Json, &columns);
        }
        Ok(())
    }
}

/// The "headers" of a JSON object: its top-level keys plus every candidate dot path it contains.
fn candidate_paths_present(obj: &Map<String, Value>, selection: &ColumnSelection) -> Vec<String> {
    let mut paths: Vec<String> = obj.keys().cloned().collect();
    for role in ColumnRole::ALL {
        for cand in selection.candidates(role) {
            if cand.contains('.') && get_by_dot_path(obj, cand).is_some() && !paths.contains(cand) {
                paths.push(cand.clone());
            }
        }
    }
    paths
}

/// Look up a dot path, matching each segment case-insensitively.
fn get_by_dot_path<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = lookup_ci(root, segments.next()?)?;
    for segment in segments {
        match current {
            Value::Object(map) => current = lookup_ci(map, segment)?,
            _ => return None,
        }
    }
    Some(current)
}

fn lookup_ci<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(key.trim()))
            .map(|(_, v)| v)
    })
}

fn json_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => clean_cell(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
