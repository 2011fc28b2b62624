//! Parquet loading.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parquet::file::reader::{ChunkReader, FileReader};
use parquet::file::serialized_reader::SerializedFileReader;
use parquet::record::Field;
use parquet::schema::types::Type;

use crate::config::ColumnSelection;
use crate::error::LoadResult;
use crate::types::ColumnRole;

use super::records::{LoadedRecords, RecordCollector, RoleCells, clean_cell, resolve_columns};
use super::unified::SourceFormat;

/// Load school records from a Parquet file.
///
/// Notes:
/// - Candidates are matched against top-level column names
/// - Rows are read through a projection of the selected columns only, so unselected columns are
///   never decoded
pub fn load_parquet_from_path(path: impl AsRef<Path>, selection: &ColumnSelection) -> LoadResult<LoadedRecords> {
    let mut collector = RecordCollector::new(None);
    read_parquet_path_into(path.as_ref(), selection, &mut collector)?;
    Ok(collector.finish())
}

pub(crate) fn read_parquet_path_into(
    path: &Path,
    selection: &ColumnSelection,
    collector: &mut RecordCollector,
) -> LoadResult<()> {
    let reader = SerializedFileReader::try_from(path)?;

    let fields = top_level_fields(&reader);
    let headers: Vec<String> = fields.iter().map(|f| f.name().to_string()).collect();
    let columns = resolve_columns(&headers, selection)?;
    collector.begin_source(path.display().to_string(), SourceFormat::Parquet, &columns);

    let used = columns.used_indexes();
    let projected: Vec<Arc<Type>> = used.iter().map(|&i| Arc::clone(&fields[i])).collect();
    let projection = Type::group_type_builder("schema")
        .with_fields(projected)
        .build()?;

    // Projected rows are keyed by column name.
    let role_columns: Vec<(ColumnRole, String)> = ColumnRole::ALL
        .iter()
        .filter_map(|&role| columns.index(role).map(|idx| (role, headers[idx].clone())))
        .collect();

    for (idx0, row_res) in reader.get_row_iter(Some(projection))?.enumerate() {
        let row = row_res?;

        let by_name: HashMap<&str, &Field> = row
            .get_column_iter()
            .map(|(name, field)| (name.as_str(), field))
            .collect();

        let mut cells: RoleCells = Default::default();
        for (role, name) in &role_columns {
            cells[role.index()] = by_name.get(name.as_str()).and_then(|f| field_text(f));
        }
        if !collector.push(idx0 + 1, cells) {
            break;
        }
    }
    Ok(())
}

fn top_level_fields<R: ChunkReader + 'static>(reader: &SerializedFileReader<R>) -> Vec<Arc<Type>> {
    reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .root_schema()
        .get_fields()
        .to_vec()
}

fn field_text(f: &Field) -> Option<String> {
    match f {
        Field::Null => None,
        Field::Str(s) => clean_cell(s),
        Field::Bytes(b) => clean_cell(&String::from_utf8_lossy(b.data())),
        Field::Float(v) => Some(v.to_string()),
        Field::Double(v) => Some(v.to_string()),
        other => clean_cell(&other.to_string()),
    }
}
