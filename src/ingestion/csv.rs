//! CSV loading.

use std::path::Path;

use crate::config::ColumnSelection;
use crate::error::LoadResult;
use crate::types::ColumnRole;

use super::records::{LoadedRecords, RecordCollector, RoleCells, clean_cell, resolve_columns};
use super::unified::SourceFormat;

/// Load school records from a CSV file.
///
/// Rules:
///
/// - CSV must have headers.
/// - Only the columns bound by `selection` are materialized; all other columns are skipped.
/// - Short rows are accepted; absent cells count as missing values.
/// - Cells that are not valid UTF-8 are decoded as Latin-1 and counted in the report.
pub fn load_csv_from_path(path: impl AsRef<Path>, selection: &ColumnSelection) -> LoadResult<LoadedRecords> {
    let path = path.as_ref();
    let mut collector = RecordCollector::new(None);
    read_csv_path_into(path, selection, &mut collector)?;
    Ok(collector.finish())
}

/// Load school records from an existing CSV reader.
pub fn load_csv_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    selection: &ColumnSelection,
) -> LoadResult<LoadedRecords> {
    let mut collector = RecordCollector::new(None);
    read_csv_into(rdr, "<reader>".to_string(), selection, &mut collector)?;
    Ok(collector.finish())
}

pub(crate) fn read_csv_path_into(
    path: &Path,
    selection: &ColumnSelection,
    collector: &mut RecordCollector,
) -> LoadResult<()> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    read_csv_into(&mut rdr, path.display().to_string(), selection, collector)
}

pub(crate) fn read_csv_into<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    source: String,
    selection: &ColumnSelection,
    collector: &mut RecordCollector,
) -> LoadResult<()> {
    let headers: Vec<String> = rdr
        .byte_headers()?
        .iter()
        .map(|h| decode_cell(h).0)
        .collect();
    let columns = resolve_columns(&headers, selection)?;
    collector.begin_source(source, SourceFormat::Csv, &columns);

    let mut record = csv::ByteRecord::new();
    let mut row_idx0 = 0usize;
    while rdr.read_byte_record(&mut record)? {
        // 1-based row number for users; +1 again because header is row 1.
        let user_row = row_idx0 + 2;
        row_idx0 += 1;

        let mut cells: RoleCells = Default::default();
        let mut lossy_cells = 0;
        for role in ColumnRole::ALL {
            let Some(idx) = columns.index(role) else {
                continue;
            };
            let Some(raw) = record.get(idx) else {
                continue;
            };
            let (text, lossy) = decode_cell(raw);
            if lossy {
                lossy_cells += 1;
            }
            cells[role.index()] = clean_cell(&text);
        }
        if !collector.push(user_row, cells) {
            break;
        }
        collector.note_lossy_cells(lossy_cells);
    }
    Ok(())
}

/// Decode a cell as UTF-8, falling back to Latin-1. The flag is `true` when the fallback was used.
fn decode_cell(raw: &[u8]) -> (String, bool) {
    match std::str::from_utf8(raw) {
        Ok(s) => (s.to_owned(), false),
        Err(_) => (raw.iter().map(|&b| char::from(b)).collect(), true),
    }
}
