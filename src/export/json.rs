//! JSON writers: an array of row objects, keys in column order.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::ExportResult;

use super::table::{DistributionTable, SummaryTable};

pub fn write_summary_json<W: Write>(table: &SummaryTable, writer: W) -> ExportResult<()> {
    write_rows(&table.rows, writer)
}

pub fn write_summary_json_path(table: &SummaryTable, path: impl AsRef<Path>) -> ExportResult<()> {
    let file = File::create(path)?;
    write_summary_json(table, BufWriter::new(file))
}

pub fn write_distribution_json<W: Write>(table: &DistributionTable, writer: W) -> ExportResult<()> {
    write_rows(&table.rows, writer)
}

pub fn write_distribution_json_path(table: &DistributionTable, path: impl AsRef<Path>) -> ExportResult<()> {
    let file = File::create(path)?;
    write_distribution_json(table, BufWriter::new(file))
}

/// Pretty-printed JSON for any serializable value (used for diagnostics).
pub fn write_json_path<T: Serialize>(value: &T, path: impl AsRef<Path>) -> ExportResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn write_rows<T: Serialize, W: Write>(rows: &[T], writer: W) -> ExportResult<()> {
    let mut writer = writer;
    serde_json::to_writer_pretty(&mut writer, rows)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
