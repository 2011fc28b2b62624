//! Summary exporter.
//!
//! Tables are built in [`table`] and written by the format modules. The summary schema is
//! [`SUMMARY_COLUMNS`] for every level and format:
//!
//! - [`csv`]: header row, full-precision floats, empty cells for undefined values
//! - [`json`]: array of row objects, keys in column order, `null` for undefined values
//! - [`parquet`]: one typed column per summary column, nulls for undefined values

pub mod csv;
pub mod json;
pub mod parquet;
pub mod table;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ExportResult;

pub use table::{
    DISTRIBUTION_COLUMNS, DistributionRow, DistributionTable, SUMMARY_COLUMNS, SummaryRow, SummaryTable,
};

/// Output format of exported tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    Parquet,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Parquet => "parquet",
        }
    }
}

/// Write a summary table in `format`.
pub fn write_summary(table: &SummaryTable, path: impl AsRef<Path>, format: ExportFormat) -> ExportResult<()> {
    match format {
        ExportFormat::Csv => csv::write_summary_csv_path(table, path),
        ExportFormat::Json => json::write_summary_json_path(table, path),
        ExportFormat::Parquet => parquet::write_summary_parquet_path(table, path),
    }
}

/// Write a distribution table in `format`.
pub fn write_distribution(
    table: &DistributionTable,
    path: impl AsRef<Path>,
    format: ExportFormat,
) -> ExportResult<()> {
    match format {
        ExportFormat::Csv => csv::write_distribution_csv_path(table, path),
        ExportFormat::Json => json::write_distribution_json_path(table, path),
        ExportFormat::Parquet => parquet::write_distribution_parquet_path(table, path),
    }
}
