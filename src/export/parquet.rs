//! Parquet export through a polars [`DataFrame`].

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use polars::df;
use polars::prelude::{DataFrame, ParquetWriter, PolarsResult};

use crate::error::ExportResult;

use super::table::{DistributionTable, SummaryTable};

/// Columnar form of a summary table. Undefined metrics and missing tiers become nulls.
pub fn summary_frame(table: &SummaryTable) -> PolarsResult<DataFrame> {
    let rows = &table.rows;
    df![
        "key" => rows.iter().map(|r| r.key.clone()).collect::<Vec<_>>(),
        "total" => rows.iter().map(|r| r.total).collect::<Vec<_>>(),
        "rural_count" => rows.iter().map(|r| r.rural_count).collect::<Vec<_>>(),
        "urban_count" => rows.iter().map(|r| r.urban_count).collect::<Vec<_>>(),
        "unclassified_count" => rows.iter().map(|r| r.unclassified_count).collect::<Vec<_>>(),
        "completeness_ratio" => rows.iter().map(|r| r.completeness_ratio.as_f64()).collect::<Vec<_>>(),
        "concentration_share" => rows.iter().map(|r| r.concentration_share.as_f64()).collect::<Vec<_>>(),
        "tier" => rows.iter().map(|r| r.tier.map(|t| t.as_str())).collect::<Vec<_>>(),
    ]
}

pub fn distribution_frame(table: &DistributionTable) -> PolarsResult<DataFrame> {
    let rows = &table.rows;
    df![
        "key" => rows.iter().map(|r| r.key.clone()).collect::<Vec<_>>(),
        "dimension" => rows.iter().map(|r| r.dimension).collect::<Vec<_>>(),
        "code" => rows.iter().map(|r| r.code.clone()).collect::<Vec<_>>(),
        "count" => rows.iter().map(|r| r.count).collect::<Vec<_>>(),
    ]
}

pub fn write_summary_parquet_path(table: &SummaryTable, path: impl AsRef<Path>) -> ExportResult<()> {
    write_frame(summary_frame(table)?, path.as_ref())
}

pub fn write_distribution_parquet_path(table: &DistributionTable, path: impl AsRef<Path>) -> ExportResult<()> {
    write_frame(distribution_frame(table)?, path.as_ref())
}

fn write_frame(mut df: DataFrame, path: &Path) -> ExportResult<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    ParquetWriter::new(writer).finish(&mut df)?;
    Ok(())
}
