//! CSV writers for export tables.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::ExportResult;

use super::table::{DISTRIBUTION_COLUMNS, DistributionTable, SUMMARY_COLUMNS, SummaryTable};

/// Write `table` as CSV: the [`SUMMARY_COLUMNS`] header, then one line per row.
pub fn write_summary_csv<W: Write>(table: &SummaryTable, writer: W) -> ExportResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(SUMMARY_COLUMNS)?;
    for row in &table.rows {
        wtr.write_record(row.cells())?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_summary_csv_path(table: &SummaryTable, path: impl AsRef<Path>) -> ExportResult<()> {
    let file = File::create(path)?;
    write_summary_csv(table, BufWriter::new(file))
}

/// Write `table` as CSV with the [`DISTRIBUTION_COLUMNS`] header.
pub fn write_distribution_csv<W: Write>(table: &DistributionTable, writer: W) -> ExportResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(DISTRIBUTION_COLUMNS)?;
    for row in &table.rows {
        wtr.write_record([
            row.key.as_str(),
            row.dimension,
            row.code.as_deref().unwrap_or_default(),
            row.count.to_string().as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_distribution_csv_path(table: &DistributionTable, path: impl AsRef<Path>) -> ExportResult<()> {
    let file = File::create(path)?;
    write_distribution_csv(table, BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::write_summary_csv;
    use crate::export::table::{SummaryRow, SummaryTable};
    use crate::processing::metrics::{MetricValue, Tier};
    use crate::types::GeoLevel;

    #[test]
    fn undefined_metrics_are_empty_cells() {
        let table = SummaryTable {
            level: GeoLevel::State,
            rows: vec![
                SummaryRow {
                    key: "GOA".to_string(),
                    total: 3,
                    rural_count: 1,
                    urban_count: 1,
                    unclassified_count: 1,
                    completeness_ratio: MetricValue::Defined(2.0 / 3.0),
                    concentration_share: MetricValue::Defined(100.0),
                    tier: Some(Tier::High),
                },
                SummaryRow {
                    key: "NOWHERE".to_string(),
                    total: 0,
                    rural_count: 0,
                    urban_count: 0,
                    unclassified_count: 0,
                    completeness_ratio: MetricValue::Undefined,
                    concentration_share: MetricValue::Undefined,
                    tier: None,
                },
            ],
        };
        let mut buf = Vec::new();
        write_summary_csv(&table, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "key,total,rural_count,urban_count,unclassified_count,completeness_ratio,concentration_share,tier"
        );
        assert_eq!(lines[1], "GOA,3,1,1,1,0.6666666666666666,100,high");
        assert_eq!(lines[2], "NOWHERE,0,0,0,0,,,");
    }
}
