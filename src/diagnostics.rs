//! Structured run diagnostics.
//!
//! Every pipeline result carries a [`Diagnostics`] value describing what was dropped, what was
//! flagged during normalization and which metrics came out undefined.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::ingestion::{DroppedRow, LoadReport, SourceReport};
use crate::processing::metrics::MetricComputationError;
use crate::processing::normalize::{NormalizedRecords, WarningCount};
use crate::types::ColumnRole;

/// Non-fatal anomalies of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub rows_read: usize,
    pub rows_loaded: usize,
    pub rows_dropped: usize,
    pub dropped_missing_id: usize,
    pub dropped_duplicate_id: usize,
    pub dropped_samples: Vec<DroppedRow>,
    pub lossy_decoded_cells: usize,
    pub truncated: bool,
    pub sources: Vec<SourceReport>,
    /// Records whose state or district name was unknown or blank.
    pub flagged_names: u64,
    /// All normalization warnings raised (not distinct).
    pub warning_total: u64,
    pub warnings: Vec<WarningCount>,
    /// Blank categorical codes per role.
    pub missing_codes: BTreeMap<ColumnRole, u64>,
    pub undefined_metrics: Vec<MetricComputationError>,
}

impl Diagnostics {
    pub fn new(load: &LoadReport, normalized: &NormalizedRecords, undefined: &[MetricComputationError]) -> Self {
        Self {
            rows_read: load.rows_read,
            rows_loaded: load.rows_loaded,
            rows_dropped: load.rows_dropped(),
            dropped_missing_id: load.dropped_missing_id,
            dropped_duplicate_id: load.dropped_duplicate_id,
            dropped_samples: load.dropped_samples.clone(),
            lossy_decoded_cells: load.lossy_decoded_cells,
            truncated: load.truncated,
            sources: load.sources.clone(),
            flagged_names: normalized.warnings.flagged_names(),
            warning_total: normalized.warnings.total(),
            warnings: normalized.warnings.to_counts(),
            missing_codes: normalized.missing_codes.clone(),
            undefined_metrics: undefined.to_vec(),
        }
    }

    /// Whether the run was free of drops, warnings and undefined metrics.
    pub fn is_clean(&self) -> bool {
        self.rows_dropped == 0 && self.warning_total == 0 && self.undefined_metrics.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::Diagnostics;
    use crate::ingestion::LoadReport;
    use crate::processing::normalize::Normalizer;
    use crate::types::RawSchoolRecord;

    #[test]
    fn counts_flow_from_each_stage() {
        let report = LoadReport {
            rows_read: 4,
            rows_loaded: 3,
            dropped_missing_id: 1,
            ..LoadReport::default()
        };
        let normalized = Normalizer::default().normalize(vec![
            RawSchoolRecord::new("1", Some("Kerala")).with_rural_urban("1"),
            RawSchoolRecord::new("2", Some("Atlantis")).with_rural_urban("9"),
            RawSchoolRecord::new("3", None),
        ]);

        let diag = Diagnostics::new(&report, &normalized, &[]);
        assert_eq!(diag.rows_dropped, 1);
        // Atlantis, the blank state, and every blank district.
        assert_eq!(diag.flagged_names, 5);
        assert!(!diag.is_clean());

        let json = diag.to_json().unwrap();
        assert!(json.contains("\"kind\": \"unrecognized_code\""));
        assert!(json.contains("\"rural_urban\": 1"));
    }
}
