//! Format-independent record assembly.
//!
//! Every format reader resolves the configured column roles against its headers, then feeds the
//! selected cells row by row into a [`RecordCollector`]. The collector owns the row-level policy:
//! blank identifiers and repeated identifiers are dropped and counted, never kept.

use std::collections::HashSet;

use serde::Serialize;

use crate::config::ColumnSelection;
use crate::error::{LoadError, LoadResult};
use crate::types::{ColumnRole, RawSchoolRecord};

use super::unified::SourceFormat;

/// Number of dropped rows whose position is kept in the report.
pub const DROPPED_SAMPLE_LIMIT: usize = 20;

/// One selected cell per [`ColumnRole`], indexed by [`ColumnRole::index`].
pub(crate) type RoleCells = [Option<String>; 7];

/// Why a source row was not turned into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    MissingIdentifier,
    DuplicateIdentifier,
}

/// Position of a dropped row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedRow {
    /// Index into [`LoadReport::sources`].
    pub source: usize,
    /// 1-based row number within the source (CSV counts the header as row 1).
    pub row: usize,
    pub reason: DropReason,
}

/// Which source column was bound to a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedColumn {
    pub role: ColumnRole,
    pub column: String,
}

/// Per-source ingestion summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: String,
    /// `None` for records handed over in memory.
    pub format: Option<SourceFormat>,
    pub rows_read: usize,
    pub columns: Vec<ResolvedColumn>,
    /// Optional roles the source did not provide; their values are missing for every row.
    pub missing_optional: Vec<ColumnRole>,
}

/// Summary of a whole load (possibly several shards).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub sources: Vec<SourceReport>,
    pub rows_read: usize,
    pub rows_loaded: usize,
    pub dropped_missing_id: usize,
    pub dropped_duplicate_id: usize,
    /// First [`DROPPED_SAMPLE_LIMIT`] dropped rows.
    pub dropped_samples: Vec<DroppedRow>,
    /// Cells that were not valid UTF-8 and were decoded as Latin-1.
    pub lossy_decoded_cells: usize,
    /// Set when the configured row limit stopped the load early.
    pub truncated: bool,
}

impl LoadReport {
    /// Total rows excluded from the record set.
    pub fn rows_dropped(&self) -> usize {
        self.dropped_missing_id + self.dropped_duplicate_id
    }

    /// Optional roles that no source provided.
    pub fn unbound_roles(&self) -> Vec<ColumnRole> {
        if self.sources.is_empty() {
            return Vec::new();
        }
        ColumnRole::ALL
            .into_iter()
            .filter(|role| self.sources.iter().all(|s| s.missing_optional.contains(role)))
            .collect()
    }
}

/// Records produced by the loader plus the report describing what was dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedRecords {
    pub records: Vec<RawSchoolRecord>,
    pub report: LoadReport,
}

/// Column indexes bound to each role for one source.
#[derive(Debug, Clone)]
pub(crate) struct ColumnMap {
    slots: [Option<usize>; 7],
    resolved: Vec<ResolvedColumn>,
    missing_optional: Vec<ColumnRole>,
}

impl ColumnMap {
    pub(crate) fn index(&self, role: ColumnRole) -> Option<usize> {
        self.slots[role.index()]
    }

    /// Distinct source column indexes in use, ascending.
    pub(crate) fn used_indexes(&self) -> Vec<usize> {
        let mut out: Vec<usize> = self.slots.iter().flatten().copied().collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    #[cfg(test)]
    pub(crate) fn column_name(&self, role: ColumnRole) -> Option<&str> {
        self.resolved
            .iter()
            .find(|c| c.role == role)
            .map(|c| c.column.as_str())
    }
}

/// Bind each role to the first of its candidates present in `headers`.
///
/// Header matching trims whitespace and ignores ASCII case. Missing required roles are a
/// [`LoadError::MissingColumn`]; missing optional roles are recorded and left unbound.
pub(crate) fn resolve_columns(headers: &[String], selection: &ColumnSelection) -> LoadResult<ColumnMap> {
    let mut slots = [None; 7];
    let mut resolved = Vec::new();
    let mut missing_optional = Vec::new();

    for role in ColumnRole::ALL {
        let candidates = selection.candidates(role);
        let hit = candidates.iter().find_map(|cand| {
            headers
                .iter()
                .position(|h| header_matches(h, cand))
                .map(|idx| (idx, headers[idx].clone()))
        });

        match hit {
            Some((idx, column)) => {
                slots[role.index()] = Some(idx);
                resolved.push(ResolvedColumn { role, column });
            }
            None if role.is_required() => {
                return Err(LoadError::MissingColumn {
                    role,
                    candidates: candidates.to_vec(),
                    headers: headers.to_vec(),
                });
            }
            None => missing_optional.push(role),
        }
    }

    Ok(ColumnMap {
        slots,
        resolved,
        missing_optional,
    })
}

pub(crate) fn header_matches(header: &str, candidate: &str) -> bool {
    header
        .trim_start_matches('\u{feff}')
        .trim()
        .eq_ignore_ascii_case(candidate.trim())
}

/// Trimmed cell text, `None` when blank.
pub(crate) fn clean_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

/// Source name reported by [`load_records`].
pub const IN_MEMORY_SOURCE: &str = "<records>";

/// Apply the loader's row-level policy to records that were extracted elsewhere.
///
/// Every cell is trimmed; blank cells become missing. Blank and repeated
/// identifiers are dropped and counted exactly as for file sources. The report lists a single
/// source named `<records>` with every role bound.
pub fn load_records<I>(records: I, row_limit: Option<usize>) -> LoadedRecords
where
    I: IntoIterator<Item = RawSchoolRecord>,
{
    let mut collector = RecordCollector::new(row_limit);
    collector.report.sources.push(SourceReport {
        source: IN_MEMORY_SOURCE.to_string(),
        format: None,
        rows_read: 0,
        columns: ColumnRole::ALL
            .iter()
            .map(|&role| ResolvedColumn {
                role,
                column: role.as_str().to_string(),
            })
            .collect(),
        missing_optional: Vec::new(),
    });

    for (idx0, r) in records.into_iter().enumerate() {
        let cell = |v: Option<String>| v.as_deref().and_then(clean_cell);
        let cells: RoleCells = [
            clean_cell(&r.school_id),
            cell(r.state),
            cell(r.district),
            cell(r.block),
            cell(r.rural_urban),
            cell(r.school_type),
            cell(r.school_category),
        ];
        if !collector.push(idx0 + 1, cells) {
            break;
        }
    }
    collector.finish()
}

/// Accumulates records across one or more sources.
#[derive(Debug, Default)]
pub(crate) struct RecordCollector {
    seen: HashSet<String>,
    records: Vec<RawSchoolRecord>,
    report: LoadReport,
    row_limit: Option<usize>,
}

impl RecordCollector {
    pub(crate) fn new(row_limit: Option<usize>) -> Self {
        Self {
            row_limit,
            ..Self::default()
        }
    }

    /// Register a new source; subsequent rows are attributed to it.
    pub(crate) fn begin_source(&mut self, source: String, format: SourceFormat, columns: &ColumnMap) {
        self.report.sources.push(SourceReport {
            source,
            format: Some(format),
            rows_read: 0,
            columns: columns.resolved.clone(),
            missing_optional: columns.missing_optional.clone(),
        });
    }

    /// Whether the row limit has been reached.
    pub(crate) fn is_full(&self) -> bool {
        self.row_limit.is_some_and(|limit| self.report.rows_read >= limit)
    }

    pub(crate) fn note_lossy_cells(&mut self, n: usize) {
        self.report.lossy_decoded_cells += n;
    }

    /// Accept one source row. Returns `false`, and marks the load truncated, when the row limit
    /// was already reached; the row is not counted and the reader should stop.
    pub(crate) fn push(&mut self, row: usize, cells: RoleCells) -> bool {
        if self.is_full() {
            self.report.truncated = true;
            return false;
        }
        self.report.rows_read += 1;
        if let Some(src) = self.report.sources.last_mut() {
            src.rows_read += 1;
        }

        let [school_id, state, district, block, rural_urban, school_type, school_category] = cells;

        let Some(school_id) = school_id else {
            self.report.dropped_missing_id += 1;
            self.sample_drop(row, DropReason::MissingIdentifier);
            return true;
        };
        if !self.seen.insert(school_id.clone()) {
            self.report.dropped_duplicate_id += 1;
            self.sample_drop(row, DropReason::DuplicateIdentifier);
            return true;
        }

        self.records.push(RawSchoolRecord {
            school_id,
            state,
            district,
            block,
            rural_urban,
            school_type,
            school_category,
        });
        self.report.rows_loaded += 1;
        true
    }

    fn sample_drop(&mut self, row: usize, reason: DropReason) {
        if self.report.dropped_samples.len() < DROPPED_SAMPLE_LIMIT {
            self.report.dropped_samples.push(DroppedRow {
                source: self.report.sources.len().saturating_sub(1),
                row,
                reason,
            });
        }
    }

    pub(crate) fn rows_read(&self) -> usize {
        self.report.rows_read
    }

    pub(crate) fn rows_loaded(&self) -> usize {
        self.report.rows_loaded
    }

    pub(crate) fn rows_dropped(&self) -> usize {
        self.report.rows_dropped()
    }

    pub(crate) fn finish(self) -> LoadedRecords {
        LoadedRecords {
            records: self.records,
            report: self.report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DropReason, IN_MEMORY_SOURCE, RecordCollector, RoleCells, clean_cell, load_records, resolve_columns,
    };
    use crate::config::ColumnSelection;
    use crate::error::LoadError;
    use crate::ingestion::SourceFormat;
    use crate::types::{ColumnRole, RawSchoolRecord};

    fn headers(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    fn cells(id: Option<&str>, state: &str) -> RoleCells {
        [
            id.map(str::to_owned),
            Some(state.to_owned()),
            None,
            None,
            None,
            None,
            None,
        ]
    }

    #[test]
    fn resolves_first_matching_candidate_case_insensitively() {
        let map = resolve_columns(
            &headers(&["State_Name", "UDISE_CODE", "pseudocode", "district"]),
            &ColumnSelection::default(),
        )
        .unwrap();
        // `pseudocode` is listed before `udise_code`.
        assert_eq!(map.index(ColumnRole::SchoolId), Some(2));
        assert_eq!(map.index(ColumnRole::State), Some(0));
        assert_eq!(map.column_name(ColumnRole::State), Some("State_Name"));
        assert_eq!(map.index(ColumnRole::RuralUrban), None);
        assert_eq!(map.used_indexes(), vec![0, 2, 3]);
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let err = resolve_columns(&headers(&["pseudocode", "district"]), &ColumnSelection::default())
            .unwrap_err();
        match err {
            LoadError::MissingColumn { role, .. } => assert_eq!(role, ColumnRole::State),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn clean_cell_blanks_become_none() {
        assert_eq!(clean_cell("  "), None);
        assert_eq!(clean_cell(" 12 "), Some("12".to_string()));
    }

    #[test]
    fn collector_drops_missing_and_duplicate_identifiers() {
        let map = resolve_columns(&headers(&["pseudocode", "state"]), &ColumnSelection::default())
            .unwrap();
        let mut c = RecordCollector::new(None);
        c.begin_source("mem".to_string(), SourceFormat::Csv, &map);
        c.push(2, cells(Some("1"), "A"));
        c.push(3, cells(None, "A"));
        c.push(4, cells(Some("1"), "B"));
        c.push(5, cells(Some("2"), "B"));

        let out = c.finish();
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.report.rows_read, 4);
        assert_eq!(out.report.rows_loaded, 2);
        assert_eq!(out.report.dropped_missing_id, 1);
        assert_eq!(out.report.dropped_duplicate_id, 1);
        assert_eq!(out.report.dropped_samples[0].row, 3);
        assert_eq!(out.report.dropped_samples[0].reason, DropReason::MissingIdentifier);
        assert_eq!(out.report.dropped_samples[1].reason, DropReason::DuplicateIdentifier);
        assert_eq!(out.report.sources[0].rows_read, 4);
        assert!(out.report.sources[0].missing_optional.contains(&ColumnRole::District));
        assert!(out.report.unbound_roles().contains(&ColumnRole::District));
        assert!(!out.report.unbound_roles().contains(&ColumnRole::State));
    }

    #[test]
    fn collector_truncates_only_when_a_row_exceeds_the_limit() {
        let mut c = RecordCollector::new(Some(1));
        assert!(!c.is_full());
        assert!(c.push(2, cells(Some("1"), "A")));
        assert!(c.is_full());
        assert!(!c.finish().report.truncated);

        let mut c = RecordCollector::new(Some(1));
        assert!(c.push(2, cells(Some("1"), "A")));
        assert!(!c.push(3, cells(Some("2"), "A")));
        let out = c.finish();
        assert!(out.report.truncated);
        assert_eq!(out.report.rows_read, 1);
        assert_eq!(out.records.len(), 1);
    }

    #[test]
    fn in_memory_records_follow_the_identifier_policy() {
        let out = load_records(
            vec![
                RawSchoolRecord::new(" ", Some("Goa")),
                RawSchoolRecord::new("1", Some("Goa")),
                RawSchoolRecord::new(" 1 ", Some("Goa")).with_district("  "),
                RawSchoolRecord::new("2", Some(" Goa ")).with_district(" North Goa "),
            ],
            None,
        );
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.report.rows_read, 4);
        assert_eq!(out.report.dropped_missing_id, 1);
        assert_eq!(out.report.dropped_duplicate_id, 1);
        assert_eq!(out.records[1].state.as_deref(), Some("Goa"));
        assert_eq!(out.records[1].district.as_deref(), Some("North Goa"));
        assert_eq!(out.report.sources[0].source, IN_MEMORY_SOURCE);
        assert_eq!(out.report.sources[0].format, None);
        assert!(out.report.sources[0].missing_optional.is_empty());
        assert!(out.report.unbound_roles().is_empty());
    }
}
