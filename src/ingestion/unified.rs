//! Unified loading entrypoints.
//!
//! Most callers go through [`crate::pipeline::Pipeline`]; these functions are the loader stage on
//! its own:
//!
//! - [`load_from_path`]: one source, format inferred from the extension unless forced
//! - [`load_sources`]: several shards concatenated into one record set
//! - [`load_glob`]: shards selected by a glob pattern (e.g. `profile_data_*_All State_*.csv`)
//!
//! Identifier uniqueness is enforced across all shards of one call. If a
//! [`super::observability::LoadObserver`] is configured, every source reports success or failure.

use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::config::ColumnSelection;
use crate::error::{LoadError, LoadResult};

use super::observability::{LoadContext, LoadObserver, LoadSeverity, LoadStats};
use super::records::{LoadedRecords, RecordCollector};
use super::{csv, json, parquet};

/// Supported source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Comma-separated values.
    Csv,
    /// JSON array-of-objects or NDJSON.
    Json,
    /// Apache Parquet.
    Parquet,
}

impl SourceFormat {
    /// Parse a source format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" | "ndjson" => Some(Self::Json),
            "parquet" | "pq" => Some(Self::Parquet),
            _ => None,
        }
    }
}

/// Options controlling loading behavior.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct LoadOptions {
    /// If `None`, infer format from each file's extension.
    pub format: Option<SourceFormat>,
    /// Stop after this many data rows in total.
    pub row_limit: Option<usize>,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn LoadObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: LoadSeverity,
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("format", &self.format)
            .field("row_limit", &self.row_limit)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            format: None,
            row_limit: None,
            observer: None,
            alert_at_or_above: LoadSeverity::Critical,
        }
    }
}

/// Load one source file.
///
/// # Examples
///
/// ```no_run
/// use udise_metrics::config::ColumnSelection;
/// use udise_metrics::ingestion::{load_from_path, LoadOptions};
///
/// # fn main() -> Result<(), udise_metrics::LoadError> {
/// let loaded = load_from_path("profile_2024-25.csv", &ColumnSelection::default(), &LoadOptions::default())?;
/// println!(
///     "records={} dropped={}",
///     loaded.records.len(),
///     loaded.report.rows_dropped()
/// );
/// # Ok(())
/// # }
/// ```
pub fn load_from_path(
    path: impl AsRef<Path>,
    selection: &ColumnSelection,
    options: &LoadOptions,
) -> LoadResult<LoadedRecords> {
    load_sources(&[path.as_ref().to_path_buf()], selection, options)
}

/// Load several shards into one record set, in the given order.
///
/// The first fatal error aborts the whole load; records from earlier shards are discarded.
pub fn load_sources(
    paths: &[PathBuf],
    selection: &ColumnSelection,
    options: &LoadOptions,
) -> LoadResult<LoadedRecords> {
    let mut collector = RecordCollector::new(options.row_limit);
    for path in paths {
        load_one(path, selection, options, &mut collector)?;
    }
    Ok(collector.finish())
}

/// Load every file matching `pattern`, in sorted path order.
///
/// # Examples
///
/// ```no_run
/// use udise_metrics::config::ColumnSelection;
/// use udise_metrics::ingestion::{load_glob, LoadOptions};
///
/// # fn main() -> Result<(), udise_metrics::LoadError> {
/// // The census ships its profile table as numbered parts.
/// let loaded = load_glob("data/profile_data_*.csv", &ColumnSelection::default(), &LoadOptions::default())?;
/// assert_eq!(loaded.report.rows_loaded, loaded.records.len());
/// # Ok(())
/// # }
/// ```
pub fn load_glob(
    pattern: &str,
    selection: &ColumnSelection,
    options: &LoadOptions,
) -> LoadResult<LoadedRecords> {
    let mut paths: Vec<PathBuf> = glob::glob(pattern)?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    if paths.is_empty() {
        return Err(LoadError::NoSources {
            pattern: pattern.to_string(),
        });
    }
    paths.sort();
    load_sources(&paths, selection, options)
}

fn load_one(
    path: &Path,
    selection: &ColumnSelection,
    options: &LoadOptions,
    collector: &mut RecordCollector,
) -> LoadResult<()> {
    let fmt = match options.format {
        Some(f) => f,
        None => infer_format_from_path(path)?,
    };
    let ctx = LoadContext {
        path: path.to_path_buf(),
        format: fmt,
    };

    let before = (collector.rows_read(), collector.rows_loaded(), collector.rows_dropped());
    let result = match fmt {
        SourceFormat::Csv => csv::read_csv_path_into(path, selection, collector),
        SourceFormat::Json => json::read_json_path_into(path, selection, collector),
        SourceFormat::Parquet => parquet::read_parquet_path_into(path, selection, collector),
    };

    if let Some(obs) = options.observer.as_ref() {
        match &result {
            Ok(()) => obs.on_success(
                &ctx,
                LoadStats {
                    rows_read: collector.rows_read() - before.0,
                    rows_loaded: collector.rows_loaded() - before.1,
                    rows_dropped: collector.rows_dropped() - before.2,
                },
            ),
            Err(e) => {
                let sev = severity_for_error(e);
                obs.on_failure(&ctx, sev, e);
                if sev >= options.alert_at_or_above {
                    obs.on_alert(&ctx, sev, e);
                }
            }
        }
    }

    result
}

fn severity_for_error(e: &LoadError) -> LoadSeverity {
    match e {
        LoadError::Io(_) => LoadSeverity::Critical,
        LoadError::Parquet(err) => {
            // Parquet errors often wrap IO, but not always in a structured way.
            if error_chain_contains_io(err) {
                LoadSeverity::Critical
            } else {
                LoadSeverity::Error
            }
        }
        LoadError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => LoadSeverity::Critical,
            _ => LoadSeverity::Error,
        },
        LoadError::Json(_)
        | LoadError::Glob(_)
        | LoadError::MissingColumn { .. }
        | LoadError::UnsupportedFormat { .. }
        | LoadError::NoSources { .. } => LoadSeverity::Error,
    }
}

fn error_chain_contains_io(e: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = cur {
        if err.is::<std::io::Error>() {
            return true;
        }
        cur = err.source();
    }
    false
}

fn infer_format_from_path(path: &Path) -> LoadResult<SourceFormat> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| LoadError::UnsupportedFormat {
            message: format!(
                "cannot infer format: path has no extension ({})",
                path.display()
            ),
        })?;

    SourceFormat::from_extension(ext).ok_or_else(|| LoadError::UnsupportedFormat {
        message: format!(
            "cannot infer format from extension '{ext}' for path ({})",
            path.display()
        ),
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{SourceFormat, infer_format_from_path};
    use crate::error::LoadError;

    #[test]
    fn format_from_extension_is_case_insensitive() {
        assert_eq!(SourceFormat::from_extension("CSV"), Some(SourceFormat::Csv));
        assert_eq!(SourceFormat::from_extension("ndjson"), Some(SourceFormat::Json));
        assert_eq!(SourceFormat::from_extension("pq"), Some(SourceFormat::Parquet));
        assert_eq!(SourceFormat::from_extension("xlsx"), None);
    }

    #[test]
    fn path_without_extension_cannot_be_inferred() {
        let err = infer_format_from_path(Path::new("profile_data")).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat { .. }));
    }
}
