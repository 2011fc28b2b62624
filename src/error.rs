use thiserror::Error;

use crate::types::ColumnRole;

/// Convenience result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Convenience result type for summary export.
pub type ExportResult<T> = Result<T, ExportError>;

/// Fatal error raised while loading school records.
///
/// Any of these aborts the pipeline run. Row-level anomalies (missing identifiers, odd codes) are
/// not errors; they are counted in [`crate::diagnostics::Diagnostics`].
#[derive(Debug, Error)]
pub enum LoadError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Parquet reader error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON / NDJSON could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A shard glob pattern was malformed.
    #[error("invalid source pattern: {0}")]
    Glob(#[from] glob::PatternError),

    /// A required column (identifier or state) is not present in the source.
    #[error("missing required column for {role}: tried {candidates:?}. headers={headers:?}")]
    MissingColumn {
        role: ColumnRole,
        candidates: Vec<String>,
        headers: Vec<String>,
    },

    /// The source format could not be inferred or is not readable as records.
    #[error("unsupported source: {message}")]
    UnsupportedFormat { message: String },

    /// A shard pattern matched no files.
    #[error("no source files match '{pattern}'")]
    NoSources { pattern: String },
}

/// Error raised while writing summary tables.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

/// Error raised while reading or validating a [`crate::config::PipelineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration parsed but describes an unusable pipeline.
    #[error("invalid config: {message}")]
    Invalid { message: String },
}

/// Any fatal error of a load-run-export sequence.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Export(#[from] ExportError),
}
