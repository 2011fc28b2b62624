//! Record loader.
//!
//! Most callers should use [`load_from_path`] (from [`unified`]) which:
//!
//! - auto-detects format by file extension (or you can override via [`LoadOptions`])
//! - reads only the columns named by a [`crate::config::ColumnSelection`]
//! - drops and counts rows without an identifier (or with a repeated one)
//! - optionally reports success/failure/alerts to a [`LoadObserver`]
//!
//! Records extracted elsewhere go through the same identifier policy via [`load_records`].
//!
//! Format-specific functions are also available under:
//! - [`csv`]
//! - [`json`]
//! - [`parquet`]

pub mod csv;
pub mod json;
pub mod observability;
pub mod parquet;
pub mod records;
pub mod unified;

pub use observability::{
    CompositeObserver, FileObserver, LoadContext, LoadObserver, LoadSeverity, LoadStats, LogObserver,
    StdErrObserver,
};
pub use records::{
    DropReason, DroppedRow, IN_MEMORY_SOURCE, LoadReport, LoadedRecords, ResolvedColumn, SourceReport, load_records,
};
pub use unified::{LoadOptions, SourceFormat, load_from_path, load_glob, load_sources};
