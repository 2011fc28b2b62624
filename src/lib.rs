//! `udise-metrics` turns a UDISE school-census snapshot into aggregated, policy-relevant metrics
//! at national, state and district granularity.
//!
//! The pipeline has five stages, each a pure transformation of the previous stage's output:
//!
//! Loader → Normalizer → Aggregator → Metrics Engine → Exporter
//!
//! The primary entrypoint is [`pipeline::Pipeline`], configured with a [`config::PipelineConfig`].
//!
//! ## What you can load
//!
//! **File formats (auto-detected by extension):**
//!
//! - **CSV**: `.csv` (non-UTF-8 cells are decoded as Latin-1 and counted)
//! - **JSON**: `.json` (array-of-objects) and `.ndjson` (newline-delimited objects)
//! - **Parquet**: `.parquet`, `.pq` (read with a column projection)
//!
//! A census split into numbered parts can be loaded as one record set with
//! [`ingestion::load_sources`] or [`ingestion::load_glob`].
//!
//! **Column selection:**
//!
//! Only the seven columns the pipeline needs are extracted (identifier, state, district, block,
//! rural-urban code, school type, school category). Each is bound to the first of its configured
//! candidate headers found in the source. A missing identifier or state column is a fatal
//! [`LoadError`]; other missing columns degrade to unclassified values.
//!
//! ## Quick example
//!
//! ```no_run
//! use udise_metrics::config::PipelineConfig;
//! use udise_metrics::pipeline::Pipeline;
//! use udise_metrics::types::GeoLevel;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let output = Pipeline::new(PipelineConfig::default())?.run("profile_2024-25.csv")?;
//! for row in output.summary(GeoLevel::State).rows.iter().take(5) {
//!     println!("{} {} {}", row.key, row.total, row.concentration_share);
//! }
//! println!("{}", output.diagnostics.to_json()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: record loader (CSV/JSON/Parquet) with load observers
//! - [`processing`]: normalizer, aggregator and metrics engine
//! - [`execution`]: optional parallel aggregation with execution observers
//! - [`export`]: summary and distribution tables, written as CSV/JSON/Parquet
//! - [`pipeline`]: end-to-end run and [`pipeline::PipelineOutput`]
//! - [`diagnostics`]: dropped rows, flagged names, undefined metrics
//! - [`config`]: run configuration
//! - [`types`]: records and geographic keys
//! - [`error`]: fatal error types
//!
//! ## Logging
//!
//! The crate logs through the `log` facade and never installs a logger.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod execution;
pub mod export;
pub mod ingestion;
pub mod pipeline;
pub mod processing;
pub mod types;

pub use error::{ConfigError, ExportError, ExportResult, LoadError, LoadResult, PipelineError};
