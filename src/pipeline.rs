//! End-to-end run: load → normalize → aggregate → metrics, plus export of the result.
//!
//! Each stage consumes the previous stage's output and returns a new value; nothing is cached
//! between runs. A run either fails with a [`crate::error::LoadError`] or returns a
//! [`PipelineOutput`] that always carries its [`Diagnostics`].
//!
//! ```no_run
//! use udise_metrics::config::PipelineConfig;
//! use udise_metrics::export::ExportFormat;
//! use udise_metrics::pipeline::Pipeline;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::new(PipelineConfig::from_json_path("udise.json")?)?;
//! let output = pipeline.run_glob("data/profile_data_*.csv")?;
//! println!("{} states, {} rows dropped", output.states.len(), output.diagnostics.rows_dropped);
//! output.write_to_dir("out", ExportFormat::Csv)?;
//! # Ok(())
//! # }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{ConfigError, ExportResult, LoadResult, PipelineError};
use crate::execution::{ExecutionEngine, ExecutionObserver};
use crate::export::{self, DistributionTable, ExportFormat, SummaryTable};
use crate::ingestion::{
    LoadObserver, LoadOptions, LoadedRecords, SourceFormat, load_glob, load_records, load_sources,
};
use crate::processing::aggregate::{GeoAggregate, GeoAggregates, national_rollup, top_districts_in_top_states};
use crate::processing::metrics::MetricsReport;
use crate::processing::normalize::Normalizer;
use crate::types::{GeoKey, GeoLevel, RawSchoolRecord};

/// A configured pipeline. Cheap to reuse across runs.
pub struct Pipeline {
    config: PipelineConfig,
    format: Option<SourceFormat>,
    load_observer: Option<Arc<dyn LoadObserver>>,
    execution_observer: Option<Arc<dyn ExecutionObserver>>,
}

impl Pipeline {
    /// Validate `config` and build a pipeline from it.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            format: None,
            load_observer: None,
            execution_observer: None,
        })
    }

    /// Force the source format instead of inferring it from extensions.
    pub fn with_format(mut self, format: SourceFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_load_observer(mut self, observer: Arc<dyn LoadObserver>) -> Self {
        self.load_observer = Some(observer);
        self
    }

    pub fn with_execution_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.execution_observer = Some(observer);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run over a single source file.
    pub fn run(&self, path: impl AsRef<Path>) -> LoadResult<PipelineOutput> {
        self.run_sources(&[path.as_ref().to_path_buf()])
    }

    /// Run over several shards, concatenated in the given order.
    pub fn run_sources(&self, paths: &[PathBuf]) -> LoadResult<PipelineOutput> {
        log::info!("loading {} source(s)", paths.len());
        let loaded = load_sources(paths, &self.config.columns, &self.load_options())?;
        Ok(self.run_loaded(loaded))
    }

    /// Run over every file matching `pattern`.
    pub fn run_glob(&self, pattern: &str) -> LoadResult<PipelineOutput> {
        log::info!("loading sources matching '{pattern}'");
        let loaded = load_glob(pattern, &self.config.columns, &self.load_options())?;
        Ok(self.run_loaded(loaded))
    }

    /// Run over records that were already extracted.
    ///
    /// Records with a blank or repeated identifier are dropped and counted in the diagnostics,
    /// and the configured row limit applies, as for file sources.
    pub fn run_records(&self, records: Vec<RawSchoolRecord>) -> PipelineOutput {
        self.run_loaded(load_records(records, self.config.row_limit))
    }

    /// Run the stages after loading.
    pub fn run_loaded(&self, loaded: LoadedRecords) -> PipelineOutput {
        let LoadedRecords { records, report } = loaded;
        log::info!(
            "loaded {} records ({} read, {} dropped)",
            report.rows_loaded,
            report.rows_read,
            report.rows_dropped()
        );
        if report.truncated {
            log::warn!("row limit reached; results cover a sample only");
        }

        let normalized = Normalizer::new(&self.config.names)
            .with_unbound_roles(report.unbound_roles())
            .normalize(records);
        let flagged = normalized.warnings.flagged_names();
        if flagged > 0 {
            log::warn!("{flagged} records carry a flagged state or district name");
        }
        log::debug!("{} normalization warnings", normalized.warnings.total());

        let mut engine = ExecutionEngine::new(self.config.execution.clone());
        if let Some(obs) = &self.execution_observer {
            engine = engine.with_observer(Arc::clone(obs));
        }
        let states = engine.aggregate(&normalized.records, GeoLevel::State);
        let districts = engine.aggregate(&normalized.records, GeoLevel::District);
        let national = national_rollup(&states);
        log::info!(
            "aggregated {} schools into {} states and {} districts",
            national.total(),
            states.len(),
            districts.len()
        );

        let metrics = MetricsReport::compute(&national, &states, &districts, &self.config.tiers);
        if !metrics.undefined.is_empty() {
            log::debug!("{} metric values undefined", metrics.undefined.len());
        }

        let top_districts = top_districts_in_top_states(
            &states,
            &districts,
            self.config.top_n_states_for_districts,
            self.config.top_n_districts,
        )
        .into_iter()
        .map(|agg| agg.key().clone())
        .collect();

        let diagnostics = Diagnostics::new(&report, &normalized, &metrics.undefined);
        PipelineOutput {
            national,
            states,
            districts,
            metrics,
            top_districts,
            diagnostics,
        }
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            format: self.format,
            row_limit: self.config.row_limit,
            observer: self.load_observer.clone(),
            ..LoadOptions::default()
        }
    }
}

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub national: GeoAggregate,
    pub states: GeoAggregates,
    pub districts: GeoAggregates,
    pub metrics: MetricsReport,
    /// Largest districts within the largest states, in ranking order.
    pub top_districts: Vec<GeoKey>,
    pub diagnostics: Diagnostics,
}

impl PipelineOutput {
    /// Summary table of one level, rows in ranking order.
    pub fn summary(&self, level: GeoLevel) -> SummaryTable {
        match level {
            GeoLevel::National => SummaryTable::national(&self.national, &self.metrics.national),
            GeoLevel::State => SummaryTable::for_level(&self.states, &self.metrics.states),
            GeoLevel::District => SummaryTable::for_level(&self.districts, &self.metrics.districts),
        }
    }

    /// Summary rows of the district drilldown.
    pub fn top_districts_summary(&self) -> SummaryTable {
        let ranked = self.top_districts.iter().filter_map(|k| self.districts.get(k));
        SummaryTable::from_ranked(GeoLevel::District, ranked, &self.metrics.districts)
    }

    /// School type/category breakdown of one level.
    pub fn distribution(&self, level: GeoLevel) -> DistributionTable {
        match level {
            GeoLevel::National => {
                let national: GeoAggregates = [(GeoKey::National, self.national.clone())].into_iter().collect();
                DistributionTable::for_level(level, &national)
            }
            GeoLevel::State => DistributionTable::for_level(level, &self.states),
            GeoLevel::District => DistributionTable::for_level(level, &self.districts),
        }
    }

    /// Write every table plus `diagnostics.json` into `dir`, creating it if needed.
    ///
    /// Returns the written paths. Output is byte-identical for identical input.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>, format: ExportFormat) -> ExportResult<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let ext = format.extension();
        let mut written = Vec::new();

        for level in [GeoLevel::National, GeoLevel::State, GeoLevel::District] {
            let path = dir.join(format!("{}_summary.{ext}", level.as_str()));
            export::write_summary(&self.summary(level), &path, format)?;
            written.push(path);

            let path = dir.join(format!("{}_distribution.{ext}", level.as_str()));
            export::write_distribution(&self.distribution(level), &path, format)?;
            written.push(path);
        }

        let path = dir.join(format!("top_districts.{ext}"));
        export::write_summary(&self.top_districts_summary(), &path, format)?;
        written.push(path);

        let path = dir.join("diagnostics.json");
        export::json::write_json_path(&self.diagnostics, &path)?;
        written.push(path);

        log::info!("wrote {} files to {}", written.len(), dir.display());
        Ok(written)
    }
}

/// Load, run and export in one call.
pub fn run_to_dir(
    config: PipelineConfig,
    sources: &[PathBuf],
    out_dir: impl AsRef<Path>,
    format: ExportFormat,
) -> Result<PipelineOutput, PipelineError> {
    let output = Pipeline::new(config)?.run_sources(sources)?;
    output.write_to_dir(out_dir, format)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::Pipeline;
    use crate::config::PipelineConfig;
    use crate::types::{GeoKey, GeoLevel, RawSchoolRecord};

    #[test]
    fn in_memory_run_produces_all_levels() {
        let raw = vec![
            RawSchoolRecord::new("1", Some("Orissa")).with_district("Puri").with_rural_urban("1"),
            RawSchoolRecord::new("2", Some("Odisha")).with_district("Puri").with_rural_urban("2"),
            RawSchoolRecord::new("3", Some("Goa")).with_district("North Goa"),
        ];
        let out = Pipeline::new(PipelineConfig::default()).unwrap().run_records(raw);

        assert_eq!(out.national.total(), 3);
        assert_eq!(out.states[&GeoKey::State("ODISHA".to_string())].total(), 2);
        assert_eq!(out.summary(GeoLevel::State).rows[0].key, "ODISHA");
        assert_eq!(out.summary(GeoLevel::District).len(), 2);
        assert_eq!(out.top_districts.len(), 2);
        assert_eq!(out.diagnostics.rows_loaded, 3);
        assert_eq!(out.distribution(GeoLevel::National).rows.len(), 2);
    }

    #[test]
    fn in_memory_run_drops_blank_and_repeated_identifiers() {
        let raw = vec![
            RawSchoolRecord::new("", Some("Goa")),
            RawSchoolRecord::new("1", Some("Goa")),
            RawSchoolRecord::new("1", Some("Goa")),
        ];
        let out = Pipeline::new(PipelineConfig::default()).unwrap().run_records(raw);

        assert_eq!(out.national.total(), 1);
        assert_eq!(out.diagnostics.rows_read, 3);
        assert_eq!(out.diagnostics.rows_dropped, 2);
        assert_eq!(out.diagnostics.dropped_missing_id, 1);
        assert_eq!(out.diagnostics.dropped_duplicate_id, 1);
        assert!(!out.diagnostics.is_clean());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.execution.chunk_size = 0;
        assert!(Pipeline::new(cfg).is_err());
    }
}
