//! In-memory stages between loading and export.
//!
//! - [`normalize`]: canonical names and codes, with a tally of every anomaly
//! - [`aggregate`]: single-pass grouping into [`GeoAggregate`]s and deterministic ranking
//! - [`metrics`]: ratios, shares and tiers derived from aggregates
//!
//! ## Example: normalize → aggregate → metrics
//!
//! ```rust
//! use udise_metrics::config::TierThresholds;
//! use udise_metrics::processing::{MetricsReport, Normalizer, aggregate, aggregate_national};
//! use udise_metrics::types::{GeoKey, GeoLevel, RawSchoolRecord};
//!
//! let raw = vec![
//!     RawSchoolRecord::new("1", Some("kerala")).with_rural_urban("1"),
//!     RawSchoolRecord::new("2", Some("Kerala ")).with_rural_urban("2"),
//!     RawSchoolRecord::new("3", Some("Goa")),
//! ];
//! let normalized = Normalizer::default().normalize(raw);
//! let states = aggregate(&normalized.records, GeoLevel::State);
//! let districts = aggregate(&normalized.records, GeoLevel::District);
//! let national = aggregate_national(&normalized.records);
//!
//! let report = MetricsReport::compute(&national, &states, &districts, &TierThresholds::default());
//! let kerala = report.states.get(&GeoKey::State("KERALA".to_string())).unwrap();
//! assert_eq!(kerala.total, 2);
//! assert_eq!(kerala.completeness_ratio.as_f64(), Some(1.0));
//! ```

pub mod aggregate;
pub mod metrics;
pub mod normalize;

pub use aggregate::{
    GeoAggregate, GeoAggregates, aggregate, aggregate_national, merge_aggregates, national_rollup, rank, top_n,
    top_districts_in_top_states,
};
pub use metrics::{
    DerivedMetric, KeyMetrics, LevelMetrics, MetricComputationError, MetricName, MetricValue, MetricsReport,
    NationalMetrics, Tier,
};
pub use normalize::{NormalizationWarning, NormalizedRecords, Normalizer, WarningCount, WarningTally};
