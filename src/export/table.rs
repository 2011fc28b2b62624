//! Export tables with a fixed column contract.

use std::collections::HashMap;

use serde::Serialize;

use crate::processing::aggregate::{GeoAggregate, GeoAggregates, rank};
use crate::processing::metrics::{
    KeyMetrics, LevelMetrics, MetricValue, NationalMetrics, Tier, completeness_ratio, concentration_share,
};
use crate::types::{Category, GeoLevel};

/// Summary columns, in output order. Downstream consumers rely on this exact list.
pub const SUMMARY_COLUMNS: [&str; 8] = [
    "key",
    "total",
    "rural_count",
    "urban_count",
    "unclassified_count",
    "completeness_ratio",
    "concentration_share",
    "tier",
];

/// Distribution columns, in output order.
pub const DISTRIBUTION_COLUMNS: [&str; 4] = ["key", "dimension", "code", "count"];

/// One summary row. Field order matches [`SUMMARY_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub key: String,
    pub total: u64,
    pub rural_count: u64,
    pub urban_count: u64,
    pub unclassified_count: u64,
    pub completeness_ratio: MetricValue,
    /// Percent of the national total.
    pub concentration_share: MetricValue,
    /// Only set at state level.
    pub tier: Option<Tier>,
}

impl SummaryRow {
    fn new(
        agg: &GeoAggregate,
        completeness_ratio: MetricValue,
        concentration_share: MetricValue,
        tier: Option<Tier>,
    ) -> Self {
        Self {
            key: agg.key().to_string(),
            total: agg.total(),
            rural_count: agg.rural_count(),
            urban_count: agg.urban_count(),
            unclassified_count: agg.unclassified_count(),
            completeness_ratio,
            concentration_share,
            tier,
        }
    }

    /// Text cells in column order. Floats keep full precision; undefined values and a missing
    /// tier are empty.
    pub fn cells(&self) -> [String; 8] {
        [
            self.key.clone(),
            self.total.to_string(),
            self.rural_count.to_string(),
            self.urban_count.to_string(),
            self.unclassified_count.to_string(),
            metric_cell(self.completeness_ratio),
            metric_cell(self.concentration_share),
            self.tier.map(|t| t.as_str().to_string()).unwrap_or_default(),
        ]
    }
}

fn metric_cell(value: MetricValue) -> String {
    value.as_f64().map(|v| v.to_string()).unwrap_or_default()
}

/// Summary rows of one geographic level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryTable {
    pub level: GeoLevel,
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    /// Single-row national table.
    pub fn national(national: &GeoAggregate, metrics: &NationalMetrics) -> Self {
        Self {
            level: GeoLevel::National,
            rows: vec![SummaryRow::new(
                national,
                metrics.completeness_ratio,
                concentration_share(national, metrics.total),
                None,
            )],
        }
    }

    /// Every key of a level, in ranking order.
    pub fn for_level(aggregates: &GeoAggregates, metrics: &LevelMetrics) -> Self {
        Self::from_ranked(metrics.level, rank(aggregates), metrics)
    }

    /// Rows for `ranked` in the given order, e.g. a top-N slice.
    ///
    /// Keys missing from `metrics` fall back to metrics computed from the aggregate alone
    /// (concentration share undefined).
    pub fn from_ranked<'a, I>(level: GeoLevel, ranked: I, metrics: &LevelMetrics) -> Self
    where
        I: IntoIterator<Item = &'a GeoAggregate>,
    {
        let by_key: HashMap<_, &KeyMetrics> = metrics.rows.iter().map(|m| (&m.key, m)).collect();
        let rows = ranked
            .into_iter()
            .map(|agg| match by_key.get(agg.key()) {
                Some(m) => SummaryRow::new(agg, m.completeness_ratio, m.concentration_share, m.tier),
                None => SummaryRow::new(agg, completeness_ratio(agg), MetricValue::Undefined, None),
            })
            .collect();
        Self { level, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One (key, dimension, code) count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionRow {
    pub key: String,
    /// `school_type` or `school_category`.
    pub dimension: &'static str,
    /// `None` for unclassified records.
    pub code: Option<String>,
    pub count: u64,
}

/// School type and category breakdowns of one level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionTable {
    pub level: GeoLevel,
    pub rows: Vec<DistributionRow>,
}

impl DistributionTable {
    /// Breakdown rows in ranking order, then dimension, then code.
    pub fn for_level(level: GeoLevel, aggregates: &GeoAggregates) -> Self {
        let mut rows = Vec::new();
        for agg in rank(aggregates) {
            push_breakdown(&mut rows, agg, "school_type", agg.school_types());
            push_breakdown(&mut rows, agg, "school_category", agg.school_categories());
        }
        Self { level, rows }
    }
}

fn push_breakdown<'a>(
    rows: &mut Vec<DistributionRow>,
    agg: &GeoAggregate,
    dimension: &'static str,
    counts: impl IntoIterator<Item = (&'a Category, &'a u64)>,
) {
    let key = agg.key().to_string();
    rows.extend(counts.into_iter().map(|(code, count)| DistributionRow {
        key: key.clone(),
        dimension,
        code: code.code().map(str::to_owned),
        count: *count,
    }));
}
