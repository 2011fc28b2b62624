//! Derived metrics over [`GeoAggregate`]s.
//!
//! Every function here is pure and reads aggregates only, never records. Ratios keep full `f64`
//! precision; rounding is a presentation concern (see the `Display` impl of [`MetricValue`]).
//! A zero denominator yields [`MetricValue::Undefined`] instead of `NaN`/`inf`, and the
//! report-level functions record it as a [`MetricComputationError`].
//!
//! ```rust
//! use udise_metrics::processing::metrics::MetricValue;
//!
//! assert_eq!(MetricValue::ratio(3, 4), MetricValue::Defined(0.75));
//! assert_eq!(MetricValue::ratio(3, 0), MetricValue::Undefined);
//! assert_eq!(format!("{:.1}", MetricValue::percentage(1, 3)), "33.3");
//! assert_eq!(MetricValue::Undefined.to_string(), "undefined");
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::config::TierThresholds;
use crate::types::{GeoKey, GeoLevel, RuralUrban};

use super::aggregate::{GeoAggregate, GeoAggregates, rank};

/// A metric value, or the explicit "undefined" sentinel for a zero denominator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Defined(f64),
    Undefined,
}

impl MetricValue {
    /// `numerator / denominator`, undefined when the denominator is zero.
    pub fn ratio(numerator: u64, denominator: u64) -> Self {
        if denominator == 0 {
            MetricValue::Undefined
        } else {
            MetricValue::Defined(numerator as f64 / denominator as f64)
        }
    }

    /// `numerator / denominator * 100`, undefined when the denominator is zero.
    pub fn percentage(numerator: u64, denominator: u64) -> Self {
        if denominator == 0 {
            MetricValue::Undefined
        } else {
            MetricValue::Defined(numerator as f64 * 100.0 / denominator as f64)
        }
    }

    pub fn as_f64(self) -> Option<f64> {
        match self {
            MetricValue::Defined(v) => Some(v),
            MetricValue::Undefined => None,
        }
    }

    pub fn is_defined(self) -> bool {
        matches!(self, MetricValue::Defined(_))
    }
}

/// Honors the formatter precision (`{:.2}`); prints `undefined` for the sentinel.
impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, f.precision()) {
            (MetricValue::Defined(v), Some(p)) => write!(f, "{v:.p$}"),
            (MetricValue::Defined(v), None) => write!(f, "{v}"),
            (MetricValue::Undefined, _) => f.write_str("undefined"),
        }
    }
}

/// Serializes as a number, or `null` when undefined.
impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Defined(v) => serializer.serialize_f64(*v),
            MetricValue::Undefined => serializer.serialize_none(),
        }
    }
}

/// Density tier of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    High,
    Medium,
    Low,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::High => "high",
            Tier::Medium => "medium",
            Tier::Low => "low",
        }
    }
}

/// Names of the derived metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    /// (rural + urban) / total.
    CompletenessRatio,
    /// total / national total, in percent.
    ConcentrationShare,
    RuralShare,
    UrbanShare,
    UnclassifiedShare,
    /// rural / urban.
    RuralUrbanRatio,
    /// Max / min non-zero state total.
    DensityRatio,
}

/// Why a metric came out undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedReason {
    /// The aggregate (or the national total) has no schools.
    ZeroTotal,
    /// No urban schools to divide by.
    NoUrbanSchools,
    /// No state has a non-zero total.
    NoPopulatedStates,
}

/// A metric whose denominator was zero, reported instead of a numeric error value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct MetricComputationError {
    pub key: GeoKey,
    pub metric: MetricName,
    pub reason: UndefinedReason,
}

impl fmt::Display for MetricComputationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} undefined for {} ({:?})", self.metric, self.key, self.reason)
    }
}

/// A named metric value tied to a key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedMetric {
    pub key: GeoKey,
    pub name: MetricName,
    pub value: MetricValue,
}

/// (rural + urban) / total; in `[0, 1]`, exactly 0 when every school is unclassified.
pub fn completeness_ratio(agg: &GeoAggregate) -> MetricValue {
    MetricValue::ratio(agg.classified_count(), agg.total())
}

/// The key's share of `national_total`, in percent.
pub fn concentration_share(agg: &GeoAggregate, national_total: u64) -> MetricValue {
    MetricValue::percentage(agg.total(), national_total)
}

/// Fraction of the key's schools in `class`.
pub fn class_share(agg: &GeoAggregate, class: RuralUrban) -> MetricValue {
    MetricValue::ratio(agg.count_of(class), agg.total())
}

/// Rural schools per urban school.
pub fn rural_urban_ratio(agg: &GeoAggregate) -> MetricValue {
    MetricValue::ratio(agg.rural_count(), agg.urban_count())
}

/// Ratio between the largest and smallest non-zero state totals.
pub fn density_ratio(states: &GeoAggregates) -> MetricValue {
    let mut populated = states.values().map(GeoAggregate::total).filter(|&t| t > 0);
    let Some(first) = populated.next() else {
        return MetricValue::Undefined;
    };
    let (min, max) = populated.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
    MetricValue::ratio(max, min)
}

/// Partition state aggregates into density tiers.
///
/// `TopBottom` walks the deterministic ranking (total desc, name asc): the first `top_n` are
/// high, the last `bottom_n` of the remainder low. `MinTotals` compares totals against fixed
/// thresholds.
pub fn assign_tiers(states: &GeoAggregates, thresholds: &TierThresholds) -> BTreeMap<GeoKey, Tier> {
    let ranked = rank(states);
    let n = ranked.len();
    ranked
        .into_iter()
        .enumerate()
        .map(|(i, agg)| {
            let tier = match *thresholds {
                TierThresholds::TopBottom { top_n, bottom_n } => {
                    if i < top_n {
                        Tier::High
                    } else if i + bottom_n >= n {
                        Tier::Low
                    } else {
                        Tier::Medium
                    }
                }
                TierThresholds::MinTotals {
                    high_at_least,
                    low_below,
                } => {
                    if agg.total() >= high_at_least {
                        Tier::High
                    } else if agg.total() < low_below {
                        Tier::Low
                    } else {
                        Tier::Medium
                    }
                }
            };
            (agg.key().clone(), tier)
        })
        .collect()
}

/// All metrics for one key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyMetrics {
    pub key: GeoKey,
    pub total: u64,
    /// 1-based position in the ranking of its level.
    pub density_rank: usize,
    pub completeness_ratio: MetricValue,
    pub concentration_share: MetricValue,
    pub rural_share: MetricValue,
    pub urban_share: MetricValue,
    pub unclassified_share: MetricValue,
    pub rural_urban_ratio: MetricValue,
    pub tier: Option<Tier>,
}

impl KeyMetrics {
    /// The metric values as named [`DerivedMetric`]s.
    pub fn derived(&self) -> Vec<DerivedMetric> {
        [
            (MetricName::CompletenessRatio, self.completeness_ratio),
            (MetricName::ConcentrationShare, self.concentration_share),
            (MetricName::RuralShare, self.rural_share),
            (MetricName::UrbanShare, self.urban_share),
            (MetricName::UnclassifiedShare, self.unclassified_share),
            (MetricName::RuralUrbanRatio, self.rural_urban_ratio),
        ]
        .into_iter()
        .map(|(name, value)| DerivedMetric {
            key: self.key.clone(),
            name,
            value,
        })
        .collect()
    }
}

/// Metrics for every key of one level, in ranking order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelMetrics {
    pub level: GeoLevel,
    pub rows: Vec<KeyMetrics>,
}

impl LevelMetrics {
    pub fn get(&self, key: &GeoKey) -> Option<&KeyMetrics> {
        self.rows.iter().find(|m| &m.key == key)
    }

    pub fn derived(&self) -> Vec<DerivedMetric> {
        self.rows.iter().flat_map(KeyMetrics::derived).collect()
    }
}

/// National-level figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NationalMetrics {
    pub total: u64,
    pub state_count: usize,
    pub district_count: usize,
    pub completeness_ratio: MetricValue,
    pub rural_share: MetricValue,
    pub urban_share: MetricValue,
    pub unclassified_share: MetricValue,
    pub rural_urban_ratio: MetricValue,
    /// Max / min state total.
    pub density_ratio: MetricValue,
}

/// Everything the metrics engine derives from one run's aggregates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub national: NationalMetrics,
    pub states: LevelMetrics,
    pub districts: LevelMetrics,
    pub tiers: BTreeMap<GeoKey, Tier>,
    /// Undefined values, in key order.
    pub undefined: Vec<MetricComputationError>,
}

impl MetricsReport {
    /// Derive all metrics. `national` must be the aggregate the state/district maps sum to.
    pub fn compute(
        national: &GeoAggregate,
        states: &GeoAggregates,
        districts: &GeoAggregates,
        thresholds: &TierThresholds,
    ) -> Self {
        let mut undefined = Vec::new();
        let tiers = assign_tiers(states, thresholds);

        let national_metrics = NationalMetrics {
            total: national.total(),
            state_count: states.len(),
            district_count: districts.len(),
            completeness_ratio: completeness_ratio(national),
            rural_share: class_share(national, RuralUrban::Rural),
            urban_share: class_share(national, RuralUrban::Urban),
            unclassified_share: class_share(national, RuralUrban::Unclassified),
            rural_urban_ratio: rural_urban_ratio(national),
            density_ratio: density_ratio(states),
        };
        note_undefined(
            &mut undefined,
            national.key(),
            MetricName::CompletenessRatio,
            national_metrics.completeness_ratio,
            UndefinedReason::ZeroTotal,
        );
        note_undefined(
            &mut undefined,
            national.key(),
            MetricName::RuralUrbanRatio,
            national_metrics.rural_urban_ratio,
            UndefinedReason::NoUrbanSchools,
        );
        note_undefined(
            &mut undefined,
            national.key(),
            MetricName::DensityRatio,
            national_metrics.density_ratio,
            UndefinedReason::NoPopulatedStates,
        );

        let state_metrics = level_metrics(
            GeoLevel::State,
            states,
            national.total(),
            Some(&tiers),
            &mut undefined,
        );
        let district_metrics =
            level_metrics(GeoLevel::District, districts, national.total(), None, &mut undefined);

        undefined.sort();
        Self {
            national: national_metrics,
            states: state_metrics,
            districts: district_metrics,
            tiers,
            undefined,
        }
    }

    /// Every per-key metric of both levels as a flat list.
    pub fn derived(&self) -> Vec<DerivedMetric> {
        let mut out = self.states.derived();
        out.extend(self.districts.derived());
        out
    }
}

/// Per-key metrics for one level, in ranking order.
pub fn level_metrics(
    level: GeoLevel,
    aggregates: &GeoAggregates,
    national_total: u64,
    tiers: Option<&BTreeMap<GeoKey, Tier>>,
    undefined: &mut Vec<MetricComputationError>,
) -> LevelMetrics {
    let rows = rank(aggregates)
        .into_iter()
        .enumerate()
        .map(|(i, agg)| {
            let m = KeyMetrics {
                key: agg.key().clone(),
                total: agg.total(),
                density_rank: i + 1,
                completeness_ratio: completeness_ratio(agg),
                concentration_share: concentration_share(agg, national_total),
                rural_share: class_share(agg, RuralUrban::Rural),
                urban_share: class_share(agg, RuralUrban::Urban),
                unclassified_share: class_share(agg, RuralUrban::Unclassified),
                rural_urban_ratio: rural_urban_ratio(agg),
                tier: tiers.and_then(|t| t.get(agg.key()).copied()),
            };
            note_undefined(
                undefined,
                &m.key,
                MetricName::CompletenessRatio,
                m.completeness_ratio,
                UndefinedReason::ZeroTotal,
            );
            note_undefined(
                undefined,
                &m.key,
                MetricName::ConcentrationShare,
                m.concentration_share,
                UndefinedReason::ZeroTotal,
            );
            note_undefined(
                undefined,
                &m.key,
                MetricName::RuralUrbanRatio,
                m.rural_urban_ratio,
                UndefinedReason::NoUrbanSchools,
            );
            m
        })
        .collect();
    LevelMetrics { level, rows }
}

fn note_undefined(
    out: &mut Vec<MetricComputationError>,
    key: &GeoKey,
    metric: MetricName,
    value: MetricValue,
    reason: UndefinedReason,
) {
    if !value.is_defined() {
        out.push(MetricComputationError {
            key: key.clone(),
            metric,
            reason,
        });
    }
}
