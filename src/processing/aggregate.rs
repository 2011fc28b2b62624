//! Grouped aggregation of normalized records.
//!
//! [`aggregate`] is a single pass: every record increments its key's total and the matching
//! per-class counters. The result is a [`GeoAggregates`] map with no inherent order; use
//! [`rank`] / [`top_n`] for deterministic ranked views (total desc, then key asc).
//!
//! Keys with no records never appear. Consumers must treat an absent key as zero.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::types::{Category, GeoKey, GeoLevel, RuralUrban, SchoolRecord};

/// Aggregates keyed by geography. Iteration order is unspecified.
pub type GeoAggregates = HashMap<GeoKey, GeoAggregate>;

/// Counts for one geographic key.
///
/// Invariant: `rural + urban + unclassified == total`, and each breakdown map sums to `total`.
/// Values are only ever built from records (or merged from other aggregates); there are no
/// public mutators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoAggregate {
    key: GeoKey,
    total: u64,
    rural: u64,
    urban: u64,
    unclassified: u64,
    school_types: BTreeMap<Category, u64>,
    school_categories: BTreeMap<Category, u64>,
}

impl GeoAggregate {
    pub(crate) fn empty(key: GeoKey) -> Self {
        Self {
            key,
            total: 0,
            rural: 0,
            urban: 0,
            unclassified: 0,
            school_types: BTreeMap::new(),
            school_categories: BTreeMap::new(),
        }
    }

    pub(crate) fn add(&mut self, record: &SchoolRecord) {
        self.total += 1;
        match record.rural_urban {
            RuralUrban::Rural => self.rural += 1,
            RuralUrban::Urban => self.urban += 1,
            RuralUrban::Unclassified => self.unclassified += 1,
        }
        bump(&mut self.school_types, &record.school_type, 1);
        bump(&mut self.school_categories, &record.school_category, 1);
    }

    /// Fold `other`'s counts into `self`. Keys are not compared; callers merge like with like
    /// or roll up into a coarser key.
    pub(crate) fn merge(&mut self, other: &GeoAggregate) {
        self.total += other.total;
        self.rural += other.rural;
        self.urban += other.urban;
        self.unclassified += other.unclassified;
        for (c, n) in &other.school_types {
            bump(&mut self.school_types, c, *n);
        }
        for (c, n) in &other.school_categories {
            bump(&mut self.school_categories, c, *n);
        }
    }

    pub fn key(&self) -> &GeoKey {
        &self.key
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn rural_count(&self) -> u64 {
        self.rural
    }

    pub fn urban_count(&self) -> u64 {
        self.urban
    }

    pub fn unclassified_count(&self) -> u64 {
        self.unclassified
    }

    /// Rural plus urban.
    pub fn classified_count(&self) -> u64 {
        self.rural + self.urban
    }

    pub fn count_of(&self, class: RuralUrban) -> u64 {
        match class {
            RuralUrban::Rural => self.rural,
            RuralUrban::Urban => self.urban,
            RuralUrban::Unclassified => self.unclassified,
        }
    }

    /// School type breakdown, ordered by code.
    pub fn school_types(&self) -> &BTreeMap<Category, u64> {
        &self.school_types
    }

    /// School category breakdown, ordered by code.
    pub fn school_categories(&self) -> &BTreeMap<Category, u64> {
        &self.school_categories
    }

    /// Check the count invariants.
    pub fn is_consistent(&self) -> bool {
        self.rural + self.urban + self.unclassified == self.total
            && self.school_types.values().sum::<u64>() == self.total
            && self.school_categories.values().sum::<u64>() == self.total
    }
}

fn bump(map: &mut BTreeMap<Category, u64>, category: &Category, n: u64) {
    match map.get_mut(category) {
        Some(c) => *c += n,
        None => {
            map.insert(category.clone(), n);
        }
    }
}

/// Group `records` by the key of `level` in a single pass.
pub fn aggregate(records: &[SchoolRecord], level: GeoLevel) -> GeoAggregates {
    let mut out = GeoAggregates::new();
    accumulate(&mut out, records, level);
    out
}

pub(crate) fn accumulate(out: &mut GeoAggregates, records: &[SchoolRecord], level: GeoLevel) {
    for record in records {
        let key = GeoKey::for_record(record, level);
        out.entry(key.clone())
            .or_insert_with(|| GeoAggregate::empty(key))
            .add(record);
    }
}

/// The national aggregate. Unlike grouped output this is always present (total 0 when empty).
pub fn aggregate_national(records: &[SchoolRecord]) -> GeoAggregate {
    let mut national = GeoAggregate::empty(GeoKey::National);
    for record in records {
        national.add(record);
    }
    national
}

/// Roll finer aggregates (states or districts) up into one national aggregate.
pub fn national_rollup(aggregates: &GeoAggregates) -> GeoAggregate {
    let mut national = GeoAggregate::empty(GeoKey::National);
    // Summation is order-independent, so map order does not matter.
    for agg in aggregates.values() {
        national.merge(agg);
    }
    national
}

/// Merge `src` into `dst`, key by key. Used to combine partial (per-chunk) aggregations.
pub fn merge_aggregates(dst: &mut GeoAggregates, src: GeoAggregates) {
    for (key, agg) in src {
        match dst.get_mut(&key) {
            Some(existing) => existing.merge(&agg),
            None => {
                dst.insert(key, agg);
            }
        }
    }
}

/// Deterministic ranking order: total descending, then key ascending.
pub fn rank_order(a: &GeoAggregate, b: &GeoAggregate) -> Ordering {
    b.total.cmp(&a.total).then_with(|| a.key.cmp(&b.key))
}

/// All aggregates in ranking order.
pub fn rank(aggregates: &GeoAggregates) -> Vec<&GeoAggregate> {
    let mut ranked: Vec<&GeoAggregate> = aggregates.values().collect();
    ranked.sort_by(|a, b| rank_order(a, b));
    ranked
}

/// The first `n` aggregates in ranking order.
pub fn top_n(aggregates: &GeoAggregates, n: usize) -> Vec<&GeoAggregate> {
    let mut ranked = rank(aggregates);
    ranked.truncate(n);
    ranked
}

/// Largest districts within the `n_states` largest states.
pub fn top_districts_in_top_states<'a>(
    states: &GeoAggregates,
    districts: &'a GeoAggregates,
    n_states: usize,
    n_districts: usize,
) -> Vec<&'a GeoAggregate> {
    let leading: HashSet<&str> = top_n(states, n_states)
        .into_iter()
        .filter_map(|agg| agg.key().state())
        .collect();
    let mut ranked: Vec<&GeoAggregate> = districts
        .values()
        .filter(|agg| agg.key().state().is_some_and(|s| leading.contains(s)))
        .collect();
    ranked.sort_by(|a, b| rank_order(a, b));
    ranked.truncate(n_districts);
    ranked
}
