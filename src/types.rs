//! Core data model shared by every pipeline stage.
//!
//! Records move through the stages as:
//!
//! - [`RawSchoolRecord`]: what the loader extracted from the selected columns (identifier
//!   guaranteed, everything else still raw text)
//! - [`SchoolRecord`]: the normalized record with canonical names and enumerated codes
//!
//! Aggregates are keyed by [`GeoKey`], whose derived ordering is the canonical tie-break order.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

/// Sentinel used for missing/blank geographic names.
///
/// Real names are upper-cased by the normalizer, so this never collides with a source value.
pub const UNKNOWN: &str = "Unknown";

/// The logical columns the loader extracts from a source table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    SchoolId,
    State,
    District,
    Block,
    RuralUrban,
    SchoolType,
    SchoolCategory,
}

impl ColumnRole {
    /// All roles, in extraction order.
    pub const ALL: [ColumnRole; 7] = [
        ColumnRole::SchoolId,
        ColumnRole::State,
        ColumnRole::District,
        ColumnRole::Block,
        ColumnRole::RuralUrban,
        ColumnRole::SchoolType,
        ColumnRole::SchoolCategory,
    ];

    /// Whether a source without this column is a fatal load error.
    pub fn is_required(self) -> bool {
        matches!(self, ColumnRole::SchoolId | ColumnRole::State)
    }

    /// Position of the role in [`ColumnRole::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnRole::SchoolId => "school_id",
            ColumnRole::State => "state",
            ColumnRole::District => "district",
            ColumnRole::Block => "block",
            ColumnRole::RuralUrban => "rural_urban",
            ColumnRole::SchoolType => "school_type",
            ColumnRole::SchoolCategory => "school_category",
        }
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A school row as extracted by the loader.
///
/// Only the selected columns are retained. Empty cells are already `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSchoolRecord {
    pub school_id: String,
    pub state: Option<String>,
    pub district: Option<String>,
    pub block: Option<String>,
    pub rural_urban: Option<String>,
    pub school_type: Option<String>,
    pub school_category: Option<String>,
}

impl RawSchoolRecord {
    /// Record with only an identifier and state; every optional field is missing.
    pub fn new(school_id: impl Into<String>, state: Option<&str>) -> Self {
        Self {
            school_id: school_id.into(),
            state: state.map(str::to_owned),
            district: None,
            block: None,
            rural_urban: None,
            school_type: None,
            school_category: None,
        }
    }

    pub fn with_district(mut self, district: &str) -> Self {
        self.district = Some(district.to_owned());
        self
    }

    pub fn with_rural_urban(mut self, code: &str) -> Self {
        self.rural_urban = Some(code.to_owned());
        self
    }

    pub fn with_school_type(mut self, code: &str) -> Self {
        self.school_type = Some(code.to_owned());
        self
    }

    pub fn with_school_category(mut self, code: &str) -> Self {
        self.school_category = Some(code.to_owned());
        self
    }
}

/// Rural-urban classification of a school.
///
/// `Unclassified` is a first-class category: it is counted, exported and reported, never folded
/// into `Rural` or `Urban`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuralUrban {
    Rural,
    Urban,
    Unclassified,
}

impl RuralUrban {
    pub fn as_str(self) -> &'static str {
        match self {
            RuralUrban::Rural => "rural",
            RuralUrban::Urban => "urban",
            RuralUrban::Unclassified => "unclassified",
        }
    }
}

/// A canonical school type or school category code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Canonicalized source code (numeric codes without a fractional suffix).
    Code(String),
    /// Missing or blank in the source.
    Unclassified,
}

impl Category {
    /// Source code, `None` when unclassified. Codes are never blank, so `None` cannot collide with one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Category::Code(c) => Some(c.as_str()),
            Category::Unclassified => None,
        }
    }
}

/// A normalized school record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchoolRecord {
    pub school_id: String,
    pub state: String,
    pub district: String,
    pub block: String,
    pub rural_urban: RuralUrban,
    pub school_type: Category,
    pub school_category: Category,
}

/// Geographic granularity of an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoLevel {
    National,
    State,
    District,
}

impl GeoLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            GeoLevel::National => "national",
            GeoLevel::State => "state",
            GeoLevel::District => "district",
        }
    }
}

/// Grouping key of a [`crate::processing::GeoAggregate`].
///
/// The derived `Ord` compares level first, then names lexicographically; it is the tie-break
/// used whenever aggregates are ranked.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GeoKey {
    National,
    State(String),
    District { state: String, district: String },
}

impl GeoKey {
    /// Key for `record` at the given level.
    pub fn for_record(record: &SchoolRecord, level: GeoLevel) -> Self {
        match level {
            GeoLevel::National => GeoKey::National,
            GeoLevel::State => GeoKey::State(record.state.clone()),
            GeoLevel::District => GeoKey::District {
                state: record.state.clone(),
                district: record.district.clone(),
            },
        }
    }

    pub fn level(&self) -> GeoLevel {
        match self {
            GeoKey::National => GeoLevel::National,
            GeoKey::State(_) => GeoLevel::State,
            GeoKey::District { .. } => GeoLevel::District,
        }
    }

    /// State name, if the key is below national level.
    pub fn state(&self) -> Option<&str> {
        match self {
            GeoKey::National => None,
            GeoKey::State(s) | GeoKey::District { state: s, .. } => Some(s.as_str()),
        }
    }
}

/// Label used in exported tables: `National`, `<STATE>` or `<STATE> / <DISTRICT>`.
impl fmt::Display for GeoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeoKey::National => f.write_str("National"),
            GeoKey::State(s) => f.write_str(s),
            GeoKey::District { state, district } => write!(f, "{state} / {district}"),
        }
    }
}

/// Keys serialize as their display label.
impl Serialize for GeoKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnRole, GeoKey, GeoLevel};

    #[test]
    fn only_identifier_and_state_are_required() {
        let required: Vec<_> = ColumnRole::ALL.iter().filter(|r| r.is_required()).collect();
        assert_eq!(required, vec![&ColumnRole::SchoolId, &ColumnRole::State]);
    }

    #[test]
    fn role_index_matches_position() {
        for (i, role) in ColumnRole::ALL.iter().enumerate() {
            assert_eq!(role.index(), i);
        }
    }

    #[test]
    fn geo_key_orders_by_level_then_name() {
        let mut keys = vec![
            GeoKey::District {
                state: "A".to_string(),
                district: "Z".to_string(),
            },
            GeoKey::State("B".to_string()),
            GeoKey::State("A".to_string()),
            GeoKey::National,
        ];
        keys.sort();
        assert_eq!(keys[0], GeoKey::National);
        assert_eq!(keys[1], GeoKey::State("A".to_string()));
        assert_eq!(keys[2], GeoKey::State("B".to_string()));
        assert_eq!(keys[3].level(), GeoLevel::District);
    }

    #[test]
    fn geo_key_display_labels() {
        assert_eq!(GeoKey::National.to_string(), "National");
        assert_eq!(GeoKey::State("KERALA".to_string()).to_string(), "KERALA");
        let d = GeoKey::District {
            state: "KERALA".to_string(),
            district: "IDUKKI".to_string(),
        };
        assert_eq!(d.to_string(), "KERALA / IDUKKI");
        assert_eq!(d.state(), Some("KERALA"));
    }
}
