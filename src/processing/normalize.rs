//! Field normalization: raw loader output to canonical [`SchoolRecord`]s.
//!
//! Normalization never drops a record. Values it cannot place end up as
//! [`RuralUrban::Unclassified`], [`Category::Unclassified`] or the [`UNKNOWN`] sentinel, and the
//! anomaly is tallied as a [`NormalizationWarning`].
//!
//! Rural-urban mapping is strictly three-way: `1` is rural, `2` is urban, everything else
//! (including blanks) is unclassified.
//!
//! ```rust
//! use udise_metrics::processing::normalize::normalize_rural_urban;
//! use udise_metrics::types::RuralUrban;
//!
//! assert_eq!(normalize_rural_urban(Some("1")).0, RuralUrban::Rural);
//! assert_eq!(normalize_rural_urban(Some("2.0")).0, RuralUrban::Urban);
//! assert_eq!(normalize_rural_urban(Some("9")).0, RuralUrban::Unclassified);
//! assert!(normalize_rural_urban(Some("9")).1.is_some());
//! assert_eq!(normalize_rural_urban(None), (RuralUrban::Unclassified, None));
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::config::NameConfig;
use crate::types::{Category, ColumnRole, RawSchoolRecord, RuralUrban, SchoolRecord, UNKNOWN};

/// States and union territories recognized without configuration, in canonical spelling.
pub const CANONICAL_STATES: [&str; 36] = [
    "ANDAMAN AND NICOBAR ISLANDS",
    "ANDHRA PRADESH",
    "ARUNACHAL PRADESH",
    "ASSAM",
    "BIHAR",
    "CHANDIGARH",
    "CHHATTISGARH",
    "DADRA AND NAGAR HAVELI AND DAMAN AND DIU",
    "DELHI",
    "GOA",
    "GUJARAT",
    "HARYANA",
    "HIMACHAL PRADESH",
    "JAMMU AND KASHMIR",
    "JHARKHAND",
    "KARNATAKA",
    "KERALA",
    "LADAKH",
    "LAKSHADWEEP",
    "MADHYA PRADESH",
    "MAHARASHTRA",
    "MANIPUR",
    "MEGHALAYA",
    "MIZORAM",
    "NAGALAND",
    "ODISHA",
    "PUDUCHERRY",
    "PUNJAB",
    "RAJASTHAN",
    "SIKKIM",
    "TAMIL NADU",
    "TELANGANA",
    "TRIPURA",
    "UTTAR PRADESH",
    "UTTARAKHAND",
    "WEST BENGAL",
];

/// Known spelling variants, already in cleaned form.
const STATE_ALIASES: [(&str, &str); 17] = [
    ("ORISSA", "ODISHA"),
    ("PONDICHERRY", "PUDUCHERRY"),
    ("UTTARANCHAL", "UTTARAKHAND"),
    ("NCT OF DELHI", "DELHI"),
    ("NATIONAL CAPITAL TERRITORY OF DELHI", "DELHI"),
    ("TAMILNADU", "TAMIL NADU"),
    ("CHHATISGARH", "CHHATTISGARH"),
    ("CHATTISGARH", "CHHATTISGARH"),
    ("TELENGANA", "TELANGANA"),
    ("WESTBENGAL", "WEST BENGAL"),
    ("ANDAMAN AND NICOBAR", "ANDAMAN AND NICOBAR ISLANDS"),
    ("A AND N ISLANDS", "ANDAMAN AND NICOBAR ISLANDS"),
    ("JAMMU KASHMIR", "JAMMU AND KASHMIR"),
    ("DADRA AND NAGAR HAVELI", "DADRA AND NAGAR HAVELI AND DAMAN AND DIU"),
    ("DAMAN AND DIU", "DADRA AND NAGAR HAVELI AND DAMAN AND DIU"),
    (
        "THE DADRA AND NAGAR HAVELI AND DAMAN AND DIU",
        "DADRA AND NAGAR HAVELI AND DAMAN AND DIU",
    ),
    ("LAKSHADWEEP ISLANDS", "LAKSHADWEEP"),
];

/// A non-fatal anomaly found while normalizing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizationWarning {
    /// A categorical code outside the known set; the value became unclassified.
    UnrecognizedCode { field: ColumnRole, raw: String },
    /// A state name not in the canonical list; it was passed through as `normalized`.
    UnrecognizedState { raw: String, normalized: String },
    /// A blank/missing geographic name; it became the `Unknown` sentinel.
    MissingGeography { field: ColumnRole },
}

impl NormalizationWarning {
    /// Whether this warning flags a geographic name.
    pub fn is_name_flag(&self) -> bool {
        matches!(
            self,
            NormalizationWarning::UnrecognizedState { .. } | NormalizationWarning::MissingGeography { .. }
        )
    }
}

/// A warning together with the number of records that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarningCount {
    #[serde(flatten)]
    pub warning: NormalizationWarning,
    pub count: u64,
}

/// Bounded accumulation of warnings: identical warnings are counted, not repeated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarningTally {
    counts: BTreeMap<NormalizationWarning, u64>,
}

impl WarningTally {
    pub fn record(&mut self, warning: NormalizationWarning) {
        *self.counts.entry(warning).or_insert(0) += 1;
    }

    /// Total number of warnings raised (not distinct).
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Records whose state or district name was flagged.
    pub fn flagged_names(&self) -> u64 {
        self.counts
            .iter()
            .filter(|(w, _)| w.is_name_flag())
            .map(|(_, c)| *c)
            .sum()
    }

    pub fn count_of(&self, warning: &NormalizationWarning) -> u64 {
        self.counts.get(warning).copied().unwrap_or(0)
    }

    /// Distinct warnings, most frequent first, ties in warning order.
    pub fn to_counts(&self) -> Vec<WarningCount> {
        let mut out: Vec<WarningCount> = self
            .counts
            .iter()
            .map(|(warning, &count)| WarningCount {
                warning: warning.clone(),
                count,
            })
            .collect();
        out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.warning.cmp(&b.warning)));
        out
    }
}

/// Output of the normalizer stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedRecords {
    pub records: Vec<SchoolRecord>,
    pub warnings: WarningTally,
    /// Blank codes per categorical role (not warnings; they are simply unclassified).
    pub missing_codes: BTreeMap<ColumnRole, u64>,
}

/// Maps raw codes and names to their canonical forms.
#[derive(Debug, Clone)]
pub struct Normalizer {
    aliases: HashMap<String, String>,
    canonical_states: HashSet<String>,
    unbound: HashSet<ColumnRole>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&NameConfig::default())
    }
}

impl Normalizer {
    pub fn new(names: &NameConfig) -> Self {
        let mut aliases: HashMap<String, String> = STATE_ALIASES
            .iter()
            .map(|(from, to)| ((*from).to_string(), (*to).to_string()))
            .collect();
        for (from, to) in &names.state_aliases {
            aliases.insert(clean_name(from), clean_name(to));
        }

        let canonical_states = match &names.canonical_states {
            Some(list) => list.iter().map(|s| clean_name(s)).collect(),
            None => CANONICAL_STATES.iter().map(|s| (*s).to_string()).collect(),
        };

        Self {
            aliases,
            canonical_states,
            unbound: HashSet::new(),
        }
    }

    /// Roles no source provided. A district left blank because its column never existed is not
    /// flagged per record; the load report already names the missing column.
    pub fn with_unbound_roles(mut self, roles: impl IntoIterator<Item = ColumnRole>) -> Self {
        self.unbound.extend(roles);
        self
    }

    /// Normalize every record. Records are consumed so the raw set is not held twice.
    pub fn normalize<I>(&self, raw: I) -> NormalizedRecords
    where
        I: IntoIterator<Item = RawSchoolRecord>,
    {
        let mut out = NormalizedRecords::default();
        for r in raw {
            let record = self.normalize_record(r, &mut out.warnings, &mut out.missing_codes);
            out.records.push(record);
        }
        out
    }

    fn normalize_record(
        &self,
        raw: RawSchoolRecord,
        warnings: &mut WarningTally,
        missing_codes: &mut BTreeMap<ColumnRole, u64>,
    ) -> SchoolRecord {
        let (state, w) = self.normalize_state(raw.state.as_deref());
        if let Some(w) = w {
            warnings.record(w);
        }
        let (district, w) = normalize_district(raw.district.as_deref());
        if let Some(w) = w.filter(|_| !self.unbound.contains(&ColumnRole::District)) {
            warnings.record(w);
        }
        let block = normalize_name(raw.block.as_deref()).unwrap_or_else(|| UNKNOWN.to_string());

        let (rural_urban, w) = normalize_rural_urban(raw.rural_urban.as_deref());
        if let Some(w) = w {
            warnings.record(w);
        }
        let school_type = normalize_category(raw.school_type.as_deref());
        let school_category = normalize_category(raw.school_category.as_deref());

        for (role, present) in [
            (ColumnRole::RuralUrban, raw.rural_urban.is_some()),
            (ColumnRole::SchoolType, raw.school_type.is_some()),
            (ColumnRole::SchoolCategory, raw.school_category.is_some()),
        ] {
            if !present {
                *missing_codes.entry(role).or_insert(0) += 1;
            }
        }

        SchoolRecord {
            school_id: raw.school_id,
            state,
            district,
            block,
            rural_urban,
            school_type,
            school_category,
        }
    }

    /// Canonical state name.
    ///
    /// Known variants collapse to one label. Unknown names pass through cleaned but flagged.
    pub fn normalize_state(&self, raw: Option<&str>) -> (String, Option<NormalizationWarning>) {
        let Some(cleaned) = normalize_name(raw) else {
            return (
                UNKNOWN.to_string(),
                Some(NormalizationWarning::MissingGeography {
                    field: ColumnRole::State,
                }),
            );
        };
        let canonical = self.aliases.get(&cleaned).cloned().unwrap_or(cleaned);
        if self.canonical_states.contains(&canonical) {
            (canonical, None)
        } else {
            let warning = NormalizationWarning::UnrecognizedState {
                raw: raw.unwrap_or_default().trim().to_string(),
                normalized: canonical.clone(),
            };
            (canonical, Some(warning))
        }
    }
}

/// Canonical district name; there is no district reference list, so only blanks are flagged.
pub fn normalize_district(raw: Option<&str>) -> (String, Option<NormalizationWarning>) {
    match normalize_name(raw) {
        Some(name) => (name, None),
        None => (
            UNKNOWN.to_string(),
            Some(NormalizationWarning::MissingGeography {
                field: ColumnRole::District,
            }),
        ),
    }
}

/// Three-way rural-urban mapping. Blank input is unclassified without a warning.
pub fn normalize_rural_urban(raw: Option<&str>) -> (RuralUrban, Option<NormalizationWarning>) {
    let Some(raw) = raw else {
        return (RuralUrban::Unclassified, None);
    };
    match canonical_code(raw).as_deref() {
        Some("1") => (RuralUrban::Rural, None),
        Some("2") => (RuralUrban::Urban, None),
        None => (RuralUrban::Unclassified, None),
        Some(_) => (
            RuralUrban::Unclassified,
            Some(NormalizationWarning::UnrecognizedCode {
                field: ColumnRole::RuralUrban,
                raw: raw.trim().to_string(),
            }),
        ),
    }
}

/// School type / category code, unclassified when blank.
pub fn normalize_category(raw: Option<&str>) -> Category {
    raw.and_then(canonical_code)
        .map(Category::Code)
        .unwrap_or(Category::Unclassified)
}

/// Trim a code and drop a zero fractional part from numeric codes (`"3.0"` and `"03"` become `"3"`).
pub fn canonical_code(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(v) = t.parse::<f64>() {
        if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
            return Some(format!("{}", v as i64));
        }
    }
    Some(t.to_string())
}

/// Cleaned geographic name, `None` when blank.
pub fn normalize_name(raw: Option<&str>) -> Option<String> {
    let cleaned = clean_name(raw?);
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

/// Upper-case, fold common transliteration diacritics, spell out `&`, collapse whitespace and
/// strip surrounding punctuation.
fn clean_name(raw: &str) -> String {
    let spelled = raw.replace('&', " AND ");
    let words: Vec<String> = spelled
        .split_whitespace()
        .map(|w| w.to_uppercase().chars().map(fold_diacritic).collect())
        .collect();
    words
        .join(" ")
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .to_string()
}

fn fold_diacritic(c: char) -> char {
    match c {
        'Ā' | 'Á' | 'À' | 'Â' | 'Ä' | 'Ã' => 'A',
        'Ē' | 'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'Ī' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'Ō' | 'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
        'Ū' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'Ñ' | 'Ṇ' | 'Ṅ' => 'N',
        'Ś' | 'Ṣ' => 'S',
        'Ṭ' => 'T',
        'Ḍ' => 'D',
        'Ṛ' => 'R',
        'Ḥ' => 'H',
        'Ṃ' => 'M',
        _ => c,
    }
}
