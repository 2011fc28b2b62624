//! Explicit pipeline configuration.
//!
//! Every tunable of a run (which columns to read, tier thresholds, name aliases, parallelism)
//! lives in [`PipelineConfig`], which is passed into [`crate::pipeline::Pipeline`]. There is no
//! process-wide state; two runs with equal configs over equal inputs produce equal outputs.
//!
//! Configs can be written as JSON; every field has a default, so a partial document is enough:
//!
//! ```rust
//! use udise_metrics::config::{PipelineConfig, TierThresholds};
//!
//! let cfg = PipelineConfig::from_json_str(
//!     r#"{ "tiers": { "top_bottom": { "top_n": 3, "bottom_n": 2 } } }"#,
//! )
//! .unwrap();
//! assert_eq!(cfg.tiers, TierThresholds::TopBottom { top_n: 3, bottom_n: 2 });
//! assert_eq!(cfg.columns.candidates(udise_metrics::types::ColumnRole::State)[0], "state");
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::execution::ExecutionOptions;
use crate::types::ColumnRole;

/// Column-selection policy: the only columns the loader will materialize.
///
/// Each role lists candidate header names in priority order. The first candidate present in the
/// source is used; matching trims whitespace and ignores ASCII case. An empty candidate list
/// disables an optional role entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSelection {
    pub school_id: Vec<String>,
    pub state: Vec<String>,
    pub district: Vec<String>,
    pub block: Vec<String>,
    pub rural_urban: Vec<String>,
    pub school_type: Vec<String>,
    pub school_category: Vec<String>,
}

impl ColumnSelection {
    /// Candidate header names for `role`.
    pub fn candidates(&self, role: ColumnRole) -> &[String] {
        match role {
            ColumnRole::SchoolId => &self.school_id,
            ColumnRole::State => &self.state,
            ColumnRole::District => &self.district,
            ColumnRole::Block => &self.block,
            ColumnRole::RuralUrban => &self.rural_urban,
            ColumnRole::SchoolType => &self.school_type,
            ColumnRole::SchoolCategory => &self.school_category,
        }
    }

    /// Selection that reads exactly one named column per role.
    pub fn exact(
        school_id: &str,
        state: &str,
        district: &str,
        block: &str,
        rural_urban: &str,
        school_type: &str,
        school_category: &str,
    ) -> Self {
        Self {
            school_id: vec![school_id.to_owned()],
            state: vec![state.to_owned()],
            district: vec![district.to_owned()],
            block: vec![block.to_owned()],
            rural_urban: vec![rural_urban.to_owned()],
            school_type: vec![school_type.to_owned()],
            school_category: vec![school_category.to_owned()],
        }
    }
}

impl Default for ColumnSelection {
    fn default() -> Self {
        fn names(xs: &[&str]) -> Vec<String> {
            xs.iter().map(|s| (*s).to_owned()).collect()
        }
        Self {
            school_id: names(&[
                "pseudocode",
                "udise_code",
                "udisecode",
                "school_code",
                "dise_code",
            ]),
            state: names(&["state", "state_name"]),
            district: names(&["district", "district_name"]),
            block: names(&["block", "block_name"]),
            rural_urban: names(&["rural_urban", "location"]),
            school_type: names(&["school_type"]),
            school_category: names(&["school_category"]),
        }
    }
}

/// How states are partitioned into density tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierThresholds {
    /// The `top_n` largest states are high density, the `bottom_n` smallest low density, the rest
    /// medium. Ranking uses total desc, state name asc. When the two overlap, high wins.
    TopBottom { top_n: usize, bottom_n: usize },
    /// High when `total >= high_at_least`, low when `total < low_below`, otherwise medium.
    MinTotals { high_at_least: u64, low_below: u64 },
}

impl Default for TierThresholds {
    fn default() -> Self {
        TierThresholds::TopBottom {
            top_n: 5,
            bottom_n: 5,
        }
    }
}

/// Geographic name normalization settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameConfig {
    /// Extra `variant -> canonical` state aliases, applied after the built-in table.
    ///
    /// Both sides go through the same cleanup as source values, so casing does not matter.
    pub state_aliases: BTreeMap<String, String>,
    /// Replaces the built-in list of recognized state/UT names when set.
    pub canonical_states: Option<Vec<String>>,
}

/// Configuration for a whole pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub columns: ColumnSelection,
    pub tiers: TierThresholds,
    pub names: NameConfig,
    pub execution: ExecutionOptions,
    /// Stop after this many data rows (per run, across shards).
    pub row_limit: Option<usize>,
    /// Number of districts in the ranked drilldown.
    pub top_n_districts: usize,
    /// Number of leading states the district drilldown is restricted to.
    pub top_n_states_for_districts: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            columns: ColumnSelection::default(),
            tiers: TierThresholds::default(),
            names: NameConfig::default(),
            execution: ExecutionOptions::default(),
            row_limit: None,
            top_n_districts: 30,
            top_n_states_for_districts: 5,
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let cfg: PipelineConfig = serde_json::from_str(input)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject configs that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for role in ColumnRole::ALL {
            if role.is_required() && self.columns.candidates(role).is_empty() {
                return Err(ConfigError::Invalid {
                    message: format!("column role '{role}' is required but has no candidates"),
                });
            }
        }
        if let TierThresholds::MinTotals {
            high_at_least,
            low_below,
        } = self.tiers
        {
            if low_below > high_at_least {
                return Err(ConfigError::Invalid {
                    message: format!(
                        "tier thresholds overlap: low_below={low_below} > high_at_least={high_at_least}"
                    ),
                });
            }
        }
        if self.execution.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                message: "execution.chunk_size must be > 0".to_string(),
            });
        }
        if self.execution.num_threads == Some(0) {
            return Err(ConfigError::Invalid {
                message: "execution.num_threads must be > 0 when set".to_string(),
            });
        }
        Ok(())
    }
}
