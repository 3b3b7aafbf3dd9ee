use serde::{Deserialize, Serialize};

use crate::error::CompensationError;
use crate::model::Mode;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CompensationConfig {
    pub name: String,
    #[serde(default)]
    pub trees: Option<RuleSourceConfig>,
    #[serde(default)]
    pub patches: Option<RuleSourceConfig>,
    #[serde(default)]
    pub matching: MatchingConfig,
}

// ---------------------------------------------------------------------------
// Rule sources
// ---------------------------------------------------------------------------

/// A CSV file holding one rule table.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSourceConfig {
    pub file: String,
    #[serde(default)]
    pub columns: ColumnOverrides,
}

/// Column names as written in the config. Unset names fall back to the
/// per-table defaults in [`RuleColumns`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColumnOverrides {
    #[serde(default)]
    pub municipality: Option<String>,
    /// Empty string disables the group column.
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub rate: Option<String>,
}

/// Resolved CSV column names for one rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleColumns {
    pub municipality: String,
    pub group: Option<String>,
    pub rate: String,
}

impl RuleColumns {
    pub fn defaults(mode: Mode) -> Self {
        match mode {
            Mode::Trees => Self {
                municipality: "municipality".into(),
                group: Some("group".into()),
                rate: "compensation".into(),
            },
            Mode::Patches => Self {
                municipality: "municipality".into(),
                group: None,
                rate: "compensation_m2".into(),
            },
        }
    }
}

impl RuleSourceConfig {
    pub fn columns(&self, mode: Mode) -> RuleColumns {
        let defaults = RuleColumns::defaults(mode);
        let overrides = &self.columns;
        RuleColumns {
            municipality: overrides.municipality.clone().unwrap_or(defaults.municipality),
            group: match &overrides.group {
                Some(g) if g.is_empty() => None,
                Some(g) => Some(g.clone()),
                None => defaults.group,
            },
            rate: overrides.rate.clone().unwrap_or(defaults.rate),
        }
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchingConfig {
    #[serde(default)]
    pub ungrouped: UngroupedPolicy,
}

/// What to do when an item omits its group and the municipality has more
/// than one rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UngroupedPolicy {
    /// Use the rule that was loaded first (CSV row order).
    #[default]
    FirstLoaded,
    /// Report the item as ambiguous.
    RejectAmbiguous,
}

impl std::fmt::Display for UngroupedPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FirstLoaded => write!(f, "first_loaded"),
            Self::RejectAmbiguous => write!(f, "reject_ambiguous"),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl CompensationConfig {
    pub fn from_toml(input: &str) -> Result<Self, CompensationError> {
        let config: CompensationConfig =
            toml::from_str(input).map_err(|e| CompensationError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Configured sources with their mode, trees first.
    pub fn sources(&self) -> impl Iterator<Item = (Mode, &RuleSourceConfig)> + '_ {
        [(Mode::Trees, self.trees.as_ref()), (Mode::Patches, self.patches.as_ref())]
            .into_iter()
            .filter_map(|(mode, source)| source.map(|s| (mode, s)))
    }

    pub fn validate(&self) -> Result<(), CompensationError> {
        if self.trees.is_none() && self.patches.is_none() {
            return Err(CompensationError::ConfigValidation(
                "at least one of [trees] or [patches] is required".into(),
            ));
        }

        for (mode, source) in self.sources() {
            if source.file.trim().is_empty() {
                return Err(CompensationError::ConfigValidation(format!(
                    "[{mode}]: file must not be empty"
                )));
            }
            let columns = source.columns(mode);
            if columns.municipality.is_empty() {
                return Err(CompensationError::ConfigValidation(format!(
                    "[{mode}.columns]: municipality column must not be empty"
                )));
            }
            if columns.rate.is_empty() {
                return Err(CompensationError::ConfigValidation(format!(
                    "[{mode}.columns]: rate column must not be empty"
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
