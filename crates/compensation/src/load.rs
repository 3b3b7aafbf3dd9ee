//! Bulk loading of rule tables from CSV.
//!
//! Loading is an explicit, one-shot step performed by the caller before any
//! batch runs. Bad rows are skipped and reported; only structural problems
//! (unreadable file, missing column) abort the load.

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;

use crate::config::{CompensationConfig, RuleColumns};
use crate::error::CompensationError;
use crate::model::{Mode, Rule};
use crate::store::MemoryRuleStore;

/// A rate type that can be read from a CSV cell.
pub trait RateValue: Sized {
    /// Human description used in skip reasons.
    const EXPECTED: &'static str;

    fn parse_rate(cell: &str) -> Option<Self>;
}

impl RateValue for i64 {
    const EXPECTED: &'static str = "an integer";

    fn parse_rate(cell: &str) -> Option<Self> {
        cell.parse().ok()
    }
}

impl RateValue for f64 {
    const EXPECTED: &'static str = "a non-negative number";

    fn parse_rate(cell: &str) -> Option<Self> {
        cell.parse::<f64>().ok().filter(|r| r.is_finite() && *r >= 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// 1-based line number in the CSV, header included.
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct LoadedRules<R> {
    pub rules: Vec<Rule<R>>,
    pub skipped: Vec<SkippedRow>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TableReport {
    pub file: String,
    pub loaded: usize,
    pub skipped: Vec<SkippedRow>,
}

/// What [`load_store`] read, per table. Absent tables were not configured.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trees: Option<TableReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patches: Option<TableReport>,
}

pub fn load_tree_rules(
    csv_data: &str,
    columns: &RuleColumns,
) -> Result<LoadedRules<i64>, CompensationError> {
    load_rules(Mode::Trees, csv_data, columns)
}

pub fn load_patch_rules(
    csv_data: &str,
    columns: &RuleColumns,
) -> Result<LoadedRules<f64>, CompensationError> {
    load_rules(Mode::Patches, csv_data, columns)
}

/// Parse one rule table. Fields are trimmed; an empty group is no group.
///
/// Rows are skipped when the municipality is empty, the rate does not
/// parse, or the `(municipality, group)` pair was already seen.
pub fn load_rules<R: RateValue>(
    mode: Mode,
    csv_data: &str,
    columns: &RuleColumns,
) -> Result<LoadedRules<R>, CompensationError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CompensationError::Io(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let idx = |name: &str| -> Result<usize, CompensationError> {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            CompensationError::MissingColumn {
                table: mode.to_string(),
                column: name.into(),
            }
        })
    };

    let municipality_idx = idx(&columns.municipality)?;
    let rate_idx = idx(&columns.rate)?;
    let group_idx = match columns.group {
        Some(ref group) => Some(idx(group)?),
        None => None,
    };

    let mut rules = Vec::new();
    let mut skipped = Vec::new();
    let mut seen: HashSet<(String, Option<String>)> = HashSet::new();

    for record in reader.records() {
        let record = record.map_err(|e| CompensationError::Io(e.to_string()))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let mut skip = |reason: String| {
            log::warn!("{mode} rules, line {line}: skipped ({reason})");
            skipped.push(SkippedRow { line, reason });
        };

        let municipality = record.get(municipality_idx).unwrap_or("");
        if municipality.is_empty() {
            skip("empty municipality".into());
            continue;
        }

        let group = group_idx
            .and_then(|gi| record.get(gi))
            .filter(|g| !g.is_empty())
            .map(str::to_string);

        let rate_str = record.get(rate_idx).unwrap_or("");
        let Some(rate) = R::parse_rate(rate_str) else {
            skip(format!("rate '{rate_str}' is not {}", R::EXPECTED));
            continue;
        };

        if !seen.insert((municipality.to_string(), group.clone())) {
            skip(format!("duplicate rule for ({municipality}, {group:?})"));
            continue;
        }

        rules.push(Rule {
            municipality: municipality.to_string(),
            group,
            rate,
        });
    }

    log::info!(
        "{mode} rules: {} loaded, {} skipped",
        rules.len(),
        skipped.len()
    );

    Ok(LoadedRules { rules, skipped })
}

/// Read every configured table and build the store.
///
/// File paths are resolved against `base_dir` (normally the config file's
/// directory).
pub fn load_store(
    config: &CompensationConfig,
    base_dir: &Path,
) -> Result<(MemoryRuleStore, LoadReport), CompensationError> {
    let mut report = LoadReport::default();
    let mut trees = Vec::new();
    let mut patches = Vec::new();

    for (mode, source) in config.sources() {
        let path = base_dir.join(&source.file);
        let csv_data = std::fs::read_to_string(&path)
            .map_err(|e| CompensationError::Io(format!("cannot read {}: {e}", path.display())))?;
        let columns = source.columns(mode);

        match mode {
            Mode::Trees => {
                let loaded = load_tree_rules(&csv_data, &columns)?;
                report.trees = Some(TableReport {
                    file: source.file.clone(),
                    loaded: loaded.rules.len(),
                    skipped: loaded.skipped,
                });
                trees = loaded.rules;
            }
            Mode::Patches => {
                let loaded = load_patch_rules(&csv_data, &columns)?;
                report.patches = Some(TableReport {
                    file: source.file.clone(),
                    loaded: loaded.rules.len(),
                    skipped: loaded.skipped,
                });
                patches = loaded.rules;
            }
        }
    }

    Ok((MemoryRuleStore::new(trees, patches), report))
}
