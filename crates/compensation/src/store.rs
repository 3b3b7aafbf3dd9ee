use std::collections::{BTreeSet, HashMap, HashSet};

use crate::model::{Mode, PatchRule, Rule, TreeRule};

/// Read-only lookup of compensation rates.
///
/// Lookups are exact string matches on municipality and, when given, on
/// group. With the group omitted every rule of the municipality is a
/// candidate, in load order.
pub trait RuleStore {
    fn tree_rules(&self, municipality: &str, group: Option<&str>) -> Vec<&TreeRule>;

    fn patch_rules(&self, municipality: &str, group: Option<&str>) -> Vec<&PatchRule>;

    /// Distinct municipality names of one table, sorted.
    fn municipalities(&self, mode: Mode) -> Vec<String>;

    /// Rate of the first matching tree rule.
    fn find_tree_rate(&self, municipality: &str, group: Option<&str>) -> Option<i64> {
        self.tree_rules(municipality, group).first().map(|r| r.rate)
    }

    /// Rate of the first matching patch rule.
    fn find_patch_rate(&self, municipality: &str, group: Option<&str>) -> Option<f64> {
        self.patch_rules(municipality, group).first().map(|r| r.rate)
    }
}

/// One rule table indexed by municipality. Rule order is load order.
#[derive(Debug, Clone)]
pub struct RuleTable<R> {
    rules: Vec<Rule<R>>,
    by_municipality: HashMap<String, Vec<usize>>,
    grouped: bool,
}

impl<R> Default for RuleTable<R> {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            by_municipality: HashMap::new(),
            grouped: false,
        }
    }
}

impl<R> RuleTable<R> {
    /// Build a table. A rule whose `(municipality, group)` repeats an
    /// earlier one is dropped.
    pub fn new(rules: impl IntoIterator<Item = Rule<R>>) -> Self {
        let mut table = Self::default();
        let mut seen: HashSet<(String, Option<String>)> = HashSet::new();

        for rule in rules {
            if !seen.insert((rule.municipality.clone(), rule.group.clone())) {
                log::debug!(
                    "dropping duplicate rule for ({}, {:?})",
                    rule.municipality,
                    rule.group
                );
                continue;
            }
            table
                .by_municipality
                .entry(rule.municipality.clone())
                .or_default()
                .push(table.rules.len());
            table.grouped |= rule.group.is_some();
            table.rules.push(rule);
        }

        table
    }

    pub fn lookup(&self, municipality: &str, group: Option<&str>) -> Vec<&Rule<R>> {
        let Some(indices) = self.by_municipality.get(municipality) else {
            return Vec::new();
        };
        indices
            .iter()
            .map(|&i| &self.rules[i])
            .filter(|rule| group.map_or(true, |g| rule.group.as_deref() == Some(g)))
            .collect()
    }

    pub fn municipalities(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self.by_municipality.keys().collect();
        names.into_iter().cloned().collect()
    }

    /// Whether any rule carries a group.
    pub fn is_grouped(&self) -> bool {
        self.grouped
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// In-memory store holding both rule tables. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct MemoryRuleStore {
    trees: RuleTable<i64>,
    patches: RuleTable<f64>,
}

impl MemoryRuleStore {
    pub fn new(
        trees: impl IntoIterator<Item = TreeRule>,
        patches: impl IntoIterator<Item = PatchRule>,
    ) -> Self {
        Self {
            trees: RuleTable::new(trees),
            patches: RuleTable::new(patches),
        }
    }
}

impl RuleStore for MemoryRuleStore {
    fn tree_rules(&self, municipality: &str, group: Option<&str>) -> Vec<&TreeRule> {
        self.trees.lookup(municipality, group)
    }

    /// Patch tables without a stage column match on municipality alone, so
    /// an item's group is ignored there.
    fn patch_rules(&self, municipality: &str, group: Option<&str>) -> Vec<&PatchRule> {
        let group = group.filter(|_| self.patches.is_grouped());
        self.patches.lookup(municipality, group)
    }

    fn municipalities(&self, mode: Mode) -> Vec<String> {
        match mode {
            Mode::Trees => self.trees.municipalities(),
            Mode::Patches => self.patches.municipalities(),
        }
    }
}
