use std::collections::BTreeMap;

use crate::model::{Amount, BatchSummary, ItemIssue, MatchResult, Measure, UnmatchedResult};

/// Running totals of a batch.
#[derive(Debug, Clone, Default)]
pub struct Totals {
    pub total: Amount,
    pub tree_total: i64,
    pub area_total: f64,
}

impl Totals {
    /// Add a matched item. On overflow nothing is changed and the item is
    /// reported as [`ItemIssue::Overflow`].
    pub fn add(&mut self, m: &MatchResult) -> Result<(), ItemIssue> {
        let overflow = || ItemIssue::Overflow {
            filters: m.filters(),
        };

        let total = self.total.checked_add(m.computed_total).ok_or_else(overflow)?;
        let (tree_total, area_total) = match (m.measure, m.computed_total) {
            (Measure::Quantity(_), Amount::Integer(t)) => {
                (self.tree_total.checked_add(t).ok_or_else(overflow)?, self.area_total)
            }
            (_, t) => {
                let sum = self.area_total + t.as_f64();
                if !sum.is_finite() {
                    return Err(overflow());
                }
                (self.tree_total, sum)
            }
        };

        self.total = total;
        self.tree_total = tree_total;
        self.area_total = area_total;
        Ok(())
    }
}

/// Compute summary statistics for a finished batch.
pub fn compute_summary(
    items: usize,
    processed: &[MatchResult],
    unmatched: &[UnmatchedResult],
    totals: &Totals,
) -> BatchSummary {
    let mut kind_counts: BTreeMap<String, usize> = BTreeMap::new();
    for u in unmatched {
        *kind_counts.entry(u.kind.to_string()).or_insert(0) += 1;
    }

    BatchSummary {
        items,
        processed: processed.len(),
        unmatched: unmatched.len(),
        tree_total: totals.tree_total,
        area_total: totals.area_total,
        kind_counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Filters, IssueKind};

    fn matched(measure: Measure, total: Amount) -> MatchResult {
        MatchResult {
            index: 0,
            municipality: "Springfield".into(),
            group: None,
            measure,
            unit_rate: total,
            computed_total: total,
        }
    }

    #[test]
    fn totals_split_by_mode() {
        let mut totals = Totals::default();
        totals.add(&matched(Measure::Quantity(10), Amount::Integer(50))).unwrap();
        totals.add(&matched(Measure::Area(12.5), Amount::Float(25.0))).unwrap();
        totals.add(&matched(Measure::Quantity(1), Amount::Integer(5))).unwrap();

        assert_eq!(totals.total, Amount::Float(80.0));
        assert_eq!(totals.tree_total, 55);
        assert_eq!(totals.area_total, 25.0);
    }

    #[test]
    fn overflow_leaves_totals_untouched() {
        let mut totals = Totals::default();
        totals.add(&matched(Measure::Quantity(1), Amount::Integer(i64::MAX))).unwrap();
        let err = totals
            .add(&matched(Measure::Quantity(1), Amount::Integer(1)))
            .unwrap_err();
        assert_eq!(err.kind(), IssueKind::Overflow);
        assert_eq!(totals.total, Amount::Integer(i64::MAX));
        assert_eq!(totals.tree_total, i64::MAX);
    }

    #[test]
    fn summary_counts_kinds() {
        let issue = |kind: ItemIssue| kind.into_unmatched(0, &serde_json::Value::Null);
        let filters = Filters {
            municipality: "X".into(),
            group: None,
        };
        let unmatched = vec![
            issue(ItemIssue::NoRuleFound { filters: filters.clone() }),
            issue(ItemIssue::NoRuleFound { filters }),
            issue(ItemIssue::MissingField { fields: vec!["quantity or area"] }),
        ];
        let summary = compute_summary(3, &[], &unmatched, &Totals::default());
        assert_eq!(summary.items, 3);
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.unmatched, 3);
        assert_eq!(summary.kind_counts["no_rule_found"], 2);
        assert_eq!(summary.kind_counts["missing_field"], 1);
    }
}
