use crate::config::UngroupedPolicy;
use crate::model::{Amount, Filters, ItemIssue, MatchResult, Measure, Rule, ValidatedItem};
use crate::store::RuleStore;

/// Resolves validated items against a borrowed rule store.
pub struct Resolver<'s, S: RuleStore + ?Sized> {
    store: &'s S,
    policy: UngroupedPolicy,
}

impl<'s, S: RuleStore + ?Sized> Resolver<'s, S> {
    pub fn new(store: &'s S, policy: UngroupedPolicy) -> Self {
        Self { store, policy }
    }

    /// Find the applicable rule and compute the item total.
    ///
    /// Tree totals use checked integer arithmetic; patch totals use `f64`
    /// and must stay finite.
    pub fn resolve(&self, index: usize, item: &ValidatedItem) -> Result<MatchResult, ItemIssue> {
        let filters = item.filters();

        match *item {
            ValidatedItem::Count { quantity, .. } => {
                let candidates = self
                    .store
                    .tree_rules(&filters.municipality, filters.group.as_deref());
                let rule = self.pick(candidates, &filters)?;
                let total = quantity
                    .checked_mul(rule.rate)
                    .ok_or_else(|| ItemIssue::Overflow { filters: filters.clone() })?;
                Ok(MatchResult {
                    index,
                    municipality: filters.municipality,
                    group: filters.group,
                    measure: Measure::Quantity(quantity),
                    unit_rate: Amount::Integer(rule.rate),
                    computed_total: Amount::Integer(total),
                })
            }
            ValidatedItem::Area { area, .. } => {
                let candidates = self
                    .store
                    .patch_rules(&filters.municipality, filters.group.as_deref());
                let rule = self.pick(candidates, &filters)?;
                let total = area * rule.rate;
                if !total.is_finite() {
                    return Err(ItemIssue::Overflow { filters });
                }
                Ok(MatchResult {
                    index,
                    municipality: filters.municipality,
                    group: filters.group,
                    measure: Measure::Area(area),
                    unit_rate: Amount::Float(rule.rate),
                    computed_total: Amount::Float(total),
                })
            }
        }
    }

    fn pick<'r, R>(
        &self,
        candidates: Vec<&'r Rule<R>>,
        filters: &Filters,
    ) -> Result<&'r Rule<R>, ItemIssue> {
        match candidates.as_slice() {
            [] => Err(ItemIssue::NoRuleFound {
                filters: filters.clone(),
            }),
            [only] => Ok(*only),
            [first, ..] => {
                if filters.group.is_none() && self.policy == UngroupedPolicy::RejectAmbiguous {
                    return Err(ItemIssue::AmbiguousRule {
                        filters: filters.clone(),
                        candidates: candidates.iter().map(|r| r.group.clone()).collect(),
                    });
                }
                Ok(*first)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IssueKind, Rule};
    use crate::store::MemoryRuleStore;

    fn store() -> MemoryRuleStore {
        MemoryRuleStore::new(
            vec![
                Rule {
                    municipality: "Springfield".into(),
                    group: Some("urban".into()),
                    rate: 5,
                },
                Rule {
                    municipality: "Springfield".into(),
                    group: Some("rural".into()),
                    rate: 3,
                },
                Rule {
                    municipality: "Shelbyville".into(),
                    group: None,
                    rate: i64::MAX,
                },
            ],
            vec![Rule {
                municipality: "Springfield".into(),
                group: None,
                rate: 2.0,
            }],
        )
    }

    fn count(municipality: &str, group: Option<&str>, quantity: i64) -> ValidatedItem {
        ValidatedItem::Count {
            municipality: municipality.into(),
            group: group.map(str::to_string),
            quantity,
        }
    }

    #[test]
    fn count_with_group_uses_integer_math() {
        let s = store();
        let r = Resolver::new(&s, UngroupedPolicy::FirstLoaded);
        let m = r.resolve(0, &count("Springfield", Some("urban"), 10)).unwrap();
        assert_eq!(m.unit_rate, Amount::Integer(5));
        assert_eq!(m.computed_total, Amount::Integer(50));
        assert_eq!(m.measure, Measure::Quantity(10));
    }

    #[test]
    fn area_uses_float_math() {
        let s = store();
        let r = Resolver::new(&s, UngroupedPolicy::FirstLoaded);
        let item = ValidatedItem::Area {
            municipality: "Springfield".into(),
            group: None,
            area: 12.5,
        };
        let m = r.resolve(3, &item).unwrap();
        assert_eq!(m.index, 3);
        assert_eq!(m.computed_total, Amount::Float(25.0));
    }

    #[test]
    fn unknown_municipality_reports_filters() {
        let s = store();
        let r = Resolver::new(&s, UngroupedPolicy::FirstLoaded);
        let err = r.resolve(0, &count("Unknown City", None, 3)).unwrap_err();
        assert_eq!(
            err,
            ItemIssue::NoRuleFound {
                filters: Filters {
                    municipality: "Unknown City".into(),
                    group: None,
                }
            }
        );
    }

    #[test]
    fn omitted_group_first_loaded_wins() {
        let s = store();
        let r = Resolver::new(&s, UngroupedPolicy::FirstLoaded);
        let m = r.resolve(0, &count("Springfield", None, 2)).unwrap();
        assert_eq!(m.computed_total, Amount::Integer(10));
        assert_eq!(m.group, None);
    }

    #[test]
    fn omitted_group_rejected_when_ambiguous() {
        let s = store();
        let r = Resolver::new(&s, UngroupedPolicy::RejectAmbiguous);
        let err = r.resolve(0, &count("Springfield", None, 2)).unwrap_err();
        assert_eq!(err.kind(), IssueKind::AmbiguousRule);
        let ItemIssue::AmbiguousRule { candidates, .. } = err else {
            unreachable!()
        };
        assert_eq!(candidates, vec![Some("urban".to_string()), Some("rural".to_string())]);

        // A single candidate is never ambiguous
        let m = r.resolve(1, &count("Shelbyville", None, 1)).unwrap();
        assert_eq!(m.computed_total, Amount::Integer(i64::MAX));
    }

    #[test]
    fn integer_overflow_is_classified() {
        let s = store();
        let r = Resolver::new(&s, UngroupedPolicy::FirstLoaded);
        let err = r.resolve(0, &count("Shelbyville", None, 2)).unwrap_err();
        assert_eq!(err.kind(), IssueKind::Overflow);
    }

    #[test]
    fn unknown_group_is_no_rule() {
        let s = store();
        let r = Resolver::new(&s, UngroupedPolicy::FirstLoaded);
        let err = r.resolve(0, &count("Springfield", Some("coastal"), 2)).unwrap_err();
        assert_eq!(err.kind(), IssueKind::NoRuleFound);
        assert_eq!(err.filters().unwrap().group.as_deref(), Some("coastal"));
    }
}
