use serde_json::Value;

use crate::config::UngroupedPolicy;
use crate::error::CompensationError;
use crate::model::BatchResult;
use crate::resolve::Resolver;
use crate::store::RuleStore;
use crate::summary::{compute_summary, Totals};
use crate::validate::validate;

/// Envelope keys that may carry the item list, in lookup order.
pub const ENVELOPE_KEYS: &[&str] = &["items", "patches"];

/// Runs batches of line items against a borrowed rule store.
///
/// The store must be fully loaded before the runner is built; the runner
/// only reads it.
pub struct BatchRunner<'s, S: RuleStore + ?Sized> {
    resolver: Resolver<'s, S>,
}

impl<'s, S: RuleStore + ?Sized> BatchRunner<'s, S> {
    pub fn new(store: &'s S, policy: UngroupedPolicy) -> Self {
        Self {
            resolver: Resolver::new(store, policy),
        }
    }

    /// Run a request payload: either a bare list of items or an object
    /// carrying the list under `items` (or `patches`).
    pub fn run_request(&self, payload: &Value) -> Result<BatchResult, CompensationError> {
        self.run_items(request_items(payload)?)
    }

    /// Run a raw batch value, which must be a non-empty list.
    pub fn run_batch(&self, raw: &Value) -> Result<BatchResult, CompensationError> {
        let items = raw.as_array().ok_or_else(|| {
            CompensationError::InvalidBatch("expected a list of items".into())
        })?;
        self.run_items(items)
    }

    /// Process every item independently. Per-item failures land in
    /// `unmatched`; only an empty batch is an error.
    pub fn run_items(&self, items: &[Value]) -> Result<BatchResult, CompensationError> {
        if items.is_empty() {
            return Err(CompensationError::InvalidBatch(
                "batch must contain at least one item".into(),
            ));
        }

        let mut processed = Vec::new();
        let mut unmatched = Vec::new();
        let mut totals = Totals::default();

        for (index, raw) in items.iter().enumerate() {
            // Validation failures never reach the resolver.
            let outcome = validate(raw)
                .and_then(|item| self.resolver.resolve(index, &item))
                .and_then(|m| totals.add(&m).map(|()| m));

            match outcome {
                Ok(m) => {
                    log::debug!(
                        "item {index}: {} {} x {} = {}",
                        m.mode(),
                        m.municipality,
                        m.unit_rate,
                        m.computed_total
                    );
                    processed.push(m);
                }
                Err(issue) => {
                    log::debug!("item {index}: unmatched ({})", issue.reason());
                    unmatched.push(issue.into_unmatched(index, raw));
                }
            }
        }

        let summary = compute_summary(items.len(), &processed, &unmatched, &totals);
        log::info!(
            "batch of {}: {} processed, {} unmatched, total {}",
            summary.items,
            summary.processed,
            summary.unmatched,
            totals.total
        );

        Ok(BatchResult {
            processed,
            total: totals.total,
            unmatched,
            summary,
        })
    }
}

/// Extract the item list from a request payload.
pub fn request_items(payload: &Value) -> Result<&[Value], CompensationError> {
    let list = match payload {
        Value::Array(items) => Some(items),
        Value::Object(obj) => ENVELOPE_KEYS
            .iter()
            .find_map(|key| obj.get(*key))
            .and_then(Value::as_array),
        _ => None,
    };
    match list {
        Some(items) if !items.is_empty() => Ok(items),
        Some(_) => Err(CompensationError::InvalidBatch(
            "batch must contain at least one item".into(),
        )),
        None => Err(CompensationError::InvalidBatch(
            "expected a list under \"items\"".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Amount, IssueKind, Rule};
    use crate::store::MemoryRuleStore;
    use serde_json::json;

    fn store() -> MemoryRuleStore {
        MemoryRuleStore::new(
            vec![Rule {
                municipality: "Springfield".into(),
                group: Some("urban".into()),
                rate: 5,
            }],
            vec![Rule {
                municipality: "Springfield".into(),
                group: None,
                rate: 2.0,
            }],
        )
    }

    #[test]
    fn mixed_batch_partitions_items() {
        let s = store();
        let runner = BatchRunner::new(&s, UngroupedPolicy::FirstLoaded);
        let result = runner
            .run_batch(&json!([
                {"municipality": "Springfield", "group": "urban", "quantity": 10},
                {"municipality": "Unknown City", "quantity": 3},
                {"municipality": "Springfield", "area": 12.5},
                {"municipality": "Springfield", "quantity": "abc"},
            ]))
            .unwrap();

        let processed: Vec<usize> = result.processed.iter().map(|m| m.index).collect();
        let unmatched: Vec<usize> = result.unmatched.iter().map(|u| u.index).collect();
        assert_eq!(processed, vec![0, 2]);
        assert_eq!(unmatched, vec![1, 3]);

        assert_eq!(result.processed[0].computed_total, Amount::Integer(50));
        assert_eq!(result.processed[1].computed_total, Amount::Float(25.0));
        assert_eq!(result.total, Amount::Float(75.0));

        assert_eq!(result.unmatched[0].kind, IssueKind::NoRuleFound);
        assert_eq!(result.unmatched[0].reason, "no rule found");
        assert_eq!(result.unmatched[1].kind, IssueKind::TypeError);

        assert_eq!(result.summary.tree_total, 50);
        assert_eq!(result.summary.area_total, 25.0);
    }

    #[test]
    fn count_only_total_stays_integer() {
        let s = store();
        let runner = BatchRunner::new(&s, UngroupedPolicy::FirstLoaded);
        let result = runner
            .run_batch(&json!([
                {"municipality": "Springfield", "group": "urban", "quantity": 10},
                {"municipality": "Springfield", "group": "urban", "quantity": "2"},
            ]))
            .unwrap();
        assert_eq!(result.total, Amount::Integer(60));
        assert_eq!(serde_json::to_value(&result).unwrap()["total"], json!(60));
    }

    #[test]
    fn area_item_group_is_ignored_by_ungrouped_patch_table() {
        let s = store();
        let runner = BatchRunner::new(&s, UngroupedPolicy::RejectAmbiguous);
        let result = runner
            .run_batch(&json!([
                {"municipality": "Springfield", "area": 12.5},
                {"municipality": "Springfield", "group": "urban", "area": 12.5},
            ]))
            .unwrap();
        assert!(result.unmatched.is_empty(), "{:?}", result.unmatched);
        assert_eq!(result.processed[1].group.as_deref(), Some("urban"));
        assert_eq!(result.processed[1].computed_total, Amount::Float(25.0));
        assert_eq!(result.total, Amount::Float(50.0));
    }

    #[test]
    fn padded_names_are_trimmed_but_case_is_exact() {
        let s = store();
        let runner = BatchRunner::new(&s, UngroupedPolicy::FirstLoaded);
        let result = runner
            .run_batch(&json!([
                {"municipality": " Springfield ", "group": "urban\t", "quantity": 2},
                {"municipality": "springfield", "group": "urban", "quantity": 2},
            ]))
            .unwrap();
        assert_eq!(result.processed.len(), 1);
        assert_eq!(result.processed[0].municipality, "Springfield");
        assert_eq!(result.processed[0].group.as_deref(), Some("urban"));
        assert_eq!(result.unmatched[0].index, 1);
        assert_eq!(result.unmatched[0].kind, IssueKind::NoRuleFound);
    }

    #[test]
    fn empty_or_non_list_is_invalid() {
        let s = store();
        let runner = BatchRunner::new(&s, UngroupedPolicy::FirstLoaded);
        for raw in [json!([]), json!({"municipality": "Springfield"}), json!(null), json!("items")] {
            let err = runner.run_batch(&raw).unwrap_err();
            assert!(matches!(err, CompensationError::InvalidBatch(_)), "{raw}");
        }
    }

    #[test]
    fn request_envelope() {
        let s = store();
        let runner = BatchRunner::new(&s, UngroupedPolicy::FirstLoaded);

        let result = runner
            .run_request(&json!({"items": [{"municipality": "Springfield", "area_m2": 1}]}))
            .unwrap();
        assert_eq!(result.total, Amount::Float(2.0));

        let result = runner
            .run_request(&json!({"patches": [{"municipality": "Springfield", "area_m2": 3}]}))
            .unwrap();
        assert_eq!(result.total, Amount::Float(6.0));

        for payload in [json!({}), json!({"items": []}), json!({"items": "x"}), json!(7)] {
            assert!(runner.run_request(&payload).is_err(), "{payload}");
        }
    }

    #[test]
    fn total_overflow_moves_item_to_unmatched() {
        let s = MemoryRuleStore::new(
            vec![Rule {
                municipality: "Springfield".into(),
                group: None,
                rate: i64::MAX / 2 + 1,
            }],
            Vec::new(),
        );
        let runner = BatchRunner::new(&s, UngroupedPolicy::FirstLoaded);
        let result = runner
            .run_batch(&json!([
                {"municipality": "Springfield", "quantity": 1},
                {"municipality": "Springfield", "quantity": 1},
            ]))
            .unwrap();
        assert_eq!(result.processed.len(), 1);
        assert_eq!(result.unmatched[0].index, 1);
        assert_eq!(result.unmatched[0].kind, IssueKind::Overflow);
        assert_eq!(result.total, Amount::Integer(i64::MAX / 2 + 1));
    }
}
