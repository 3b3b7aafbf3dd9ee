use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// A compensation rule: `(municipality, group?) -> rate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule<R> {
    pub municipality: String,
    pub group: Option<String>,
    pub rate: R,
}

/// Per-tree rule. Rates are whole currency units per tree.
pub type TreeRule = Rule<i64>;

/// Per-area rule. Rates are currency units per square metre.
pub type PatchRule = Rule<f64>;

/// Which rule table an item is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Count-based compensation (isolated trees).
    Trees,
    /// Area-based compensation (vegetation patches).
    Patches,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trees => write!(f, "trees"),
            Self::Patches => write!(f, "patches"),
        }
    }
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// A line item after validation. The variant is picked by which numeric
/// field the raw record carried.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedItem {
    Count {
        municipality: String,
        group: Option<String>,
        quantity: i64,
    },
    Area {
        municipality: String,
        group: Option<String>,
        area: f64,
    },
}

impl ValidatedItem {
    pub fn municipality(&self) -> &str {
        match self {
            Self::Count { municipality, .. } | Self::Area { municipality, .. } => municipality,
        }
    }

    pub fn group(&self) -> Option<&str> {
        match self {
            Self::Count { group, .. } | Self::Area { group, .. } => group.as_deref(),
        }
    }

    /// The lookup keys this item is resolved with.
    pub fn filters(&self) -> Filters {
        Filters {
            municipality: self.municipality().to_string(),
            group: self.group().map(str::to_string),
        }
    }
}

/// Lookup keys attempted against the rule store. An absent group
/// serializes as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Filters {
    pub municipality: String,
    pub group: Option<String>,
}

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

/// A compensation amount. Integer while only per-tree rates are involved,
/// float once any per-area amount enters the sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Amount {
    Integer(i64),
    Float(f64),
}

impl Default for Amount {
    fn default() -> Self {
        Self::Integer(0)
    }
}

impl Amount {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Integer(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    /// Sum two amounts. `None` when the integer sum overflows or the float
    /// sum is no longer finite.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.checked_add(b).map(Self::Integer),
            (a, b) => {
                let sum = a.as_f64() + b.as_f64();
                sum.is_finite().then_some(Self::Float(sum))
            }
        }
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// What was measured for a matched item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    Quantity(i64),
    Area(f64),
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub index: usize,
    pub municipality: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(flatten)]
    pub measure: Measure,
    pub unit_rate: Amount,
    pub computed_total: Amount,
}

impl MatchResult {
    pub fn mode(&self) -> Mode {
        match self.measure {
            Measure::Quantity(_) => Mode::Trees,
            Measure::Area(_) => Mode::Patches,
        }
    }

    pub fn filters(&self) -> Filters {
        Filters {
            municipality: self.municipality.clone(),
            group: self.group.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingField,
    TypeError,
    ConflictingFields,
    NoRuleFound,
    AmbiguousRule,
    Overflow,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField => write!(f, "missing_field"),
            Self::TypeError => write!(f, "type_error"),
            Self::ConflictingFields => write!(f, "conflicting_fields"),
            Self::NoRuleFound => write!(f, "no_rule_found"),
            Self::AmbiguousRule => write!(f, "ambiguous_rule"),
            Self::Overflow => write!(f, "overflow"),
        }
    }
}

/// Why a single line item ended up unmatched.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemIssue {
    /// Required keys absent, null, or empty.
    MissingField { fields: Vec<&'static str> },
    /// A field could not be coerced to its expected type.
    TypeError { field: String, expected: &'static str },
    /// Both a quantity and an area were given.
    ConflictingFields { fields: Vec<String> },
    NoRuleFound { filters: Filters },
    /// Group omitted while several rules exist for the municipality.
    AmbiguousRule {
        filters: Filters,
        candidates: Vec<Option<String>>,
    },
    /// The item total, or the batch total with it, is out of range.
    Overflow { filters: Filters },
}

impl ItemIssue {
    pub fn kind(&self) -> IssueKind {
        match self {
            Self::MissingField { .. } => IssueKind::MissingField,
            Self::TypeError { .. } => IssueKind::TypeError,
            Self::ConflictingFields { .. } => IssueKind::ConflictingFields,
            Self::NoRuleFound { .. } => IssueKind::NoRuleFound,
            Self::AmbiguousRule { .. } => IssueKind::AmbiguousRule,
            Self::Overflow { .. } => IssueKind::Overflow,
        }
    }

    pub fn reason(&self) -> String {
        match self {
            Self::MissingField { fields } => {
                format!("missing required field(s): {}", fields.join(", "))
            }
            Self::TypeError { field, expected } => format!("{field} must be {expected}"),
            Self::ConflictingFields { fields } => {
                format!("item has conflicting fields: {}", fields.join(", "))
            }
            Self::NoRuleFound { .. } => "no rule found".to_string(),
            Self::AmbiguousRule { candidates, .. } => format!(
                "ambiguous rule: {} rules for municipality, group required",
                candidates.len()
            ),
            Self::Overflow { .. } => "compensation total out of range".to_string(),
        }
    }

    /// Lookup keys attempted, for issues raised after validation.
    pub fn filters(&self) -> Option<&Filters> {
        match self {
            Self::NoRuleFound { filters }
            | Self::AmbiguousRule { filters, .. }
            | Self::Overflow { filters } => Some(filters),
            _ => None,
        }
    }

    pub fn into_unmatched(self, index: usize, item: &Value) -> UnmatchedResult {
        let candidates = match &self {
            Self::AmbiguousRule { candidates, .. } => candidates.clone(),
            _ => Vec::new(),
        };
        UnmatchedResult {
            index,
            kind: self.kind(),
            reason: self.reason(),
            filters: self.filters().cloned(),
            candidates,
            item: item.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedResult {
    pub index: usize,
    pub kind: IssueKind,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Filters>,
    /// Groups available for the municipality when the lookup was ambiguous.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Option<String>>,
    pub item: Value,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub items: usize,
    pub processed: usize,
    pub unmatched: usize,
    pub tree_total: i64,
    pub area_total: f64,
    pub kind_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    pub processed: Vec<MatchResult>,
    pub total: Amount,
    pub unmatched: Vec<UnmatchedResult>,
    pub summary: BatchSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_stays_integer_until_float_enters() {
        let sum = Amount::Integer(50).checked_add(Amount::Integer(15)).unwrap();
        assert_eq!(sum, Amount::Integer(65));

        let sum = sum.checked_add(Amount::Float(25.0)).unwrap();
        assert_eq!(sum, Amount::Float(90.0));
    }

    #[test]
    fn amount_overflow_is_detected() {
        assert!(Amount::Integer(i64::MAX).checked_add(Amount::Integer(1)).is_none());
        assert!(Amount::Float(f64::MAX).checked_add(Amount::Float(f64::MAX)).is_none());
    }

    #[test]
    fn match_result_serializes_measure_inline() {
        let m = MatchResult {
            index: 2,
            municipality: "Springfield".into(),
            group: None,
            measure: Measure::Area(12.5),
            unit_rate: Amount::Float(2.0),
            computed_total: Amount::Float(25.0),
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["area"], 12.5);
        assert_eq!(json["computed_total"], 25.0);
        assert!(json.get("group").is_none());
        assert_eq!(m.mode(), Mode::Patches);
    }

    #[test]
    fn unmatched_keeps_null_group_in_filters() {
        let issue = ItemIssue::NoRuleFound {
            filters: Filters {
                municipality: "Unknown City".into(),
                group: None,
            },
        };
        let item = serde_json::json!({"municipality": "Unknown City", "quantity": 3});
        let unmatched = issue.into_unmatched(1, &item);
        let json = serde_json::to_value(&unmatched).unwrap();
        assert_eq!(json["kind"], "no_rule_found");
        assert_eq!(json["reason"], "no rule found");
        assert_eq!(json["filters"]["municipality"], "Unknown City");
        assert!(json["filters"]["group"].is_null());
        assert!(json.get("candidates").is_none());
        assert_eq!(json["item"], item);
    }
}
