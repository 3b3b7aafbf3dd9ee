use serde_json::{Map, Value};

use crate::model::{ItemIssue, ValidatedItem};

/// Keys accepted for the tree count, in lookup order.
pub const QUANTITY_KEYS: &[&str] = &["quantity", "quantidade"];

/// Keys accepted for the patch area in square metres, in lookup order.
pub const AREA_KEYS: &[&str] = &["area", "area_m2"];

/// Reported when an item carries neither a quantity nor an area.
const MEASURE_FIELD: &str = "quantity or area";

/// Normalize one raw line item into a typed item.
///
/// Count mode is chosen when a quantity key is present, area mode when an
/// area key is present. `null` counts as absent; zero is a valid value.
pub fn validate(raw: &Value) -> Result<ValidatedItem, ItemIssue> {
    let obj = raw.as_object().ok_or_else(|| ItemIssue::TypeError {
        field: "item".into(),
        expected: "an object",
    })?;

    let municipality = text_field(obj, "municipality")?;
    let group = text_field(obj, "group")?;
    let quantity = first_present(obj, QUANTITY_KEYS);
    let area = first_present(obj, AREA_KEYS);

    if let (Some((q_key, _)), Some((a_key, _))) = (quantity, area) {
        return Err(ItemIssue::ConflictingFields {
            fields: vec![q_key.to_string(), a_key.to_string()],
        });
    }

    let mut missing = Vec::new();
    if municipality.is_none() {
        missing.push("municipality");
    }
    if quantity.is_none() && area.is_none() {
        missing.push(MEASURE_FIELD);
    }
    let (Some(municipality), true) = (municipality, missing.is_empty()) else {
        return Err(ItemIssue::MissingField { fields: missing });
    };

    match (quantity, area) {
        (Some((key, value)), None) => Ok(ValidatedItem::Count {
            municipality,
            group,
            quantity: coerce_quantity(key, value)?,
        }),
        (None, Some((key, value))) => Ok(ValidatedItem::Area {
            municipality,
            group,
            area: coerce_area(key, value)?,
        }),
        // Both-present and both-absent were rejected above.
        _ => Err(ItemIssue::MissingField {
            fields: vec![MEASURE_FIELD],
        }),
    }
}

/// First key from `keys` that is present and not null.
fn first_present<'a>(
    obj: &'a Map<String, Value>,
    keys: &[&'static str],
) -> Option<(&'static str, &'a Value)> {
    keys.iter().find_map(|&key| match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => Some((key, value)),
    })
}

/// Optional string field, trimmed. Empty strings count as absent.
fn text_field(obj: &Map<String, Value>, key: &str) -> Result<Option<String>, ItemIssue> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Some(_) => Err(ItemIssue::TypeError {
            field: key.into(),
            expected: "a string",
        }),
    }
}

fn coerce_quantity(key: &str, value: &Value) -> Result<i64, ItemIssue> {
    let bad = || ItemIssue::TypeError {
        field: key.into(),
        expected: "an integer",
    };
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            // Integral floats such as 10.0 are accepted.
            match n.as_f64() {
                Some(f)
                    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 =>
                {
                    Ok(f as i64)
                }
                _ => Err(bad()),
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| bad()),
        _ => Err(bad()),
    }
}

fn coerce_area(key: &str, value: &Value) -> Result<f64, ItemIssue> {
    let area = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match area {
        Some(a) if a.is_finite() && a >= 0.0 => Ok(a),
        _ => Err(ItemIssue::TypeError {
            field: key.into(),
            expected: "a non-negative number",
        }),
    }
}
