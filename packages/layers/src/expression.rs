//! Minimal evaluator for `MapLibre` style expressions.
//!
//! Covers the subset used by risk layer filters: `get`, `literal`,
//! comparisons, `all`, `any` and `!`. Unsupported expressions evaluate
//! to `null`, which a filter treats as "no match".

use std::cmp::Ordering;

use serde_json::{Map, Value};

/// Evaluates `expr` against a feature's properties.
#[must_use]
pub fn evaluate(expr: &Value, properties: &Map<String, Value>) -> Value {
    let Value::Array(items) = expr else {
        return expr.clone();
    };
    let Some((Value::String(op), args)) = items.split_first() else {
        return Value::Null;
    };

    match (op.as_str(), args) {
        ("get", [Value::String(key)]) => properties.get(key).cloned().unwrap_or(Value::Null),
        ("literal", [value]) => value.clone(),
        ("!", [inner]) => Value::Bool(!is_truthy(&evaluate(inner, properties))),
        ("all", rest) => Value::Bool(rest.iter().all(|e| is_truthy(&evaluate(e, properties)))),
        ("any", rest) => Value::Bool(rest.iter().any(|e| is_truthy(&evaluate(e, properties)))),
        ("==" | "!=" | "<" | "<=" | ">" | ">=", [lhs, rhs]) => {
            let lhs = evaluate(lhs, properties);
            let rhs = evaluate(rhs, properties);
            compare(op, &lhs, &rhs)
        }
        _ => Value::Null,
    }
}

/// Whether a feature passes a layer filter. No filter passes everything.
#[must_use]
pub fn matches_filter(filter: Option<&Value>, properties: &Map<String, Value>) -> bool {
    filter.is_none_or(|f| is_truthy(&evaluate(f, properties)))
}

const fn is_truthy(value: &Value) -> bool {
    matches!(value, Value::Bool(true))
}

fn compare(op: &str, lhs: &Value, rhs: &Value) -> Value {
    let ordering = match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) if matches!(op, "==" | "!=") => Some(a.cmp(b)),
        _ => None,
    };

    let Some(ordering) = ordering else {
        // Mismatched or missing operands never satisfy a comparison,
        // except inequality.
        return Value::Bool(op == "!=");
    };

    Value::Bool(match op {
        "==" => ordering == Ordering::Equal,
        "!=" => ordering != Ordering::Equal,
        "<" => ordering == Ordering::Less,
        "<=" => ordering != Ordering::Greater,
        ">" => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn threshold_filter() {
        let filter = json!([">=", ["get", "risk"], 0.75]);
        assert!(matches_filter(Some(&filter), &props(json!({ "risk": 0.75 }))));
        assert!(matches_filter(Some(&filter), &props(json!({ "risk": 0.9 }))));
        assert!(!matches_filter(Some(&filter), &props(json!({ "risk": 0.7499 }))));
    }

    #[test]
    fn missing_property_fails_comparison() {
        let filter = json!([">=", ["get", "risk"], 0.5]);
        assert!(!matches_filter(Some(&filter), &props(json!({}))));
        assert!(!matches_filter(Some(&filter), &props(json!({ "risk": "0.9" }))));
    }

    #[test]
    fn combinators() {
        let filter = json!([
            "all",
            [">", ["get", "risk"], 0.2],
            ["!", ["==", ["get", "aoiId"], "ist"]]
        ]);
        let izmir = props(json!({ "risk": 0.5, "aoiId": "izmir" }));
        let ist = props(json!({ "risk": 0.5, "aoiId": "ist" }));
        assert!(matches_filter(Some(&filter), &izmir));
        assert!(!matches_filter(Some(&filter), &ist));

        let any = json!(["any", ["<", ["get", "risk"], 0.1], ["literal", true]]);
        assert!(matches_filter(Some(&any), &props(json!({ "risk": 0.5 }))));
    }

    #[test]
    fn no_filter_matches_everything() {
        assert!(matches_filter(None, &props(json!({}))));
    }

    #[test]
    fn get_reads_properties() {
        let cell = props(json!({ "color": "rgba(0,255,0,1)" }));
        let value = evaluate(&json!(["get", "color"]), &cell);
        assert_eq!(value, json!("rgba(0,255,0,1)"));
        assert_eq!(evaluate(&json!(["unknown", 1]), &props(json!({}))), Value::Null);
    }
}
