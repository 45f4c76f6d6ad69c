//! Coercion of string parameter values to the types their schema declares.
//!
//! Query, header, path and cookie values always arrive as strings. Before
//! validation they are converted in place where the schema asks for
//! `integer`, `number`, `boolean` or `null`; arrays are converted element by
//! element. Values that do not convert are left as they are so the evaluator
//! reports the mismatch.

use crate::spec::ContractDocument;
use serde_json::{Map, Number, Value};

fn declared_types(schema: &Value) -> Vec<&str> {
    match schema.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn convert_scalar(raw: &str, types: &[&str]) -> Option<Value> {
    if types.contains(&"string") {
        return None;
    }
    for t in types {
        let converted = match *t {
            "integer" => raw.parse::<i64>().ok().map(Value::from),
            "number" => raw
                .parse::<i64>()
                .ok()
                .map(Value::from)
                .or_else(|| {
                    raw.parse::<f64>()
                        .ok()
                        .and_then(Number::from_f64)
                        .map(Value::Number)
                }),
            "boolean" => match raw {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            "null" if raw.is_empty() => Some(Value::Null),
            _ => None,
        };
        if converted.is_some() {
            return converted;
        }
    }
    None
}

/// Coerce `value` in place according to `schema`. A schema that is a single
/// `$ref` is resolved one level; an unresolvable reference leaves the value
/// untouched.
pub fn coerce_value(value: &mut Value, schema: &Value, doc: &ContractDocument) {
    let Ok(schema) = doc.resolve(schema) else {
        return;
    };
    let mut types = declared_types(schema);
    if schema.get("nullable").and_then(Value::as_bool) == Some(true) {
        types.push("null");
    }

    match value {
        Value::String(raw) => {
            if let Some(converted) = convert_scalar(raw, &types) {
                *value = converted;
            }
        }
        Value::Array(items) if types.contains(&"array") => {
            if let Some(item_schema) = schema.get("items") {
                for item in items.iter_mut() {
                    coerce_value(item, item_schema, doc);
                }
            }
        }
        _ => {}
    }
}

/// Coerce the declared entries of one parameter location
pub fn coerce_location(values: &mut Map<String, Value>, properties: &Map<String, Value>, doc: &ContractDocument) {
    for (name, schema) in properties {
        if let Some(value) = values.get_mut(name) {
            coerce_value(value, schema, doc);
        }
    }
}
