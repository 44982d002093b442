//! Plan-time comparison of declared and observed state
//!
//! The lifecycle host decides what to change by comparing the declaration
//! with the state the engine read back. This module implements that
//! comparison with the host's zero-value semantics: for optional attributes,
//! absent, `null`, `""`, `0`, `false`, `{}` and `[]` are all "unset".

use serde_json::{Map, Value};

use crate::schema::{Attribute, AttributeType, Nesting, Schema};

/// One attribute that would change
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeChange {
    /// Attribute name
    pub name: String,
    /// Whether the change forces recreation
    pub requires_replace: bool,
}

/// Attributes whose declared value differs from the observed state
///
/// Computed-only attributes are ignored, as are optional+computed attributes
/// the declaration leaves unset.
pub fn diff(schema: &Schema, declared: &Map<String, Value>, state: &Map<String, Value>) -> Vec<AttributeChange> {
    let mut changes = Vec::new();
    for (name, attr) in schema.iter() {
        if attr.is_computed_only() {
            continue;
        }
        let want = declared
            .get(name)
            .filter(|v| !v.is_null())
            .or(attr.default.as_ref());
        let have = state.get(name);
        if attr.computed && want.map_or(true, is_zero) {
            continue;
        }
        if !values_equal(attr, want, have) {
            changes.push(AttributeChange {
                name: name.to_string(),
                requires_replace: attr.force_new,
            });
        }
    }
    changes
}

/// Whether re-planning the declaration against the state is empty
pub fn is_converged(schema: &Schema, declared: &Map<String, Value>, state: &Map<String, Value>) -> bool {
    diff(schema, declared, state).is_empty()
}

fn values_equal(attr: &Attribute, want: Option<&Value>, have: Option<&Value>) -> bool {
    if attr.json {
        return json_equal(want, have);
    }
    normalize(&attr.ty, want) == normalize(&attr.ty, have)
}

fn json_equal(want: Option<&Value>, have: Option<&Value>) -> bool {
    let parse = |v: Option<&Value>| -> Value {
        match v.and_then(Value::as_str) {
            Some(s) if !s.trim().is_empty() => {
                serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string()))
            }
            _ => Value::Null,
        }
    };
    strip_zero(&parse(want)) == strip_zero(&parse(have))
}

/// Whether a value is the zero value of its type
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

fn strip_zero(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), strip_zero(v)))
                .filter(|(_, v)| !is_zero(v))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_zero).collect()),
        other => other.clone(),
    }
}

fn normalize(ty: &AttributeType, value: Option<&Value>) -> Value {
    let Some(value) = value else {
        return Value::Null;
    };
    let normalized = match (ty, value) {
        (AttributeType::Float | AttributeType::Int, Value::Number(n)) => {
            n.as_f64().map(Value::from).unwrap_or(Value::Null)
        }
        (AttributeType::Map, Value::Object(map)) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        (AttributeType::List(elem), Value::Array(items)) => {
            Value::Array(items.iter().map(|v| normalize(elem, Some(v))).collect())
        }
        (AttributeType::Set(elem), Value::Array(items)) => {
            let mut items: Vec<Value> = items.iter().map(|v| normalize(elem, Some(v))).collect();
            items.sort_by_key(|v| v.to_string());
            items.dedup();
            Value::Array(items)
        }
        (AttributeType::Block { nesting, schema }, value) => normalize_block(*nesting, schema, value),
        (_, other) => other.clone(),
    };
    if is_zero(&normalized) {
        Value::Null
    } else {
        normalized
    }
}

fn normalize_block(nesting: Nesting, schema: &Schema, value: &Value) -> Value {
    let one = |v: &Value| -> Value {
        match v {
            Value::Object(map) => {
                let mut out = Map::new();
                for (name, attr) in schema.iter() {
                    if attr.is_computed_only() {
                        continue;
                    }
                    let n = normalize(&attr.ty, map.get(name).or(attr.default.as_ref()));
                    if !n.is_null() {
                        out.insert(name.to_string(), n);
                    }
                }
                Value::Object(out)
            }
            _ => Value::Null,
        }
    };
    match (nesting, value) {
        (_, Value::Null) => Value::Null,
        (Nesting::Single, Value::Array(items)) => items.first().map(one).unwrap_or(Value::Null),
        (Nesting::Single, v) => one(v),
        (Nesting::List, Value::Array(items)) => Value::Array(items.iter().map(one).collect()),
        (Nesting::Set, Value::Array(items)) => {
            let mut items: Vec<Value> = items.iter().map(one).collect();
            items.sort_by_key(|v| v.to_string());
            Value::Array(items)
        }
        (_, v) => Value::Array(vec![one(v)]),
    }
}
