//! Key translation between declarative and wire shapes
//!
//! Declared state uses snake_case keys (`connect_timeout_ms`); the remote API
//! expects PascalCase (`ConnectTimeoutMs`). Tokens in [`UPPERCASE_TOKENS`]
//! are emitted fully capitalized (`tls_min_version` -> `TLSMinVersion`).
//!
//! There is no inverse formatter. Reads go the other way by matching each
//! schema attribute against the wire keys case-insensitively (see
//! [`to_state`]), which also covers wire names whose acronyms the formatter
//! does not know about (`JSONWebKeySet`).

use serde_json::{Map, Value};

use crate::schema::{AttributeType, Nesting, Schema};

/// Tokens emitted fully capitalized instead of title-cased
pub const UPPERCASE_TOKENS: &[&str] = &["tls", "ttl"];

/// Convert a snake_case declarative key to its wire form
pub fn format_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for token in key.split('_').filter(|t| !t.is_empty()) {
        let lower = token.to_ascii_lowercase();
        if UPPERCASE_TOKENS.contains(&lower.as_str()) {
            out.push_str(&lower.to_ascii_uppercase());
            continue;
        }
        let mut chars = lower.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Recursively format every mapping key of a schema-less value
///
/// Mappings are formatted key-by-key and entries whose value is absent are
/// dropped; sequences recurse element-wise. `null` is absent.
pub fn format_value(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => Some(Value::Object(
            map.iter()
                .filter_map(|(k, v)| format_value(v).map(|v| (format_key(k), v)))
                .collect(),
        )),
        Value::Array(items) => Some(Value::Array(
            items.iter().filter_map(format_value).collect(),
        )),
        scalar => Some(scalar.clone()),
    }
}

/// Convert a declared value to its wire form using the attribute type
///
/// Same rules as [`format_value`], except map-of-string values keep their
/// keys verbatim and single blocks declared as a list follow the optional
/// block rule: an empty list is absent, otherwise the first element is used.
pub fn to_wire(ty: &AttributeType, value: &Value) -> Option<Value> {
    match (ty, value) {
        (_, Value::Null) => None,
        (AttributeType::List(elem) | AttributeType::Set(elem), Value::Array(items)) => Some(
            Value::Array(items.iter().filter_map(|v| to_wire(elem, v)).collect()),
        ),
        (AttributeType::Block { nesting, schema }, value) => match (nesting, value) {
            (Nesting::Single, Value::Array(items)) => {
                items.first().and_then(|first| block_to_wire(schema, first))
            }
            (Nesting::Single, obj) => block_to_wire(schema, obj),
            (_, Value::Array(items)) => Some(Value::Array(
                items.iter().filter_map(|v| block_to_wire(schema, v)).collect(),
            )),
            (_, obj) => block_to_wire(schema, obj).map(|v| Value::Array(vec![v])),
        },
        (_, scalar) => Some(scalar.clone()),
    }
}

/// Convert a declared block object to its wire form
///
/// Keys the schema does not declare are formatted without type information.
pub fn block_to_wire(schema: &Schema, value: &Value) -> Option<Value> {
    let Value::Object(map) = value else {
        return format_value(value);
    };
    let mut out = Map::new();
    for (key, v) in map {
        let converted = match schema.get(key) {
            Some(attr) => to_wire(&attr.ty, v),
            None => format_value(v),
        };
        if let Some(converted) = converted {
            out.insert(format_key(key), converted);
        }
    }
    Some(Value::Object(out))
}

/// Normalized form used to match attribute names against wire keys
fn match_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Find the wire value for a declarative attribute name
///
/// Matching ignores case and underscores, so `tls_min_version` finds
/// `TLSMinVersion` and `json_web_key_set` finds `JSONWebKeySet`.
pub fn lookup<'a>(wire: &'a Map<String, Value>, attribute: &str) -> Option<&'a Value> {
    let wanted = match_key(attribute);
    wire.get(&format_key(attribute))
        .or_else(|| {
            wire.iter()
                .find(|(k, _)| match_key(k) == wanted)
                .map(|(_, v)| v)
        })
        .filter(|v| !v.is_null())
}

/// Convert an observed wire value to its state form using the attribute type
pub fn to_state(ty: &AttributeType, value: &Value) -> Value {
    match (ty, value) {
        (_, Value::Null) => Value::Null,
        (AttributeType::String | AttributeType::Duration, Value::String(_)) => value.clone(),
        (AttributeType::String | AttributeType::Duration, other) => {
            Value::String(other.to_string())
        }
        (AttributeType::Map, Value::Object(map)) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| {
                    let s = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), Value::String(s))
                })
                .collect(),
        ),
        (AttributeType::List(elem) | AttributeType::Set(elem), Value::Array(items)) => {
            Value::Array(items.iter().map(|v| to_state(elem, v)).collect())
        }
        (AttributeType::Block { nesting, schema }, value) => match (nesting, value) {
            (Nesting::Single, Value::Array(items)) => items
                .first()
                .map(|v| block_to_state(schema, v))
                .unwrap_or(Value::Null),
            (Nesting::Single, obj) => block_to_state(schema, obj),
            (_, Value::Array(items)) => {
                Value::Array(items.iter().map(|v| block_to_state(schema, v)).collect())
            }
            (_, obj) => Value::Array(vec![block_to_state(schema, obj)]),
        },
        (_, other) => other.clone(),
    }
}

/// Convert an observed wire object to a state block following the schema
///
/// Attributes missing on the wire are left out of the block.
pub fn block_to_state(schema: &Schema, value: &Value) -> Value {
    let Value::Object(wire) = value else {
        return Value::Null;
    };
    let mut out = Map::new();
    for (name, attr) in schema.iter() {
        if let Some(v) = lookup(wire, name) {
            out.insert(name.to_string(), to_state(&attr.ty, v));
        }
    }
    Value::Object(out)
}
