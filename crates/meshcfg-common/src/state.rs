//! Host state access for one resource
//!
//! [`ResourceData`] is the lifecycle host's state for a single resource: its
//! ID, the prior state (on update) and the current values. Handlers read
//! declared values through the typed getters and write observed values back
//! through a [`StateWriter`], which type-checks every assignment against the
//! resource schema and keeps the first failure.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::schema::Schema;

/// State of one resource as exchanged with the lifecycle host
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceData {
    id: Option<String>,
    prior: Map<String, Value>,
    values: Map<String, Value>,
}

impl ResourceData {
    /// State with the given values and no ID
    pub fn new(values: Map<String, Value>) -> Self {
        Self {
            values,
            ..Default::default()
        }
    }

    /// State from a JSON object; anything else yields empty values
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::new(map),
            _ => Self::default(),
        }
    }

    /// Set the prior state used by [`get_change`](Self::get_change)
    pub fn with_prior(mut self, prior: Map<String, Value>) -> Self {
        self.prior = prior;
        self
    }

    /// Set the ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The resource ID, if the resource exists
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// The resource ID or an empty string
    pub fn id_or_empty(&self) -> &str {
        self.id().unwrap_or_default()
    }

    /// Record the resource ID
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Forget the resource; the host treats it as gone
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    /// All current values
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Consume into the current values
    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }

    /// Prior values
    pub fn prior(&self) -> &Map<String, Value> {
        &self.prior
    }

    /// Raw value of an attribute; `null` reads as absent
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    /// String attribute, absent when unset or empty
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// String attribute or empty string
    pub fn get_string(&self, key: &str) -> String {
        self.get_str(key).unwrap_or_default().to_string()
    }

    /// Boolean attribute, `false` when unset
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Boolean attribute, `None` when unset
    pub fn get_opt_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Integer attribute, `None` when unset
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    /// Number attribute, `None` when unset
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    /// Map-of-string attribute, empty when unset
    pub fn get_map(&self, key: &str) -> BTreeMap<String, String> {
        self.get(key).map(value_to_string_map).unwrap_or_default()
    }

    /// List or set of strings, empty when unset
    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get(key).map(value_to_string_list).unwrap_or_default()
    }

    /// Single nested block
    ///
    /// Accepts the object form and the one-element list form.
    pub fn get_block(&self, key: &str) -> Option<&Map<String, Value>> {
        match self.get(key)? {
            Value::Object(map) => Some(map),
            Value::Array(items) => items.first().and_then(Value::as_object),
            _ => None,
        }
    }

    /// Repeated nested blocks, empty when unset
    pub fn get_blocks(&self, key: &str) -> Vec<&Map<String, Value>> {
        match self.get(key) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
            Some(Value::Object(map)) => vec![map],
            _ => Vec::new(),
        }
    }

    /// Prior and current value of an attribute
    pub fn get_change(&self, key: &str) -> (Option<&Value>, Option<&Value>) {
        (
            self.prior.get(key).filter(|v| !v.is_null()),
            self.get(key),
        )
    }

    /// Whether an attribute differs from the prior state
    pub fn has_change(&self, key: &str) -> bool {
        let (old, new) = self.get_change(key);
        old != new
    }

    /// Assign a value without schema checks
    ///
    /// Prefer [`StateWriter`] in handlers; this is for hosts and tests.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Start a schema-checked writer over this state
    pub fn writer<'a>(&'a mut self, schema: &'a Schema) -> StateWriter<'a> {
        StateWriter::new(self, schema)
    }
}

/// String map from a JSON object; non-string values are stringified
pub fn value_to_string_map(value: &Value) -> BTreeMap<String, String> {
    match value {
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), scalar_to_string(v)))
            .collect(),
        _ => BTreeMap::new(),
    }
}

/// String list from a JSON array; non-string values are stringified
pub fn value_to_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter(|v| !v.is_null())
            .map(scalar_to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Accumulates state assignments and keeps the first error
///
/// Handlers set dozens of attributes when copying observed state back;
/// checking each result individually would bury the logic. The writer keeps
/// going after a failure so the state is as complete as possible, and
/// [`error`](Self::error) reports the first failure at the end.
pub struct StateWriter<'a> {
    data: &'a mut ResourceData,
    schema: &'a Schema,
    error: Option<Error>,
}

impl<'a> StateWriter<'a> {
    /// Create a writer over the given state
    pub fn new(data: &'a mut ResourceData, schema: &'a Schema) -> Self {
        Self {
            data,
            schema,
            error: None,
        }
    }

    /// Assign a value to an attribute
    ///
    /// Fails (and records the failure) when the attribute is not in the
    /// schema, the value does not serialize, or it does not conform to the
    /// attribute type.
    pub fn set<T: Serialize + ?Sized>(&mut self, field: &str, value: &T) -> &mut Self {
        if let Err(e) = self.try_set(field, value) {
            self.record(e);
        }
        self
    }

    fn try_set<T: Serialize + ?Sized>(&mut self, field: &str, value: &T) -> Result<(), Error> {
        let attr = self
            .schema
            .get(field)
            .ok_or_else(|| Error::state(field, "attribute is not part of the schema"))?;
        let value = serde_json::to_value(value).map_err(|e| Error::state(field, e.to_string()))?;
        attr.ty
            .check(&value)
            .map_err(|e| Error::state(field, e))?;
        self.data.values.insert(field.to_string(), value);
        Ok(())
    }

    /// Record an error raised outside of `set`
    ///
    /// Only the first error is kept.
    pub fn record(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Record the ID alongside the attributes
    pub fn set_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.data.set_id(id);
        self
    }

    /// Read access to the state being written
    pub fn data(&self) -> &ResourceData {
        self.data
    }

    /// The schema assignments are checked against
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// The first recorded error, if any
    pub fn error(self) -> Option<Error> {
        self.error
    }

    /// The first recorded error as a `Result`
    pub fn finish(self) -> Result<(), Error> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeType};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new()
            .attr("name", Attribute::required(AttributeType::String))
            .attr("port", Attribute::optional(AttributeType::Int))
            .attr("tags", Attribute::optional(AttributeType::string_set()))
            .attr("meta", Attribute::optional(AttributeType::Map))
    }

    #[test]
    fn writer_sets_values_and_reports_nothing() {
        let schema = schema();
        let mut data = ResourceData::default();
        let mut w = data.writer(&schema);
        w.set("name", "web").set("port", &8080).set("tags", &["a", "b"]);
        assert!(w.error().is_none());

        assert_eq!(data.get_str("name"), Some("web"));
        assert_eq!(data.get_i64("port"), Some(8080));
        assert_eq!(data.get_string_list("tags"), vec!["a", "b"]);
    }

    #[test]
    fn writer_keeps_first_error_and_continues() {
        let schema = schema();
        let mut data = ResourceData::default();
        let mut w = data.writer(&schema);
        w.set("nope", "x");
        w.set("port", "not a number");
        w.set("name", "still-written");

        match w.error() {
            Some(Error::State { field, message }) => {
                assert_eq!(field, "nope");
                assert!(message.contains("not part of the schema"));
            }
            other => panic!("expected State error for first failure, got {other:?}"),
        }
        assert_eq!(data.get_str("name"), Some("still-written"));
        assert!(data.get("port").is_none());
    }

    #[test]
    fn recorded_errors_do_not_replace_earlier_ones() {
        let schema = schema();
        let mut data = ResourceData::default();
        let mut w = data.writer(&schema);
        w.set("port", &true);
        w.record(Error::decode("later"));
        assert!(matches!(w.finish(), Err(Error::State { .. })));
    }

    #[test]
    fn getters_treat_null_and_empty_as_absent() {
        let data = ResourceData::from_value(json!({
            "name": "",
            "port": null,
            "meta": {"a": "1", "b": 2},
            "block": [{"x": 1}],
            "blocks": [{"x": 1}, {"x": 2}]
        }));
        assert_eq!(data.get_str("name"), None);
        assert_eq!(data.get_i64("port"), None);
        assert_eq!(data.get_map("meta").get("b").map(String::as_str), Some("2"));
        assert_eq!(data.get_block("block").and_then(|b| b.get("x")), Some(&json!(1)));
        assert_eq!(data.get_blocks("blocks").len(), 2);
        assert!(data.get_blocks("missing").is_empty());
    }

    #[test]
    fn changes_compare_prior_and_current() {
        let prior = json!({"a": "1", "b": "2"});
        let data = ResourceData::from_value(json!({"a": "1", "b": "3", "c": null}))
            .with_prior(prior.as_object().unwrap().clone());
        assert!(!data.has_change("a"));
        assert!(data.has_change("b"));
        assert!(!data.has_change("c"));
        assert_eq!(data.get_change("b"), (Some(&json!("2")), Some(&json!("3"))));
    }

    #[test]
    fn empty_id_is_no_id() {
        let mut data = ResourceData::default().with_id("");
        assert_eq!(data.id(), None);
        data.set_id("x");
        assert_eq!(data.id(), Some("x"));
        data.clear_id();
        assert_eq!(data.id(), None);
    }
}
