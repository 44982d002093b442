//! Declarative resource schemas
//!
//! Every resource type declares its shape as a [`Schema`]: a map of attribute
//! names to [`Attribute`]s carrying a semantic type and lifecycle flags
//! (required, optional, computed, force-new, sensitive). Schemas drive the
//! state writer's type checks, the schema-aware key formatter and the plan
//! diff.

use std::collections::BTreeMap;

use serde_json::Value;

/// How a nested block repeats
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Nesting {
    /// At most one instance, stored as a JSON object
    Single,
    /// Ordered instances, stored as a JSON array of objects
    List,
    /// Unordered instances, stored as a JSON array of objects
    Set,
}

/// Semantic type of an attribute
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeType {
    /// UTF-8 string
    String,
    /// 64-bit signed integer
    Int,
    /// Floating point number
    Float,
    /// Boolean
    Bool,
    /// Humanized duration string (`10s`, `200ms`, `1h30m`)
    Duration,
    /// Mapping of string to string
    Map,
    /// Ordered list of the element type
    List(Box<AttributeType>),
    /// Unordered set of the element type
    Set(Box<AttributeType>),
    /// Nested block with its own schema
    Block {
        /// Repetition of the block
        nesting: Nesting,
        /// Schema of one block instance
        schema: Schema,
    },
}

impl AttributeType {
    /// List of strings
    pub fn string_list() -> Self {
        Self::List(Box::new(Self::String))
    }

    /// Set of strings
    pub fn string_set() -> Self {
        Self::Set(Box::new(Self::String))
    }

    /// Whether values of this type are unordered
    pub fn is_set(&self) -> bool {
        matches!(
            self,
            Self::Set(_)
                | Self::Block {
                    nesting: Nesting::Set,
                    ..
                }
        )
    }

    /// Check that a JSON value conforms to this type
    ///
    /// `null` conforms to every type. Integers are accepted where floats are
    /// expected, and single blocks also accept a one-element array.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        if value.is_null() {
            return Ok(());
        }
        match self {
            Self::String | Self::Duration => expect(value.is_string(), "string", value),
            Self::Int => expect(value.is_i64() || value.is_u64(), "integer", value),
            Self::Float => expect(value.is_number(), "number", value),
            Self::Bool => expect(value.is_boolean(), "bool", value),
            Self::Map => match value {
                Value::Object(map) => map.iter().try_for_each(|(k, v)| {
                    if v.is_string() || v.is_null() {
                        Ok(())
                    } else {
                        Err(format!("map value for key {k:?} must be a string"))
                    }
                }),
                other => Err(format!("expected map, got {}", type_name(other))),
            },
            Self::List(elem) | Self::Set(elem) => match value {
                Value::Array(items) => items.iter().try_for_each(|item| elem.check(item)),
                other => Err(format!("expected list, got {}", type_name(other))),
            },
            Self::Block { nesting, schema } => match (nesting, value) {
                (Nesting::Single, Value::Object(_)) => schema.check_object(value),
                (Nesting::Single, Value::Array(items)) if items.len() <= 1 => {
                    items.iter().try_for_each(|item| schema.check_object(item))
                }
                (Nesting::List | Nesting::Set, Value::Array(items)) => {
                    items.iter().try_for_each(|item| schema.check_object(item))
                }
                (_, other) => Err(format!("expected block, got {}", type_name(other))),
            },
        }
    }
}

fn expect(ok: bool, wanted: &str, value: &Value) -> Result<(), String> {
    if ok {
        Ok(())
    } else {
        Err(format!("expected {wanted}, got {}", type_name(value)))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// A single attribute of a resource schema
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    /// Semantic type
    pub ty: AttributeType,
    /// Must be declared
    pub required: bool,
    /// May be declared
    pub optional: bool,
    /// Populated by the engine from the remote
    pub computed: bool,
    /// Changing the value forces recreation
    pub force_new: bool,
    /// Never logged or shown in plans
    pub sensitive: bool,
    /// String holding JSON; compared semantically when planning
    pub json: bool,
    /// Value used when the attribute is not declared
    pub default: Option<Value>,
    /// Human-readable description
    pub description: &'static str,
}

impl Attribute {
    fn new(ty: AttributeType) -> Self {
        Self {
            ty,
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            sensitive: false,
            json: false,
            default: None,
            description: "",
        }
    }

    /// An attribute the declaration must provide
    pub fn required(ty: AttributeType) -> Self {
        Self {
            required: true,
            ..Self::new(ty)
        }
    }

    /// An attribute the declaration may provide
    pub fn optional(ty: AttributeType) -> Self {
        Self {
            optional: true,
            ..Self::new(ty)
        }
    }

    /// An attribute only the engine populates
    pub fn computed_only(ty: AttributeType) -> Self {
        Self {
            computed: true,
            ..Self::new(ty)
        }
    }

    /// An optional single nested block
    pub fn block(schema: Schema) -> Self {
        Self::optional(AttributeType::Block {
            nesting: Nesting::Single,
            schema,
        })
    }

    /// An optional list of nested blocks
    pub fn blocks(schema: Schema) -> Self {
        Self::optional(AttributeType::Block {
            nesting: Nesting::List,
            schema,
        })
    }

    /// An optional set of nested blocks
    pub fn block_set(schema: Schema) -> Self {
        Self::optional(AttributeType::Block {
            nesting: Nesting::Set,
            schema,
        })
    }

    /// Mark the attribute as also populated by the engine
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    /// Mark the attribute as forcing recreation when changed
    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Mark the attribute as sensitive
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Mark the attribute as a JSON document held in a string
    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Set the default value
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Set the description
    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Whether only the engine sets this attribute
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

/// Declarative shape of a resource or nested block
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute
    pub fn attr(mut self, name: &str, attribute: Attribute) -> Self {
        self.attributes.insert(name.to_string(), attribute);
        self
    }

    /// Add every attribute of another schema
    pub fn merge(mut self, other: Schema) -> Self {
        self.attributes.extend(other.attributes);
        self
    }

    /// Look up an attribute by name
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Whether the schema declares the attribute
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Iterate attributes in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether the schema has no attributes
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Names of the sensitive attributes
    pub fn sensitive_attributes(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, a)| a.sensitive)
            .map(|(n, _)| n)
            .collect()
    }

    /// Check a JSON object against the schema
    ///
    /// Unknown keys and type mismatches are rejected; missing keys are not.
    pub fn check_object(&self, value: &Value) -> Result<(), String> {
        let Value::Object(map) = value else {
            return Err(format!("expected object, got {}", type_name(value)));
        };
        for (key, v) in map {
            let attr = self
                .get(key)
                .ok_or_else(|| format!("unknown attribute {key:?}"))?;
            attr.ty.check(v).map_err(|e| format!("{key}: {e}"))?;
        }
        Ok(())
    }

    /// Names of required attributes missing from a declaration
    pub fn missing_required(&self, declared: &serde_json::Map<String, Value>) -> Vec<String> {
        self.iter()
            .filter(|(_, a)| a.required)
            .filter(|(n, _)| declared.get(*n).map_or(true, Value::is_null))
            .map(|(n, _)| n.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check_schema() -> Schema {
        Schema::new()
            .attr("name", Attribute::required(AttributeType::String))
            .attr("port", Attribute::optional(AttributeType::Int))
            .attr("weight", Attribute::optional(AttributeType::Float))
            .attr("meta", Attribute::optional(AttributeType::Map))
            .attr("tags", Attribute::optional(AttributeType::string_set()))
            .attr(
                "limits",
                Attribute::block(
                    Schema::new().attr("max_connections", Attribute::optional(AttributeType::Int)),
                ),
            )
    }

    #[test]
    fn conforming_object_passes() {
        let value = json!({
            "name": "web",
            "port": 8080,
            "weight": 50,
            "meta": {"team": "edge"},
            "tags": ["a", "b"],
            "limits": {"max_connections": 10}
        });
        assert_eq!(check_schema().check_object(&value), Ok(()));
    }

    #[test]
    fn null_conforms_to_everything() {
        let value = json!({"name": null, "port": null, "limits": null});
        assert_eq!(check_schema().check_object(&value), Ok(()));
    }

    #[test]
    fn type_mismatches_are_reported_with_path() {
        let err = check_schema()
            .check_object(&json!({"port": "8080"}))
            .unwrap_err();
        assert!(err.starts_with("port:"), "{err}");

        let err = check_schema()
            .check_object(&json!({"limits": {"max_connections": true}}))
            .unwrap_err();
        assert!(err.contains("max_connections"), "{err}");

        let err = check_schema()
            .check_object(&json!({"meta": {"k": 1}}))
            .unwrap_err();
        assert!(err.contains("\"k\""), "{err}");
    }

    #[test]
    fn unknown_attributes_are_rejected() {
        let err = check_schema()
            .check_object(&json!({"nope": 1}))
            .unwrap_err();
        assert!(err.contains("unknown attribute"));
    }

    #[test]
    fn single_block_accepts_one_element_list() {
        let schema = check_schema();
        assert!(schema
            .check_object(&json!({"limits": [{"max_connections": 1}]}))
            .is_ok());
        assert!(schema
            .check_object(&json!({"limits": [{}, {}]}))
            .is_err());
    }

    #[test]
    fn missing_required_lists_names() {
        let declared = json!({"port": 1});
        let missing = check_schema().missing_required(declared.as_object().unwrap());
        assert_eq!(missing, vec!["name".to_string()]);
    }

    #[test]
    fn attribute_flags_compose() {
        let attr = Attribute::optional(AttributeType::String)
            .computed()
            .force_new()
            .sensitive();
        assert!(attr.optional && attr.computed && attr.force_new && attr.sensitive);
        assert!(!attr.is_computed_only());
        assert!(Attribute::computed_only(AttributeType::String).is_computed_only());
    }
}
