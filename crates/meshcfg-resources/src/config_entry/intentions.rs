//! service-intentions

use std::sync::LazyLock;

use serde_json::Value;

use meshcfg_client::types::config_entry::kind;
use meshcfg_client::types::ConfigEntry;
use meshcfg_common::{Attribute, AttributeType, Error, ResourceData, Result, Schema};

use super::{decode_body, finish_decode, header_schema, ConfigEntryImplementation};

/// Actions an intention or permission may carry
pub const ACTIONS: &[&str] = &["allow", "deny"];

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    let header_match = Schema::new()
        .attr("name", Attribute::required(AttributeType::String))
        .attr("present", Attribute::optional(AttributeType::Bool))
        .attr("exact", Attribute::optional(AttributeType::String))
        .attr("prefix", Attribute::optional(AttributeType::String))
        .attr("suffix", Attribute::optional(AttributeType::String))
        .attr("regex", Attribute::optional(AttributeType::String))
        .attr("invert", Attribute::optional(AttributeType::Bool));
    let http = Schema::new()
        .attr("path_exact", Attribute::optional(AttributeType::String))
        .attr("path_prefix", Attribute::optional(AttributeType::String))
        .attr("path_regex", Attribute::optional(AttributeType::String))
        .attr("methods", Attribute::optional(AttributeType::string_list()))
        .attr("header", Attribute::blocks(header_match));
    let permission = Schema::new()
        .attr("action", Attribute::required(AttributeType::String))
        .attr("http", Attribute::block(http));
    let source = Schema::new()
        .attr("name", Attribute::required(AttributeType::String))
        .attr("peer", Attribute::optional(AttributeType::String))
        .attr("partition", Attribute::optional(AttributeType::String))
        .attr("namespace", Attribute::optional(AttributeType::String))
        .attr("sameness_group", Attribute::optional(AttributeType::String))
        .attr("action", Attribute::optional(AttributeType::String))
        .attr("permissions", Attribute::blocks(permission))
        .attr("type", Attribute::computed_only(AttributeType::String))
        .attr("description", Attribute::optional(AttributeType::String));
    let claim = Schema::new()
        .attr("path", Attribute::optional(AttributeType::string_list()))
        .attr("value", Attribute::optional(AttributeType::String));
    let provider = Schema::new()
        .attr("name", Attribute::required(AttributeType::String))
        .attr("verify_claims", Attribute::blocks(claim));
    header_schema()
        .attr("sources", Attribute::blocks(source))
        .attr(
            "jwt",
            Attribute::block(Schema::new().attr("providers", Attribute::blocks(provider))),
        )
});

/// Allow/deny rules for traffic into a destination service
pub struct ServiceIntentions;

impl ConfigEntryImplementation for ServiceIntentions {
    fn type_name(&self) -> &'static str {
        "config_entry_service_intentions"
    }

    fn kind(&self) -> &'static str {
        kind::SERVICE_INTENTIONS
    }

    fn schema(&self) -> &Schema {
        &SCHEMA
    }

    fn decode(&self, data: &ResourceData) -> Result<ConfigEntry> {
        for source in data.get_blocks("sources") {
            check_action("sources.action", source.get("action"))?;
            let permissions = source.get("permissions").and_then(Value::as_array);
            for permission in permissions.into_iter().flatten() {
                check_action("sources.permissions.action", permission.get("action"))?;
            }
        }
        finish_decode(self.kind(), data, decode_body(self.schema(), data))
    }
}

/// Reject actions other than `allow` and `deny`; unset is accepted
pub fn check_action(field: &str, action: Option<&Value>) -> Result<()> {
    match action.and_then(Value::as_str) {
        None | Some("") => Ok(()),
        Some(a) if ACTIONS.contains(&a) => Ok(()),
        Some(other) => Err(Error::decode_field(
            field,
            format!("action must be one of {ACTIONS:?}, got {other:?}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshcfg_common::plan::is_converged;
    use serde_json::json;

    #[test]
    fn unknown_actions_are_decode_errors() {
        let data = ResourceData::from_value(json!({
            "name": "db",
            "sources": [{"name": "web", "action": "permit"}]
        }));
        let err = ServiceIntentions.decode(&data).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));

        let data = ResourceData::from_value(json!({
            "name": "db",
            "sources": [{"name": "web", "permissions": [{"action": "maybe"}]}]
        }));
        assert!(ServiceIntentions.decode(&data).is_err());
    }

    /// Sources with L7 permissions read back without drift, even though the
    /// remote adds a source type
    #[test]
    fn story_intentions_round_trip() {
        let declared = json!({
            "name": "db",
            "sources": [
                {"name": "web", "action": "allow"},
                {
                    "name": "admin",
                    "permissions": [{
                        "action": "allow",
                        "http": {"path_prefix": "/v1", "methods": ["GET", "PUT"]}
                    }]
                }
            ]
        });
        let data = ResourceData::from_value(declared.clone());
        let wire = ServiceIntentions.decode(&data).unwrap().to_value().unwrap();
        assert_eq!(wire["Sources"][0]["Action"], "allow");
        assert_eq!(wire["Sources"][1]["Permissions"][0]["Http"]["PathPrefix"], "/v1");

        let mut observed = wire.clone();
        for source in observed["Sources"].as_array_mut().unwrap() {
            source["Type"] = json!("consul");
        }
        let entry = ConfigEntry::from_value(observed).unwrap();
        let mut data = ResourceData::from_value(declared.clone());
        let mut sw = data.writer(ServiceIntentions.schema());
        ServiceIntentions.write(&entry, &mut sw).unwrap();
        sw.finish().unwrap();
        assert!(is_converged(
            ServiceIntentions.schema(),
            declared.as_object().unwrap(),
            data.values()
        ));
        assert_eq!(data.values()["sources"][0]["type"], "consul");
    }
}
