//! Discovery chain kinds: service-router, service-splitter and
//! service-resolver

use std::sync::LazyLock;

use serde_json::{Map, Value};

use meshcfg_client::types::config_entry::{kind, ServiceResolverFailover, ServiceResolverSubset};
use meshcfg_client::types::ConfigEntry;
use meshcfg_common::duration::validate_duration;
use meshcfg_common::keys::{block_to_state, block_to_wire};
use meshcfg_common::{Attribute, AttributeType, Error, ResourceData, Result, Schema, StateWriter};

use super::{decode_body, finish_decode, header_schema, write_body, write_header, ConfigEntryImplementation};

fn header_modifiers() -> Attribute {
    Attribute::block(
        Schema::new()
            .attr("add", Attribute::optional(AttributeType::Map))
            .attr("set", Attribute::optional(AttributeType::Map))
            .attr("remove", Attribute::optional(AttributeType::string_list())),
    )
}

// =============================================================================
// service-router
// =============================================================================

static SERVICE_ROUTER_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    let header_match = Schema::new()
        .attr("name", Attribute::required(AttributeType::String))
        .attr("present", Attribute::optional(AttributeType::Bool))
        .attr("exact", Attribute::optional(AttributeType::String))
        .attr("prefix", Attribute::optional(AttributeType::String))
        .attr("suffix", Attribute::optional(AttributeType::String))
        .attr("regex", Attribute::optional(AttributeType::String))
        .attr("invert", Attribute::optional(AttributeType::Bool));
    let query_match = Schema::new()
        .attr("name", Attribute::required(AttributeType::String))
        .attr("present", Attribute::optional(AttributeType::Bool))
        .attr("exact", Attribute::optional(AttributeType::String))
        .attr("regex", Attribute::optional(AttributeType::String));
    let http = Schema::new()
        .attr("path_exact", Attribute::optional(AttributeType::String))
        .attr("path_prefix", Attribute::optional(AttributeType::String))
        .attr("path_regex", Attribute::optional(AttributeType::String))
        .attr("methods", Attribute::optional(AttributeType::string_list()))
        .attr("header", Attribute::blocks(header_match))
        .attr("query_param", Attribute::blocks(query_match));
    let destination = Schema::new()
        .attr("service", Attribute::optional(AttributeType::String))
        .attr("service_subset", Attribute::optional(AttributeType::String))
        .attr("namespace", Attribute::optional(AttributeType::String))
        .attr("partition", Attribute::optional(AttributeType::String))
        .attr("prefix_rewrite", Attribute::optional(AttributeType::String))
        .attr("request_timeout", Attribute::optional(AttributeType::Duration))
        .attr("idle_timeout", Attribute::optional(AttributeType::Duration))
        .attr("num_retries", Attribute::optional(AttributeType::Int))
        .attr("retry_on_connect_failure", Attribute::optional(AttributeType::Bool))
        .attr("retry_on", Attribute::optional(AttributeType::string_list()))
        .attr(
            "retry_on_status_codes",
            Attribute::optional(AttributeType::List(Box::new(AttributeType::Int))),
        )
        .attr("request_headers", header_modifiers())
        .attr("response_headers", header_modifiers());
    let route = Schema::new()
        .attr("match", Attribute::block(Schema::new().attr("http", Attribute::block(http))))
        .attr("destination", Attribute::block(destination));
    header_schema().attr("routes", Attribute::blocks(route))
});

/// Layer 7 routing rules of a service
pub struct ServiceRouter;

impl ConfigEntryImplementation for ServiceRouter {
    fn type_name(&self) -> &'static str {
        "config_entry_service_router"
    }

    fn kind(&self) -> &'static str {
        kind::SERVICE_ROUTER
    }

    fn schema(&self) -> &Schema {
        &SERVICE_ROUTER_SCHEMA
    }

    fn decode(&self, data: &ResourceData) -> Result<ConfigEntry> {
        for route in data.get_blocks("routes") {
            let Some(destination) = route.get("destination").and_then(Value::as_object) else {
                continue;
            };
            for field in ["request_timeout", "idle_timeout"] {
                validate_duration(field, destination.get(field).and_then(Value::as_str))?;
            }
        }
        finish_decode(self.kind(), data, decode_body(self.schema(), data))
    }
}

// =============================================================================
// service-splitter
// =============================================================================

static SERVICE_SPLITTER_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    let split = Schema::new()
        .attr("weight", Attribute::required(AttributeType::Float))
        .attr("service", Attribute::required(AttributeType::String))
        .attr("service_subset", Attribute::optional(AttributeType::String))
        .attr("namespace", Attribute::optional(AttributeType::String))
        .attr("partition", Attribute::optional(AttributeType::String))
        .attr("request_headers", header_modifiers())
        .attr("response_headers", header_modifiers());
    header_schema().attr("splits", Attribute::blocks(split))
});

/// Weighted traffic split between subsets or services
pub struct ServiceSplitter;

impl ConfigEntryImplementation for ServiceSplitter {
    fn type_name(&self) -> &'static str {
        "config_entry_service_splitter"
    }

    fn kind(&self) -> &'static str {
        kind::SERVICE_SPLITTER
    }

    fn schema(&self) -> &Schema {
        &SERVICE_SPLITTER_SCHEMA
    }
}

// =============================================================================
// service-resolver
// =============================================================================

static SUBSET_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new()
        .attr("name", Attribute::required(AttributeType::String))
        .attr("filter", Attribute::optional(AttributeType::String))
        .attr("only_passing", Attribute::optional(AttributeType::Bool))
});

static FAILOVER_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    let target = Schema::new()
        .attr("service", Attribute::optional(AttributeType::String))
        .attr("service_subset", Attribute::optional(AttributeType::String))
        .attr("partition", Attribute::optional(AttributeType::String))
        .attr("namespace", Attribute::optional(AttributeType::String))
        .attr("datacenter", Attribute::optional(AttributeType::String))
        .attr("peer", Attribute::optional(AttributeType::String));
    Schema::new()
        .attr(
            "subset_name",
            Attribute::required(AttributeType::String).describe("Subset the policy applies to, `*` for all"),
        )
        .attr("service", Attribute::optional(AttributeType::String))
        .attr("service_subset", Attribute::optional(AttributeType::String))
        .attr("namespace", Attribute::optional(AttributeType::String))
        .attr("datacenters", Attribute::optional(AttributeType::string_list()))
        .attr("targets", Attribute::blocks(target))
        .attr("sameness_group", Attribute::optional(AttributeType::String))
});

static SERVICE_RESOLVER_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    let redirect = Schema::new()
        .attr("service", Attribute::optional(AttributeType::String))
        .attr("service_subset", Attribute::optional(AttributeType::String))
        .attr("namespace", Attribute::optional(AttributeType::String))
        .attr("partition", Attribute::optional(AttributeType::String))
        .attr("datacenter", Attribute::optional(AttributeType::String))
        .attr("peer", Attribute::optional(AttributeType::String))
        .attr("sameness_group", Attribute::optional(AttributeType::String));
    let hash_policy = Schema::new()
        .attr("field", Attribute::optional(AttributeType::String))
        .attr("field_value", Attribute::optional(AttributeType::String))
        .attr("source_ip", Attribute::optional(AttributeType::Bool))
        .attr("terminal", Attribute::optional(AttributeType::Bool));
    let load_balancer = Schema::new()
        .attr("policy", Attribute::optional(AttributeType::String))
        .attr(
            "least_request_config",
            Attribute::block(Schema::new().attr("choice_count", Attribute::optional(AttributeType::Int))),
        )
        .attr(
            "ring_hash_config",
            Attribute::block(
                Schema::new()
                    .attr("minimum_ring_size", Attribute::optional(AttributeType::Int))
                    .attr("maximum_ring_size", Attribute::optional(AttributeType::Int)),
            ),
        )
        .attr("hash_policies", Attribute::blocks(hash_policy));
    header_schema()
        .attr("default_subset", Attribute::optional(AttributeType::String))
        .attr("subsets", Attribute::block_set(SUBSET_SCHEMA.clone()))
        .attr("redirect", Attribute::block(redirect))
        .attr("failover", Attribute::block_set(FAILOVER_SCHEMA.clone()))
        .attr("connect_timeout", Attribute::optional(AttributeType::Duration))
        .attr("request_timeout", Attribute::optional(AttributeType::Duration))
        .attr("load_balancer", Attribute::block(load_balancer))
        .attr(
            "prioritize_by_locality",
            Attribute::block(Schema::new().attr("mode", Attribute::optional(AttributeType::String))),
        )
});

/// Subset definitions, redirects and failover of a service
///
/// Subsets and failover policies are keyed maps on the wire but repeated
/// blocks in the declaration, named by `name` and `subset_name`.
pub struct ServiceResolver;

impl ConfigEntryImplementation for ServiceResolver {
    fn type_name(&self) -> &'static str {
        "config_entry_service_resolver"
    }

    fn kind(&self) -> &'static str {
        kind::SERVICE_RESOLVER
    }

    fn schema(&self) -> &Schema {
        &SERVICE_RESOLVER_SCHEMA
    }

    fn decode(&self, data: &ResourceData) -> Result<ConfigEntry> {
        validate_duration("connect_timeout", data.get_str("connect_timeout"))?;
        validate_duration("request_timeout", data.get_str("request_timeout"))?;

        let mut body = decode_body(self.schema(), data);
        body.remove("Subsets");
        body.remove("Failover");

        let subsets = keyed_blocks(data.get_blocks("subsets"), "name", &SUBSET_SCHEMA)?;
        if !subsets.is_empty() {
            body.insert("Subsets".into(), Value::Object(subsets));
        }
        let failover = keyed_blocks(data.get_blocks("failover"), "subset_name", &FAILOVER_SCHEMA)?;
        if !failover.is_empty() {
            body.insert("Failover".into(), Value::Object(failover));
        }
        finish_decode(self.kind(), data, body)
    }

    fn write(&self, entry: &ConfigEntry, sw: &mut StateWriter<'_>) -> Result<()> {
        write_header(entry, sw);
        write_body(&entry.to_value()?, sw, &["subsets", "failover"]);
        let ConfigEntry::ServiceResolver(resolver) = entry else {
            return Ok(());
        };
        let subsets = resolver
            .subsets
            .iter()
            .map(|(name, subset)| subset_state(name, subset))
            .collect::<Result<Vec<_>>>()?;
        let failover = resolver
            .failover
            .iter()
            .map(|(name, policy)| failover_state(name, policy))
            .collect::<Result<Vec<_>>>()?;
        sw.set("subsets", &subsets).set("failover", &failover);
        Ok(())
    }
}

/// Turn repeated blocks into a wire map keyed by one of their attributes
fn keyed_blocks(blocks: Vec<&Map<String, Value>>, key: &str, schema: &Schema) -> Result<Map<String, Value>> {
    let mut out = Map::new();
    for block in blocks {
        let name = block
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::decode_field(key, "must be set on every block"))?;
        let mut rest = block.clone();
        rest.remove(key);
        if let Some(wire) = block_to_wire(schema, &Value::Object(rest)) {
            out.insert(name.to_string(), wire);
        }
    }
    Ok(out)
}

fn subset_state(name: &str, subset: &ServiceResolverSubset) -> Result<Value> {
    named_state(&SUBSET_SCHEMA, "name", name, serde_json::to_value(subset)?)
}

fn failover_state(name: &str, policy: &ServiceResolverFailover) -> Result<Value> {
    named_state(&FAILOVER_SCHEMA, "subset_name", name, serde_json::to_value(policy)?)
}

fn named_state(schema: &Schema, key: &str, name: &str, wire: Value) -> Result<Value> {
    let mut state = match block_to_state(schema, &wire) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    state.insert(key.to_string(), Value::String(name.to_string()));
    Ok(Value::Object(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshcfg_common::plan::is_converged;
    use serde_json::json;

    fn declared() -> Value {
        json!({
            "name": "web",
            "default_subset": "v1",
            "connect_timeout": "5s",
            "subsets": [
                {"name": "v1", "filter": "Service.Meta.version == v1", "only_passing": true},
                {"name": "v2", "filter": "Service.Meta.version == v2"}
            ],
            "failover": [
                {"subset_name": "*", "datacenters": ["dc2", "dc3"]}
            ]
        })
    }

    #[test]
    fn resolver_blocks_become_keyed_maps() {
        let data = ResourceData::from_value(declared());
        let wire = ServiceResolver.decode(&data).unwrap().to_value().unwrap();
        assert_eq!(wire["Subsets"]["v1"]["OnlyPassing"], true);
        assert_eq!(wire["Subsets"]["v2"]["Filter"], "Service.Meta.version == v2");
        assert!(wire["Subsets"]["v1"].get("Name").is_none());
        assert_eq!(wire["Failover"]["*"]["Datacenters"], json!(["dc2", "dc3"]));
        assert_eq!(wire["ConnectTimeout"], "5s");
    }

    #[test]
    fn resolver_state_round_trips() {
        let declared = declared();
        let mut data = ResourceData::from_value(declared.clone());
        let entry = ServiceResolver.decode(&data).unwrap();
        let mut sw = data.writer(ServiceResolver.schema());
        ServiceResolver.write(&entry, &mut sw).unwrap();
        sw.finish().unwrap();
        assert!(is_converged(
            ServiceResolver.schema(),
            declared.as_object().unwrap(),
            data.values()
        ));
    }

    #[test]
    fn invalid_timeouts_are_rejected() {
        let data = ResourceData::from_value(json!({"name": "web", "connect_timeout": "soon"}));
        let err = ServiceResolver.decode(&data).unwrap_err();
        assert!(matches!(err, Error::DurationInvalid { ref field, .. } if field == "connect_timeout"));
    }

    #[test]
    fn unnamed_subsets_are_rejected() {
        let data = ResourceData::from_value(json!({"name": "web", "subsets": [{"filter": "x"}]}));
        assert!(matches!(
            ServiceResolver.decode(&data).unwrap_err(),
            Error::Decode { .. }
        ));
    }

    #[test]
    fn router_routes_keep_their_match_shape() {
        let data = ResourceData::from_value(json!({
            "name": "web",
            "routes": [{
                "match": {"http": {"path_prefix": "/admin", "methods": ["GET"]}},
                "destination": {"service": "admin", "request_timeout": "2s", "num_retries": 3}
            }]
        }));
        let wire = ServiceRouter.decode(&data).unwrap().to_value().unwrap();
        let route = &wire["Routes"][0];
        assert_eq!(route["Match"]["Http"]["PathPrefix"], "/admin");
        assert_eq!(route["Destination"]["NumRetries"], 3);
        assert_eq!(route["Destination"]["RequestTimeout"], "2s");
    }

    #[test]
    fn router_rejects_bad_route_timeouts() {
        let data = ResourceData::from_value(json!({
            "name": "web",
            "routes": [{"destination": {"service": "admin", "idle_timeout": "forever"}}]
        }));
        assert!(matches!(
            ServiceRouter.decode(&data).unwrap_err(),
            Error::DurationInvalid { .. }
        ));
    }

    #[test]
    fn splitter_weights_survive_the_wire() {
        let declared = json!({
            "name": "web",
            "splits": [
                {"weight": 90, "service": "web", "service_subset": "v1"},
                {"weight": 10, "service": "web", "service_subset": "v2"}
            ]
        });
        let mut data = ResourceData::from_value(declared.clone());
        let entry = ServiceSplitter.decode(&data).unwrap();
        assert_eq!(entry.to_value().unwrap()["Splits"][0]["Weight"], 90.0);
        let mut sw = data.writer(ServiceSplitter.schema());
        ServiceSplitter.write(&entry, &mut sw).unwrap();
        sw.finish().unwrap();
        assert!(is_converged(
            ServiceSplitter.schema(),
            declared.as_object().unwrap(),
            data.values()
        ));
    }
}
