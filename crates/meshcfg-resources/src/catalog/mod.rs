//! Catalog resources: nodes, services and whole catalog entries
//!
//! Everything here is written through `/catalog/register` and removed
//! through `/catalog/deregister`. Nodes and services registered this way are
//! not backed by a local agent, so anti-entropy never touches them.

pub mod entry;
pub mod node;
pub mod service;

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use meshcfg_client::types::catalog::HealthCheckDefinition;
use meshcfg_client::types::HealthCheck;
use meshcfg_common::duration::validate_duration;
use meshcfg_common::state::value_to_string_list;
use meshcfg_common::{Attribute, AttributeType, Error, Result, Schema};

use crate::resource::Resource;

/// Every catalog resource type
pub fn resources() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(node::NodeResource),
        Box::new(service::ServiceResource),
        Box::new(entry::CatalogEntryResource),
    ]
}

// =============================================================================
// Health checks
// =============================================================================

/// Schema of one `check` block
///
/// HTTP and TCP probes are representable; script probes only exist in agent
/// configuration and cannot be registered through the catalog.
pub(crate) fn check_block() -> Attribute {
    let header = Schema::new()
        .attr("name", Attribute::required(AttributeType::String))
        .attr("value", Attribute::optional(AttributeType::string_list()));
    Attribute::block_set(
        Schema::new()
            .attr("check_id", Attribute::required(AttributeType::String))
            .attr("name", Attribute::required(AttributeType::String))
            .attr("notes", Attribute::optional(AttributeType::String))
            .attr("http", Attribute::optional(AttributeType::String))
            .attr("tcp", Attribute::optional(AttributeType::String))
            .attr("method", Attribute::optional(AttributeType::String))
            .attr("header", Attribute::block_set(header))
            .attr("tls_skip_verify", Attribute::optional(AttributeType::Bool))
            .attr("tls_server_name", Attribute::optional(AttributeType::String))
            .attr("interval", Attribute::required(AttributeType::Duration))
            .attr("timeout", Attribute::required(AttributeType::Duration))
            .attr(
                "deregister_critical_service_after",
                Attribute::optional(AttributeType::Duration),
            ),
    )
}

fn str_field(block: &Map<String, Value>, key: &str) -> String {
    block
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn duration_field(block: &Map<String, Value>, key: &str) -> Result<String> {
    let value = block.get(key).and_then(Value::as_str);
    Ok(validate_duration(&format!("check.{key}"), value)?
        .unwrap_or_default()
        .to_string())
}

/// Health checks for the declared `check` blocks of a service
pub(crate) fn decode_checks(
    blocks: &[&Map<String, Value>],
    node: &str,
    service_id: &str,
    service_name: &str,
) -> Result<Vec<HealthCheck>> {
    blocks
        .iter()
        .map(|b| {
            let http = str_field(b, "http");
            let tcp = str_field(b, "tcp");
            if http.is_empty() == tcp.is_empty() {
                return Err(Error::decode_field("check", "exactly one of http and tcp must be set"));
            }
            let header: BTreeMap<String, Vec<String>> = b
                .get("header")
                .and_then(Value::as_array)
                .map(|headers| {
                    headers
                        .iter()
                        .filter_map(Value::as_object)
                        .map(|h| {
                            (
                                str_field(h, "name"),
                                h.get("value").map(value_to_string_list).unwrap_or_default(),
                            )
                        })
                        .collect()
                })
                .unwrap_or_default();
            Ok(HealthCheck {
                node: node.to_string(),
                check_id: str_field(b, "check_id"),
                name: str_field(b, "name"),
                notes: str_field(b, "notes"),
                service_id: service_id.to_string(),
                service_name: service_name.to_string(),
                definition: HealthCheckDefinition {
                    http,
                    header,
                    method: str_field(b, "method"),
                    tls_server_name: str_field(b, "tls_server_name"),
                    tls_skip_verify: b.get("tls_skip_verify").and_then(Value::as_bool).unwrap_or(false),
                    tcp,
                    interval: duration_field(b, "interval")?,
                    timeout: duration_field(b, "timeout")?,
                    deregister_critical_service_after: duration_field(b, "deregister_critical_service_after")?,
                    ..Default::default()
                },
                ..Default::default()
            })
        })
        .collect()
}

/// State form of observed checks
pub(crate) fn checks_state(checks: &[HealthCheck]) -> Vec<Value> {
    checks
        .iter()
        .map(|c| {
            let d = &c.definition;
            let headers: Vec<Value> = d
                .header
                .iter()
                .map(|(name, value)| json!({"name": name, "value": value}))
                .collect();
            json!({
                "check_id": c.check_id,
                "name": c.name,
                "notes": c.notes,
                "http": d.http,
                "tcp": d.tcp,
                "method": d.method,
                "header": headers,
                "tls_skip_verify": d.tls_skip_verify,
                "tls_server_name": d.tls_server_name,
                "interval": d.interval,
                "timeout": d.timeout,
                "deregister_critical_service_after": d.deregister_critical_service_after,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checks_need_exactly_one_probe() {
        let both = json!({"check_id": "c", "name": "c", "http": "http://x", "tcp": "x:1", "interval": "10s", "timeout": "1s"});
        let block = both.as_object().unwrap();
        assert!(decode_checks(&[block], "n", "s", "s").is_err());
    }

    #[test]
    fn check_durations_are_validated() {
        let bad = json!({"check_id": "c", "name": "c", "tcp": "x:1", "interval": "often", "timeout": "1s"});
        let err = decode_checks(&[bad.as_object().unwrap()], "n", "s", "s").unwrap_err();
        assert!(matches!(err, Error::DurationInvalid { ref field, .. } if field == "check.interval"));
    }

    #[test]
    fn headers_become_a_multimap() {
        let block = json!({
            "check_id": "c",
            "name": "c",
            "http": "http://x/health",
            "header": [{"name": "Accept", "value": ["text/plain"]}],
            "interval": "10s",
            "timeout": "1s"
        });
        let checks = decode_checks(&[block.as_object().unwrap()], "n", "web", "web").unwrap();
        assert_eq!(checks[0].definition.header["Accept"], vec!["text/plain"]);
        assert_eq!(checks_state(&checks)[0]["header"][0]["value"][0], "text/plain");
    }
}
