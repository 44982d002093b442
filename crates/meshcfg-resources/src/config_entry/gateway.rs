//! ingress-gateway and terminating-gateway


use std::sync::LazyLock;

use meshcfg_client::types::config_entry::kind;
use meshcfg_common::{Attribute, AttributeType, Schema};

use super::{header_schema, ConfigEntryImplementation};

fn gateway_tls() -> Attribute {
    Attribute::block(
        Schema::new()
            .attr("enabled", Attribute::optional(AttributeType::Bool))
            .attr("tls_min_version", Attribute::optional(AttributeType::String))
            .attr("tls_max_version", Attribute::optional(AttributeType::String))
            .attr("cipher_suites", Attribute::optional(AttributeType::string_list())),
    )
}

static INGRESS_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    let service = Schema::new()
        .attr("name", Attribute::required(AttributeType::String))
        .attr("hosts", Attribute::optional(AttributeType::string_list()))
        .attr("namespace", Attribute::optional(AttributeType::String))
        .attr("partition", Attribute::optional(AttributeType::String));
    let listener = Schema::new()
        .attr("port", Attribute::required(AttributeType::Int))
        .attr("protocol", Attribute::optional(AttributeType::String))
        .attr("services", Attribute::blocks(service))
        .attr("tls", gateway_tls());
    let defaults = Schema::new()
        .attr("max_connections", Attribute::optional(AttributeType::Int))
        .attr("max_pending_requests", Attribute::optional(AttributeType::Int))
        .attr("max_concurrent_requests", Attribute::optional(AttributeType::Int));
    header_schema()
        .attr("tls", gateway_tls())
        .attr("listeners", Attribute::blocks(listener))
        .attr("defaults", Attribute::block(defaults))
});

/// Listeners exposing mesh services to outside traffic
pub struct IngressGateway;

impl ConfigEntryImplementation for IngressGateway {
    fn type_name(&self) -> &'static str {
        "config_entry_ingress_gateway"
    }

    fn kind(&self) -> &'static str {
        kind::INGRESS_GATEWAY
    }

    fn schema(&self) -> &Schema {
        &INGRESS_SCHEMA
    }
}

static TERMINATING_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    let service = Schema::new()
        .attr("name", Attribute::required(AttributeType::String))
        .attr("namespace", Attribute::optional(AttributeType::String))
        .attr("ca_file", Attribute::optional(AttributeType::String))
        .attr("cert_file", Attribute::optional(AttributeType::String))
        .attr("key_file", Attribute::optional(AttributeType::String))
        .attr("sni", Attribute::optional(AttributeType::String));
    header_schema().attr("services", Attribute::blocks(service))
});

/// Services outside the mesh reached through a gateway
pub struct TerminatingGateway;

impl ConfigEntryImplementation for TerminatingGateway {
    fn type_name(&self) -> &'static str {
        "config_entry_terminating_gateway"
    }

    fn kind(&self) -> &'static str {
        kind::TERMINATING_GATEWAY
    }

    fn schema(&self) -> &Schema {
        &TERMINATING_SCHEMA
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshcfg_client::types::ConfigEntry;
    use meshcfg_common::plan::is_converged;
    use meshcfg_common::ResourceData;
    use serde_json::json;

    #[test]
    fn ingress_listeners_round_trip() {
        let declared = json!({
            "name": "ingress",
            "tls": {"enabled": true},
            "listeners": [{
                "port": 8080,
                "protocol": "http",
                "services": [{"name": "web", "hosts": ["web.example"]}]
            }]
        });
        let mut data = ResourceData::from_value(declared.clone());
        let entry = IngressGateway.decode(&data).unwrap();
        let wire = entry.to_value().unwrap();
        assert_eq!(wire["TLS"]["Enabled"], true);
        assert_eq!(wire["Listeners"][0]["Services"][0]["Hosts"][0], "web.example");

        let observed = ConfigEntry::from_value(wire).unwrap();
        let mut sw = data.writer(IngressGateway.schema());
        IngressGateway.write(&observed, &mut sw).unwrap();
        sw.finish().unwrap();
        assert!(is_converged(
            IngressGateway.schema(),
            declared.as_object().unwrap(),
            data.values()
        ));
    }

    #[test]
    fn terminating_services_use_canonical_acronyms() {
        let data = ResourceData::from_value(json!({
            "name": "tgw",
            "services": [{"name": "billing", "ca_file": "/ca.pem", "sni": "billing.example"}]
        }));
        let wire = TerminatingGateway.decode(&data).unwrap().to_value().unwrap();
        assert_eq!(wire["Services"][0]["CAFile"], "/ca.pem");
        assert_eq!(wire["Services"][0]["SNI"], "billing.example");
    }
}
