//! service-defaults and proxy-defaults

use std::sync::LazyLock;

use serde_json::{Map, Value};

use meshcfg_client::types::config_entry::kind;
use meshcfg_client::types::ConfigEntry;
use meshcfg_common::{Attribute, AttributeType, Error, ResourceData, Result, Schema, StateWriter};

use super::{decode_body, finish_decode, header_schema, write_body, write_header, ConfigEntryImplementation};

/// `mesh_gateway { mode }`
pub(crate) fn mesh_gateway_block() -> Attribute {
    Attribute::block(Schema::new().attr("mode", Attribute::optional(AttributeType::String)))
}

/// `transparent_proxy { outbound_listener_port, dialed_directly }`
pub(crate) fn transparent_proxy_block() -> Attribute {
    Attribute::block(
        Schema::new()
            .attr("outbound_listener_port", Attribute::optional(AttributeType::Int))
            .attr("dialed_directly", Attribute::optional(AttributeType::Bool)),
    )
}

/// `expose { checks, paths { ... } }`
pub(crate) fn expose_block() -> Attribute {
    let path = Schema::new()
        .attr("listener_port", Attribute::optional(AttributeType::Int))
        .attr("path", Attribute::optional(AttributeType::String))
        .attr("local_path_port", Attribute::optional(AttributeType::Int))
        .attr("protocol", Attribute::optional(AttributeType::String));
    Attribute::block(
        Schema::new()
            .attr("checks", Attribute::optional(AttributeType::Bool))
            .attr("paths", Attribute::blocks(path)),
    )
}

// =============================================================================
// service-defaults
// =============================================================================

static SERVICE_DEFAULTS_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    let destination = Schema::new()
        .attr("addresses", Attribute::optional(AttributeType::string_list()))
        .attr("port", Attribute::optional(AttributeType::Int));
    let limits = Schema::new()
        .attr("max_connections", Attribute::optional(AttributeType::Int))
        .attr("max_pending_requests", Attribute::optional(AttributeType::Int))
        .attr("max_concurrent_requests", Attribute::optional(AttributeType::Int));
    let upstream_defaults = Schema::new()
        .attr("protocol", Attribute::optional(AttributeType::String))
        .attr("connect_timeout_ms", Attribute::optional(AttributeType::Int))
        .attr("limits", Attribute::block(limits));
    header_schema()
        .attr(
            "protocol",
            Attribute::optional(AttributeType::String).describe("tcp, http, http2 or grpc"),
        )
        .attr("mode", Attribute::optional(AttributeType::String))
        .attr("mutual_tls_mode", Attribute::optional(AttributeType::String))
        .attr(
            "balance_inbound_connections",
            Attribute::optional(AttributeType::String),
        )
        .attr("max_inbound_connections", Attribute::optional(AttributeType::Int))
        .attr("local_connect_timeout_ms", Attribute::optional(AttributeType::Int))
        .attr("local_request_timeout_ms", Attribute::optional(AttributeType::Int))
        .attr("external_sni", Attribute::optional(AttributeType::String))
        .attr("mesh_gateway", mesh_gateway_block())
        .attr("transparent_proxy", transparent_proxy_block())
        .attr("expose", expose_block())
        .attr("destination", Attribute::block(destination))
        .attr(
            "upstream_config",
            Attribute::block(Schema::new().attr("defaults", Attribute::block(upstream_defaults))),
        )
});

/// Defaults for every instance of a service
pub struct ServiceDefaults;

impl ConfigEntryImplementation for ServiceDefaults {
    fn type_name(&self) -> &'static str {
        "config_entry_service_defaults"
    }

    fn kind(&self) -> &'static str {
        kind::SERVICE_DEFAULTS
    }

    fn schema(&self) -> &Schema {
        &SERVICE_DEFAULTS_SCHEMA
    }
}

// =============================================================================
// proxy-defaults
// =============================================================================

static PROXY_DEFAULTS_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    header_schema()
        .attr(
            "config",
            Attribute::optional(AttributeType::String)
                .json()
                .describe("Opaque proxy configuration as JSON"),
        )
        .attr("mode", Attribute::optional(AttributeType::String))
        .attr("mutual_tls_mode", Attribute::optional(AttributeType::String))
        .attr("mesh_gateway", mesh_gateway_block())
        .attr("transparent_proxy", transparent_proxy_block())
        .attr("expose", expose_block())
});

/// Defaults for every sidecar and gateway proxy
pub struct ProxyDefaults;

impl ConfigEntryImplementation for ProxyDefaults {
    fn type_name(&self) -> &'static str {
        "config_entry_proxy_defaults"
    }

    fn kind(&self) -> &'static str {
        kind::PROXY_DEFAULTS
    }

    fn schema(&self) -> &Schema {
        &PROXY_DEFAULTS_SCHEMA
    }

    fn decode(&self, data: &ResourceData) -> Result<ConfigEntry> {
        let mut body = decode_body(self.schema(), data);
        body.remove("Config");
        if let Some(raw) = data.get_str("config") {
            let config: Map<String, Value> = serde_json::from_str(raw)
                .map_err(|e| Error::decode_field("config", format!("invalid JSON object: {e}")))?;
            body.insert("Config".into(), Value::Object(config));
        }
        finish_decode(self.kind(), data, body)
    }

    fn write(&self, entry: &ConfigEntry, sw: &mut StateWriter<'_>) -> Result<()> {
        write_header(entry, sw);
        write_body(&entry.to_value()?, sw, &["config"]);
        if let ConfigEntry::ProxyDefaults(proxy) = entry {
            let config = if proxy.config.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&proxy.config)?)
            };
            sw.set("config", &config);
        }
        Ok(())
    }
}
