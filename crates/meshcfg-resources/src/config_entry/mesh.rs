//! Mesh-wide kinds: mesh, sameness-group, exported-services and
//! jwt-provider


use std::sync::LazyLock;

use meshcfg_client::types::config_entry::kind;
use meshcfg_common::{Attribute, AttributeType, Schema};

use super::{header_schema, ConfigEntryImplementation};

// =============================================================================
// sameness-group
// =============================================================================

static SAMENESS_GROUP_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    let member = Schema::new()
        .attr("partition", Attribute::optional(AttributeType::String))
        .attr("peer", Attribute::optional(AttributeType::String));
    header_schema()
        .attr("default_for_failover", Attribute::optional(AttributeType::Bool))
        .attr("include_local", Attribute::optional(AttributeType::Bool))
        .attr("members", Attribute::blocks(member))
});

/// Partitions and peers treated as equivalent for failover
pub struct SamenessGroup;

impl ConfigEntryImplementation for SamenessGroup {
    fn type_name(&self) -> &'static str {
        "config_entry_sameness_group"
    }

    fn kind(&self) -> &'static str {
        kind::SAMENESS_GROUP
    }

    fn schema(&self) -> &Schema {
        &SAMENESS_GROUP_SCHEMA
    }
}

// =============================================================================
// exported-services
// =============================================================================

static EXPORTED_SERVICES_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    let consumer = Schema::new()
        .attr("partition", Attribute::optional(AttributeType::String))
        .attr("peer", Attribute::optional(AttributeType::String))
        .attr("sameness_group", Attribute::optional(AttributeType::String));
    let service = Schema::new()
        .attr("name", Attribute::required(AttributeType::String))
        .attr("namespace", Attribute::optional(AttributeType::String))
        .attr("consumers", Attribute::blocks(consumer));
    header_schema().attr("services", Attribute::blocks(service))
});

/// Services a partition makes available to peers and other partitions
pub struct ExportedServices;

impl ConfigEntryImplementation for ExportedServices {
    fn type_name(&self) -> &'static str {
        "config_entry_exported_services"
    }

    fn kind(&self) -> &'static str {
        kind::EXPORTED_SERVICES
    }

    fn schema(&self) -> &Schema {
        &EXPORTED_SERVICES_SCHEMA
    }
}

// =============================================================================
// mesh
// =============================================================================

static MESH_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    let tls_direction = || {
        Attribute::block(
            Schema::new()
                .attr("tls_min_version", Attribute::optional(AttributeType::String))
                .attr("tls_max_version", Attribute::optional(AttributeType::String))
                .attr("cipher_suites", Attribute::optional(AttributeType::string_list())),
        )
    };
    header_schema()
        .attr(
            "transparent_proxy",
            Attribute::block(
                Schema::new().attr("mesh_destinations_only", Attribute::optional(AttributeType::Bool)),
            ),
        )
        .attr(
            "allow_enabling_permissive_mutual_tls",
            Attribute::optional(AttributeType::Bool),
        )
        .attr(
            "tls",
            Attribute::block(
                Schema::new()
                    .attr("incoming", tls_direction())
                    .attr("outgoing", tls_direction()),
            ),
        )
        .attr(
            "http",
            Attribute::block(
                Schema::new().attr(
                    "sanitize_x_forwarded_client_cert",
                    Attribute::optional(AttributeType::Bool),
                ),
            ),
        )
        .attr(
            "peering",
            Attribute::block(
                Schema::new().attr(
                    "peer_through_mesh_gateways",
                    Attribute::optional(AttributeType::Bool),
                ),
            ),
        )
});

/// Mesh-wide settings; the entry is always named `mesh`
pub struct Mesh;

impl ConfigEntryImplementation for Mesh {
    fn type_name(&self) -> &'static str {
        "config_entry_mesh"
    }

    fn kind(&self) -> &'static str {
        kind::MESH
    }

    fn schema(&self) -> &Schema {
        &MESH_SCHEMA
    }
}

// =============================================================================
// jwt-provider
// =============================================================================

static JWT_PROVIDER_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    let local = Schema::new()
        .attr("jwks", Attribute::optional(AttributeType::String).sensitive())
        .attr("filename", Attribute::optional(AttributeType::String));
    let back_off = Schema::new()
        .attr("base_interval", Attribute::optional(AttributeType::Duration))
        .attr("max_interval", Attribute::optional(AttributeType::Duration));
    let retry_policy = Schema::new()
        .attr("num_retries", Attribute::optional(AttributeType::Int))
        .attr("retry_policy_back_off", Attribute::block(back_off));
    let remote = Schema::new()
        .attr("uri", Attribute::required(AttributeType::String))
        .attr("request_timeout_ms", Attribute::optional(AttributeType::Int))
        .attr("cache_duration", Attribute::optional(AttributeType::Duration))
        .attr("fetch_asynchronously", Attribute::optional(AttributeType::Bool))
        .attr("retry_policy", Attribute::block(retry_policy));
    let key_set = Schema::new()
        .attr("local", Attribute::block(local))
        .attr("remote", Attribute::block(remote));
    let named = || Attribute::block(Schema::new().attr("name", Attribute::required(AttributeType::String)));
    let location = Schema::new()
        .attr(
            "header",
            Attribute::block(
                Schema::new()
                    .attr("name", Attribute::required(AttributeType::String))
                    .attr("value_prefix", Attribute::optional(AttributeType::String))
                    .attr("forward", Attribute::optional(AttributeType::Bool)),
            ),
        )
        .attr("query_param", named())
        .attr("cookie", named());
    let forwarding = Schema::new()
        .attr("header_name", Attribute::required(AttributeType::String))
        .attr("pad_forward_payload_header", Attribute::optional(AttributeType::Bool));
    header_schema()
        .attr("issuer", Attribute::optional(AttributeType::String))
        .attr("json_web_key_set", Attribute::block(key_set))
        .attr("audiences", Attribute::optional(AttributeType::string_list()))
        .attr("locations", Attribute::blocks(location))
        .attr("forwarding", Attribute::block(forwarding))
        .attr("clock_skew_seconds", Attribute::optional(AttributeType::Int))
        .attr(
            "cache_config",
            Attribute::block(Schema::new().attr("size", Attribute::optional(AttributeType::Int))),
        )
});

/// JSON Web Token issuer used by intentions
pub struct JwtProvider;

impl ConfigEntryImplementation for JwtProvider {
    fn type_name(&self) -> &'static str {
        "config_entry_jwt_provider"
    }

    fn kind(&self) -> &'static str {
        kind::JWT_PROVIDER
    }

    fn schema(&self) -> &Schema {
        &JWT_PROVIDER_SCHEMA
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_entry::testing::round_trip;
    use meshcfg_common::ResourceData;
    use serde_json::json;

    #[test]
    fn mesh_acronyms_read_back_from_canonical_wire_names() {
        let declared = json!({
            "name": "mesh",
            "tls": {"incoming": {"tls_min_version": "TLSv1_2"}},
            "http": {"sanitize_x_forwarded_client_cert": true}
        });
        let wire = Mesh
            .decode(&ResourceData::from_value(declared.clone()))
            .unwrap()
            .to_value()
            .unwrap();
        assert_eq!(wire["TLS"]["Incoming"]["TLSMinVersion"], "TLSv1_2");
        assert_eq!(wire["HTTP"]["SanitizeXForwardedClientCert"], true);

        round_trip(&Mesh, declared, wire);
    }

    #[test]
    fn exported_services_consumers_round_trip() {
        let declared = json!({
            "name": "default",
            "services": [{"name": "web", "consumers": [{"peer": "east"}, {"sameness_group": "sg"}]}]
        });
        let wire = ExportedServices
            .decode(&ResourceData::from_value(declared.clone()))
            .unwrap()
            .to_value()
            .unwrap();
        assert_eq!(wire["Services"][0]["Consumers"][0]["Peer"], "east");
        round_trip(&ExportedServices, declared, wire);
    }

    #[test]
    fn jwt_key_set_matches_its_wire_spelling() {
        let declared = json!({
            "name": "okta",
            "issuer": "https://okta.example",
            "json_web_key_set": {"remote": {"uri": "https://okta.example/keys", "fetch_asynchronously": true}},
            "forwarding": {"header_name": "x-jwt"}
        });
        let observed = json!({
            "Kind": "jwt-provider",
            "Name": "okta",
            "Issuer": "https://okta.example",
            "JSONWebKeySet": {"Remote": {"URI": "https://okta.example/keys", "FetchAsynchronously": true}},
            "Forwarding": {"HeaderName": "x-jwt"}
        });
        let data = round_trip(&JwtProvider, declared, observed);
        assert_eq!(
            data.get_block("json_web_key_set").unwrap()["remote"]["uri"],
            "https://okta.example/keys"
        );
    }

    #[test]
    fn sameness_group_members_keep_their_order() {
        let declared = json!({
            "name": "sg",
            "default_for_failover": true,
            "members": [{"partition": "p1"}, {"peer": "east"}]
        });
        let wire = SamenessGroup
            .decode(&ResourceData::from_value(declared.clone()))
            .unwrap()
            .to_value()
            .unwrap();
        assert_eq!(wire["Members"][1]["Peer"], "east");
        round_trip(&SamenessGroup, declared, wire);
    }
}
