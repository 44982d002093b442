//! Config entry wire objects
//!
//! [`ConfigEntry`] has one variant per supported kind plus [`ConfigEntry::Other`]
//! for kinds managed through the generic JSON resource. On the wire the kind
//! travels in the `Kind` field of the document.
//!
//! Each kind struct types the fields the engine inspects and keeps everything
//! else in a flattened `extra` map, so documents written by newer servers
//! survive a read/write cycle.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use meshcfg_common::{Error, Result};

use super::acl::null_as_default;

/// Wire names of the supported kinds
pub mod kind {
    /// service-defaults
    pub const SERVICE_DEFAULTS: &str = "service-defaults";
    /// proxy-defaults
    pub const PROXY_DEFAULTS: &str = "proxy-defaults";
    /// service-router
    pub const SERVICE_ROUTER: &str = "service-router";
    /// service-splitter
    pub const SERVICE_SPLITTER: &str = "service-splitter";
    /// service-resolver
    pub const SERVICE_RESOLVER: &str = "service-resolver";
    /// service-intentions
    pub const SERVICE_INTENTIONS: &str = "service-intentions";
    /// sameness-group
    pub const SAMENESS_GROUP: &str = "sameness-group";
    /// exported-services
    pub const EXPORTED_SERVICES: &str = "exported-services";
    /// mesh
    pub const MESH: &str = "mesh";
    /// jwt-provider
    pub const JWT_PROVIDER: &str = "jwt-provider";
    /// ingress-gateway
    pub const INGRESS_GATEWAY: &str = "ingress-gateway";
    /// terminating-gateway
    pub const TERMINATING_GATEWAY: &str = "terminating-gateway";

    /// Every kind with a typed variant
    pub const ALL: &[&str] = &[
        SERVICE_DEFAULTS,
        PROXY_DEFAULTS,
        SERVICE_ROUTER,
        SERVICE_SPLITTER,
        SERVICE_RESOLVER,
        SERVICE_INTENTIONS,
        SAMENESS_GROUP,
        EXPORTED_SERVICES,
        MESH,
        JWT_PROVIDER,
        INGRESS_GATEWAY,
        TERMINATING_GATEWAY,
    ];
}

fn is_default<T: Default + PartialEq>(v: &T) -> bool {
    *v == T::default()
}

// =============================================================================
// Common parts
// =============================================================================

/// Fields shared by every kind
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EntryHeader {
    /// Entry name
    pub name: String,
    /// Admin partition
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    /// Namespace
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Meta
    #[serde(skip_serializing_if = "BTreeMap::is_empty", deserialize_with = "null_as_default")]
    pub meta: BTreeMap<String, String>,
    /// Raft index of creation
    #[serde(skip_serializing)]
    pub create_index: u64,
    /// Raft index of the last modification
    #[serde(skip_serializing)]
    pub modify_index: u64,
}

/// Mesh gateway mode
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MeshGatewayConfig {
    /// `none`, `local` or `remote`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mode: String,
}

/// Transparent proxy settings
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TransparentProxyConfig {
    /// Port of the outbound listener
    #[serde(skip_serializing_if = "is_default")]
    pub outbound_listener_port: u16,
    /// Dial instances directly instead of through their sidecars
    #[serde(skip_serializing_if = "is_default")]
    pub dialed_directly: bool,
}

/// Expose settings
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ExposeConfig {
    /// Expose HTTP and gRPC checks
    #[serde(skip_serializing_if = "is_default")]
    pub checks: bool,
    /// Exposed paths
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub paths: Vec<ExposePath>,
}

/// One exposed path
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ExposePath {
    /// Port of the listener
    #[serde(skip_serializing_if = "is_default")]
    pub listener_port: u16,
    /// HTTP path
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// Port the service listens on
    #[serde(skip_serializing_if = "is_default")]
    pub local_path_port: u16,
    /// `http` or `http2`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,
}

// =============================================================================
// Kinds
// =============================================================================

/// service-defaults
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceDefaultsEntry {
    /// Common fields
    #[serde(flatten)]
    pub header: EntryHeader,
    /// Protocol: `tcp`, `http`, `http2` or `grpc`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    /// Proxy mode
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mode: String,
    /// `strict` or `permissive`
    #[serde(rename = "MutualTLSMode", skip_serializing_if = "String::is_empty")]
    pub mutual_tls_mode: String,
    /// Inbound connection balancing
    #[serde(skip_serializing_if = "String::is_empty")]
    pub balance_inbound_connections: String,
    /// Maximum concurrent inbound connections
    #[serde(skip_serializing_if = "is_default")]
    pub max_inbound_connections: i64,
    /// Connect timeout to the local application
    #[serde(skip_serializing_if = "is_default")]
    pub local_connect_timeout_ms: i64,
    /// Request timeout to the local application
    #[serde(skip_serializing_if = "is_default")]
    pub local_request_timeout_ms: i64,
    /// SNI of an external service
    #[serde(rename = "ExternalSNI", alias = "ExternalSni", skip_serializing_if = "String::is_empty")]
    pub external_sni: String,
    /// Mesh gateway mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh_gateway: Option<MeshGatewayConfig>,
    /// Transparent proxy settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transparent_proxy: Option<TransparentProxyConfig>,
    /// Expose settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expose: Option<ExposeConfig>,
    /// Destination of a terminating-gateway service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<Value>,
    /// Upstream overrides and defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_config: Option<Value>,
    /// Fields not typed here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// proxy-defaults; the name is always `global`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProxyDefaultsEntry {
    /// Common fields
    #[serde(flatten)]
    pub header: EntryHeader,
    /// Opaque proxy configuration
    #[serde(skip_serializing_if = "Map::is_empty", deserialize_with = "null_as_default")]
    pub config: Map<String, Value>,
    /// Proxy mode
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mode: String,
    /// `strict` or `permissive`
    #[serde(rename = "MutualTLSMode", skip_serializing_if = "String::is_empty")]
    pub mutual_tls_mode: String,
    /// Mesh gateway mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh_gateway: Option<MeshGatewayConfig>,
    /// Transparent proxy settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transparent_proxy: Option<TransparentProxyConfig>,
    /// Expose settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expose: Option<ExposeConfig>,
    /// Access log settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_logs: Option<Value>,
    /// Fields not typed here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One route of a service-router
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceRoute {
    /// Request match criteria
    #[serde(rename = "Match", skip_serializing_if = "Option::is_none")]
    pub route_match: Option<Value>,
    /// Where matching requests go
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<Value>,
}

/// service-router
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceRouterEntry {
    /// Common fields
    #[serde(flatten)]
    pub header: EntryHeader,
    /// Routes, evaluated in order
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub routes: Vec<ServiceRoute>,
    /// Fields not typed here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One split of a service-splitter
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceSplit {
    /// Share of traffic, 0 to 100
    pub weight: f64,
    /// Target service
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service: String,
    /// Target subset
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_subset: String,
    /// Target namespace
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Target partition
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    /// Request header modifications
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_headers: Option<Value>,
    /// Response header modifications
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<Value>,
}

/// service-splitter
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceSplitterEntry {
    /// Common fields
    #[serde(flatten)]
    pub header: EntryHeader,
    /// Splits; weights add up to 100
    #[serde(deserialize_with = "null_as_default")]
    pub splits: Vec<ServiceSplit>,
    /// Fields not typed here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Subset of a service-resolver
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceResolverSubset {
    /// Filter expression selecting instances
    #[serde(skip_serializing_if = "String::is_empty")]
    pub filter: String,
    /// Only select passing instances
    #[serde(skip_serializing_if = "is_default")]
    pub only_passing: bool,
}

/// Redirect of a service-resolver
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceResolverRedirect {
    /// Target service
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service: String,
    /// Target subset
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_subset: String,
    /// Target namespace
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Target partition
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    /// Target datacenter
    #[serde(skip_serializing_if = "String::is_empty")]
    pub datacenter: String,
    /// Target peer
    #[serde(skip_serializing_if = "String::is_empty")]
    pub peer: String,
    /// Target sameness group
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sameness_group: String,
}

/// Explicit failover target
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FailoverTarget {
    /// Target service
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service: String,
    /// Target subset
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_subset: String,
    /// Target partition
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    /// Target namespace
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Target datacenter
    #[serde(skip_serializing_if = "String::is_empty")]
    pub datacenter: String,
    /// Target peer
    #[serde(skip_serializing_if = "String::is_empty")]
    pub peer: String,
}

/// Failover policy of one subset of a service-resolver
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceResolverFailover {
    /// Target service
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service: String,
    /// Target subset
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_subset: String,
    /// Target namespace
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Datacenters to fail over to, in order
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub datacenters: Vec<String>,
    /// Explicit targets
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub targets: Vec<FailoverTarget>,
    /// Sameness group to fail over to
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sameness_group: String,
}

/// service-resolver
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceResolverEntry {
    /// Common fields
    #[serde(flatten)]
    pub header: EntryHeader,
    /// Subset used when none is requested
    #[serde(skip_serializing_if = "String::is_empty")]
    pub default_subset: String,
    /// Subsets keyed by name
    #[serde(skip_serializing_if = "BTreeMap::is_empty", deserialize_with = "null_as_default")]
    pub subsets: BTreeMap<String, ServiceResolverSubset>,
    /// Redirect to another service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<ServiceResolverRedirect>,
    /// Failover policies keyed by subset name, `*` for all
    #[serde(skip_serializing_if = "BTreeMap::is_empty", deserialize_with = "null_as_default")]
    pub failover: BTreeMap<String, ServiceResolverFailover>,
    /// Connection timeout, e.g. `5s`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub connect_timeout: String,
    /// Request timeout, e.g. `15s`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub request_timeout: String,
    /// Load balancer policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancer: Option<Value>,
    /// Locality-aware routing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prioritize_by_locality: Option<Value>,
    /// Fields not typed here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One source of a service-intentions entry
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SourceIntention {
    /// Source service, `*` for all
    pub name: String,
    /// Source peer
    #[serde(skip_serializing_if = "String::is_empty")]
    pub peer: String,
    /// Source partition
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    /// Source namespace
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Source sameness group
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sameness_group: String,
    /// `allow` or `deny`; empty when permissions are given
    #[serde(skip_serializing_if = "String::is_empty")]
    pub action: String,
    /// L7 permissions
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub permissions: Vec<Value>,
    /// Evaluation precedence, computed by the remote
    #[serde(skip_serializing)]
    pub precedence: i64,
    /// Source type, always `consul`
    #[serde(rename = "Type", skip_serializing_if = "String::is_empty")]
    pub source_type: String,
    /// Free-form description
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// service-intentions
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceIntentionsEntry {
    /// Common fields
    #[serde(flatten)]
    pub header: EntryHeader,
    /// Sources, ordered by precedence on read
    #[serde(deserialize_with = "null_as_default")]
    pub sources: Vec<SourceIntention>,
    /// JWT requirements
    #[serde(rename = "JWT", alias = "Jwt", skip_serializing_if = "Option::is_none")]
    pub jwt: Option<Value>,
    /// Fields not typed here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Member of a sameness group
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SamenessGroupMember {
    /// Local partition
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    /// Cluster peer
    #[serde(skip_serializing_if = "String::is_empty")]
    pub peer: String,
}

/// sameness-group
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SamenessGroupEntry {
    /// Common fields
    #[serde(flatten)]
    pub header: EntryHeader,
    /// Use the group for failover by default
    #[serde(skip_serializing_if = "is_default")]
    pub default_for_failover: bool,
    /// Include the local partition
    #[serde(skip_serializing_if = "is_default")]
    pub include_local: bool,
    /// Members, in failover order
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub members: Vec<SamenessGroupMember>,
    /// Fields not typed here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Consumer of an exported service
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceConsumer {
    /// Local partition
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    /// Cluster peer
    #[serde(skip_serializing_if = "String::is_empty")]
    pub peer: String,
    /// Sameness group
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sameness_group: String,
}

/// Exported service and its consumers
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ExportedService {
    /// Service name, `*` for all
    pub name: String,
    /// Namespace of the service
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Consumers
    #[serde(deserialize_with = "null_as_default")]
    pub consumers: Vec<ServiceConsumer>,
}

/// exported-services; the name is the partition it applies to
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ExportedServicesEntry {
    /// Common fields
    #[serde(flatten)]
    pub header: EntryHeader,
    /// Exported services
    #[serde(deserialize_with = "null_as_default")]
    pub services: Vec<ExportedService>,
    /// Fields not typed here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Transparent proxy settings of the mesh
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MeshTransparentProxy {
    /// Only allow traffic to destinations in the mesh
    pub mesh_destinations_only: bool,
}

/// HTTP settings of the mesh
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MeshHttp {
    /// Strip the XFCC header
    pub sanitize_x_forwarded_client_cert: bool,
}

/// Peering settings of the mesh
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MeshPeering {
    /// Route peering control traffic through mesh gateways
    pub peer_through_mesh_gateways: bool,
}

/// mesh; the name is always `mesh`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MeshEntry {
    /// Common fields
    #[serde(flatten)]
    pub header: EntryHeader,
    /// Transparent proxy settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transparent_proxy: Option<MeshTransparentProxy>,
    /// Allow services to opt into permissive mTLS
    #[serde(rename = "AllowEnablingPermissiveMutualTLS", skip_serializing_if = "is_default")]
    pub allow_enabling_permissive_mutual_tls: bool,
    /// TLS settings
    #[serde(rename = "TLS", skip_serializing_if = "Option::is_none")]
    pub tls: Option<Value>,
    /// HTTP settings
    #[serde(rename = "HTTP", alias = "Http", skip_serializing_if = "Option::is_none")]
    pub http: Option<MeshHttp>,
    /// Peering settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peering: Option<MeshPeering>,
    /// Fields not typed here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// jwt-provider
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JwtProviderEntry {
    /// Common fields
    #[serde(flatten)]
    pub header: EntryHeader,
    /// Expected issuer
    #[serde(skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    /// Where the signing keys come from
    #[serde(rename = "JSONWebKeySet", alias = "JsonWebKeySet", skip_serializing_if = "Option::is_none")]
    pub json_web_key_set: Option<Value>,
    /// Accepted audiences
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub audiences: Vec<String>,
    /// Where tokens are read from
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub locations: Vec<Value>,
    /// Forwarding of verified tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forwarding: Option<Value>,
    /// Tolerated clock skew
    #[serde(skip_serializing_if = "is_default")]
    pub clock_skew_seconds: i64,
    /// Cache settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_config: Option<Value>,
    /// Fields not typed here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Service exposed on an ingress listener
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct IngressService {
    /// Service name, `*` for all
    pub name: String,
    /// Hosts routed to the service
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub hosts: Vec<String>,
    /// Namespace of the service
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Partition of the service
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
}

/// Listener of an ingress gateway
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct IngressListener {
    /// Port
    pub port: u16,
    /// Protocol
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    /// Services on the listener
    #[serde(deserialize_with = "null_as_default")]
    pub services: Vec<IngressService>,
    /// TLS settings of the listener
    #[serde(rename = "TLS", alias = "Tls", skip_serializing_if = "Option::is_none")]
    pub tls: Option<Value>,
}

/// ingress-gateway
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct IngressGatewayEntry {
    /// Common fields
    #[serde(flatten)]
    pub header: EntryHeader,
    /// Gateway TLS settings
    #[serde(rename = "TLS", alias = "Tls", skip_serializing_if = "Option::is_none")]
    pub tls: Option<Value>,
    /// Listeners
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub listeners: Vec<IngressListener>,
    /// Defaults for upstream clusters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Value>,
    /// Fields not typed here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Service linked to a terminating gateway
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LinkedService {
    /// Service name
    pub name: String,
    /// Namespace of the service
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// CA file used to verify the service
    #[serde(rename = "CAFile", alias = "CaFile", skip_serializing_if = "String::is_empty")]
    pub ca_file: String,
    /// Client certificate presented to the service
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cert_file: String,
    /// Client key presented to the service
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key_file: String,
    /// SNI sent to the service
    #[serde(rename = "SNI", alias = "Sni", skip_serializing_if = "String::is_empty")]
    pub sni: String,
}

/// terminating-gateway
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TerminatingGatewayEntry {
    /// Common fields
    #[serde(flatten)]
    pub header: EntryHeader,
    /// Linked services
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub services: Vec<LinkedService>,
    /// Fields not typed here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Entry of a kind without a typed variant
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GenericEntry {
    /// Wire kind
    #[serde(skip)]
    pub kind: String,
    /// Common fields
    #[serde(flatten)]
    pub header: EntryHeader,
    /// Kind-specific body
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

// =============================================================================
// The sum type
// =============================================================================

/// A config entry of any kind
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigEntry {
    /// service-defaults
    ServiceDefaults(ServiceDefaultsEntry),
    /// proxy-defaults
    ProxyDefaults(ProxyDefaultsEntry),
    /// service-router
    ServiceRouter(ServiceRouterEntry),
    /// service-splitter
    ServiceSplitter(ServiceSplitterEntry),
    /// service-resolver
    ServiceResolver(ServiceResolverEntry),
    /// service-intentions
    ServiceIntentions(ServiceIntentionsEntry),
    /// sameness-group
    SamenessGroup(SamenessGroupEntry),
    /// exported-services
    ExportedServices(ExportedServicesEntry),
    /// mesh
    Mesh(MeshEntry),
    /// jwt-provider
    JwtProvider(JwtProviderEntry),
    /// ingress-gateway
    IngressGateway(IngressGatewayEntry),
    /// terminating-gateway
    TerminatingGateway(TerminatingGatewayEntry),
    /// Any other kind
    Other(GenericEntry),
}

impl ConfigEntry {
    /// Wire kind
    pub fn kind(&self) -> &str {
        match self {
            Self::ServiceDefaults(_) => kind::SERVICE_DEFAULTS,
            Self::ProxyDefaults(_) => kind::PROXY_DEFAULTS,
            Self::ServiceRouter(_) => kind::SERVICE_ROUTER,
            Self::ServiceSplitter(_) => kind::SERVICE_SPLITTER,
            Self::ServiceResolver(_) => kind::SERVICE_RESOLVER,
            Self::ServiceIntentions(_) => kind::SERVICE_INTENTIONS,
            Self::SamenessGroup(_) => kind::SAMENESS_GROUP,
            Self::ExportedServices(_) => kind::EXPORTED_SERVICES,
            Self::Mesh(_) => kind::MESH,
            Self::JwtProvider(_) => kind::JWT_PROVIDER,
            Self::IngressGateway(_) => kind::INGRESS_GATEWAY,
            Self::TerminatingGateway(_) => kind::TERMINATING_GATEWAY,
            Self::Other(e) => &e.kind,
        }
    }

    /// Common fields
    pub fn header(&self) -> &EntryHeader {
        match self {
            Self::ServiceDefaults(e) => &e.header,
            Self::ProxyDefaults(e) => &e.header,
            Self::ServiceRouter(e) => &e.header,
            Self::ServiceSplitter(e) => &e.header,
            Self::ServiceResolver(e) => &e.header,
            Self::ServiceIntentions(e) => &e.header,
            Self::SamenessGroup(e) => &e.header,
            Self::ExportedServices(e) => &e.header,
            Self::Mesh(e) => &e.header,
            Self::JwtProvider(e) => &e.header,
            Self::IngressGateway(e) => &e.header,
            Self::TerminatingGateway(e) => &e.header,
            Self::Other(e) => &e.header,
        }
    }

    /// Common fields, mutably
    pub fn header_mut(&mut self) -> &mut EntryHeader {
        match self {
            Self::ServiceDefaults(e) => &mut e.header,
            Self::ProxyDefaults(e) => &mut e.header,
            Self::ServiceRouter(e) => &mut e.header,
            Self::ServiceSplitter(e) => &mut e.header,
            Self::ServiceResolver(e) => &mut e.header,
            Self::ServiceIntentions(e) => &mut e.header,
            Self::SamenessGroup(e) => &mut e.header,
            Self::ExportedServices(e) => &mut e.header,
            Self::Mesh(e) => &mut e.header,
            Self::JwtProvider(e) => &mut e.header,
            Self::IngressGateway(e) => &mut e.header,
            Self::TerminatingGateway(e) => &mut e.header,
            Self::Other(e) => &mut e.header,
        }
    }

    /// Entry name
    pub fn name(&self) -> &str {
        &self.header().name
    }

    /// Decode a wire document, dispatching on its `Kind`
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(Error::serialization("config entry must be a JSON object"));
        };
        let kind = match map.remove("Kind") {
            Some(Value::String(kind)) if !kind.is_empty() => kind,
            _ => return Err(Error::serialization("config entry has no Kind")),
        };
        Self::from_parts(&kind, Value::Object(map))
    }

    /// Decode a wire document of a known kind
    ///
    /// A `Kind` field in the body is ignored.
    pub fn from_parts(kind: &str, body: Value) -> Result<Self> {
        let body = match body {
            Value::Object(mut map) => {
                map.remove("Kind");
                Value::Object(map)
            }
            other => other,
        };
        fn de<T: serde::de::DeserializeOwned>(kind: &str, body: Value) -> Result<T> {
            serde_json::from_value(body)
                .map_err(|e| Error::serialization(format!("invalid {kind} config entry: {e}")))
        }
        Ok(match kind {
            kind::SERVICE_DEFAULTS => Self::ServiceDefaults(de(kind, body)?),
            kind::PROXY_DEFAULTS => Self::ProxyDefaults(de(kind, body)?),
            kind::SERVICE_ROUTER => Self::ServiceRouter(de(kind, body)?),
            kind::SERVICE_SPLITTER => Self::ServiceSplitter(de(kind, body)?),
            kind::SERVICE_RESOLVER => Self::ServiceResolver(de(kind, body)?),
            kind::SERVICE_INTENTIONS => Self::ServiceIntentions(de(kind, body)?),
            kind::SAMENESS_GROUP => Self::SamenessGroup(de(kind, body)?),
            kind::EXPORTED_SERVICES => Self::ExportedServices(de(kind, body)?),
            kind::MESH => Self::Mesh(de(kind, body)?),
            kind::JWT_PROVIDER => Self::JwtProvider(de(kind, body)?),
            kind::INGRESS_GATEWAY => Self::IngressGateway(de(kind, body)?),
            kind::TERMINATING_GATEWAY => Self::TerminatingGateway(de(kind, body)?),
            other => {
                let mut entry: GenericEntry = de(other, body)?;
                entry.kind = other.to_string();
                Self::Other(entry)
            }
        })
    }

    /// Encode as a wire document including `Kind`
    pub fn to_value(&self) -> Result<Value> {
        let body = match self {
            Self::ServiceDefaults(e) => serde_json::to_value(e),
            Self::ProxyDefaults(e) => serde_json::to_value(e),
            Self::ServiceRouter(e) => serde_json::to_value(e),
            Self::ServiceSplitter(e) => serde_json::to_value(e),
            Self::ServiceResolver(e) => serde_json::to_value(e),
            Self::ServiceIntentions(e) => serde_json::to_value(e),
            Self::SamenessGroup(e) => serde_json::to_value(e),
            Self::ExportedServices(e) => serde_json::to_value(e),
            Self::Mesh(e) => serde_json::to_value(e),
            Self::JwtProvider(e) => serde_json::to_value(e),
            Self::IngressGateway(e) => serde_json::to_value(e),
            Self::TerminatingGateway(e) => serde_json::to_value(e),
            Self::Other(e) => serde_json::to_value(e),
        }?;
        let Value::Object(mut map) = body else {
            return Err(Error::serialization("config entry did not encode as an object"));
        };
        map.insert("Kind".to_string(), Value::String(self.kind().to_string()));
        Ok(Value::Object(map))
    }
}

impl Serialize for ConfigEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ConfigEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn service_defaults_encode_empty_blocks_and_drop_empty_meta() {
        let entry = ConfigEntry::from_value(json!({
            "Kind": "service-defaults",
            "Name": "foo",
            "Meta": {},
            "Protocol": "http",
            "Expose": {},
            "MeshGateway": {},
            "TransparentProxy": {}
        }))
        .unwrap();
        assert_eq!(entry.kind(), "service-defaults");
        assert_eq!(
            entry.to_value().unwrap(),
            json!({
                "Kind": "service-defaults",
                "Name": "foo",
                "Protocol": "http",
                "Expose": {},
                "MeshGateway": {},
                "TransparentProxy": {}
            })
        );
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let doc = json!({
            "Kind": "service-defaults",
            "Name": "web",
            "RateLimits": {"InstanceLevel": {"RequestsPerSecond": 10}},
            "ModifyIndex": 77
        });
        let entry: ConfigEntry = serde_json::from_value(doc).unwrap();
        assert_eq!(entry.header().modify_index, 77);
        let out = serde_json::to_value(&entry).unwrap();
        assert_eq!(out["RateLimits"]["InstanceLevel"]["RequestsPerSecond"], 10);
        assert!(out.get("ModifyIndex").is_none());
    }

    #[test]
    fn unknown_kinds_become_generic_entries() {
        let entry = ConfigEntry::from_value(json!({
            "Kind": "api-gateway",
            "Name": "gw",
            "Namespace": "edge",
            "Listeners": [{"Name": "l1", "Port": 8443}]
        }))
        .unwrap();
        match &entry {
            ConfigEntry::Other(e) => {
                assert_eq!(e.kind, "api-gateway");
                assert_eq!(e.header.namespace, "edge");
                assert!(e.body.contains_key("Listeners"));
            }
            other => panic!("expected generic entry, got {other:?}"),
        }
        assert_eq!(entry.to_value().unwrap()["Kind"], "api-gateway");
    }

    #[test]
    fn documents_without_kind_are_rejected() {
        assert!(ConfigEntry::from_value(json!({"Name": "x"})).is_err());
        assert!(ConfigEntry::from_value(json!("x")).is_err());
    }

    #[test]
    fn acronym_fields_accept_formatted_spellings() {
        let entry = ConfigEntry::from_parts(
            kind::MESH,
            json!({"Name": "mesh", "Http": {"SanitizeXForwardedClientCert": true}}),
        )
        .unwrap();
        let out = entry.to_value().unwrap();
        assert_eq!(out["HTTP"]["SanitizeXForwardedClientCert"], true);

        let entry = ConfigEntry::from_parts(
            kind::TERMINATING_GATEWAY,
            json!({"Name": "tgw", "Services": [{"Name": "billing", "CaFile": "/ca.pem", "Sni": "b.example"}]}),
        )
        .unwrap();
        let out = entry.to_value().unwrap();
        assert_eq!(out["Services"][0]["CAFile"], "/ca.pem");
        assert_eq!(out["Services"][0]["SNI"], "b.example");
    }

    #[test]
    fn resolver_subsets_and_failover_are_maps() {
        let entry = ConfigEntry::from_parts(
            kind::SERVICE_RESOLVER,
            json!({
                "Name": "web",
                "DefaultSubset": "v1",
                "Subsets": {"v1": {"Filter": "Service.Meta.version == v1", "OnlyPassing": true}},
                "Failover": {"*": {"Datacenters": ["dc2", "dc3"]}},
                "ConnectTimeout": "5s"
            }),
        )
        .unwrap();
        let ConfigEntry::ServiceResolver(resolver) = &entry else {
            panic!("expected resolver");
        };
        assert!(resolver.subsets["v1"].only_passing);
        assert_eq!(resolver.failover["*"].datacenters, vec!["dc2", "dc3"]);
        assert_eq!(resolver.connect_timeout, "5s");
    }

    #[test]
    fn every_typed_kind_decodes_from_a_minimal_document() {
        for k in kind::ALL {
            let entry = ConfigEntry::from_parts(k, json!({"Name": "x"})).unwrap();
            assert_eq!(entry.kind(), *k);
            assert!(!matches!(entry, ConfigEntry::Other(_)));
            assert_eq!(entry.name(), "x");
        }
    }
}
