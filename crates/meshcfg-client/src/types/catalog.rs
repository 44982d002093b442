//! Catalog and health wire objects

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::acl::null_as_default;

/// Service as registered on a node
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AgentService {
    /// Service instance ID, unique per node
    #[serde(rename = "ID")]
    pub id: String,
    /// Service name
    pub service: String,
    /// Tags
    #[serde(deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    /// Meta
    #[serde(deserialize_with = "null_as_default")]
    pub meta: BTreeMap<String, String>,
    /// Port
    pub port: u16,
    /// Address; the node's when empty
    pub address: String,
    /// Allow external tag changes
    pub enable_tag_override: bool,
    /// Namespace
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Admin partition
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
}

/// Probe definition of a catalog health check
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HealthCheckDefinition {
    /// URL of an HTTP probe
    #[serde(rename = "HTTP", skip_serializing_if = "String::is_empty")]
    pub http: String,
    /// Headers of an HTTP probe
    #[serde(skip_serializing_if = "BTreeMap::is_empty", deserialize_with = "null_as_default")]
    pub header: BTreeMap<String, Vec<String>>,
    /// Method of an HTTP probe
    #[serde(skip_serializing_if = "String::is_empty")]
    pub method: String,
    /// Body of an HTTP probe
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body: String,
    /// SNI sent by an HTTP probe
    #[serde(rename = "TLSServerName", skip_serializing_if = "String::is_empty")]
    pub tls_server_name: String,
    /// Skip TLS verification of an HTTP probe
    #[serde(rename = "TLSSkipVerify")]
    pub tls_skip_verify: bool,
    /// `host:port` of a TCP probe
    #[serde(rename = "TCP", skip_serializing_if = "String::is_empty")]
    pub tcp: String,
    /// Probe interval
    #[serde(skip_serializing_if = "String::is_empty")]
    pub interval: String,
    /// Probe timeout
    #[serde(skip_serializing_if = "String::is_empty")]
    pub timeout: String,
    /// Deregister the service after being critical this long
    #[serde(skip_serializing_if = "String::is_empty")]
    pub deregister_critical_service_after: String,
}

/// Health check bound to a node or service
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HealthCheck {
    /// Node name
    pub node: String,
    /// Check ID
    #[serde(rename = "CheckID")]
    pub check_id: String,
    /// Check name
    pub name: String,
    /// `passing`, `warning` or `critical`
    pub status: String,
    /// Free-form notes
    pub notes: String,
    /// Output of the last probe
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output: String,
    /// Service instance the check belongs to
    #[serde(rename = "ServiceID")]
    pub service_id: String,
    /// Service name the check belongs to
    pub service_name: String,
    /// Probe definition
    pub definition: HealthCheckDefinition,
    /// Namespace
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

/// Body of `PUT /catalog/register`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CatalogRegistration {
    /// Node ID
    #[serde(rename = "ID", skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Node name
    pub node: String,
    /// Node address
    pub address: String,
    /// Tagged addresses of the node
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tagged_addresses: BTreeMap<String, String>,
    /// Node meta
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub node_meta: BTreeMap<String, String>,
    /// Datacenter
    #[serde(skip_serializing_if = "String::is_empty")]
    pub datacenter: String,
    /// Service to register on the node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<AgentService>,
    /// Checks to register
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<HealthCheck>,
    /// Leave the node's fields untouched
    pub skip_node_update: bool,
    /// Admin partition
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
}

/// Body of `PUT /catalog/deregister`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CatalogDeregistration {
    /// Node name
    pub node: String,
    /// Service instance to remove; the whole node when empty
    #[serde(rename = "ServiceID", skip_serializing_if = "String::is_empty")]
    pub service_id: String,
    /// Check to remove
    #[serde(rename = "CheckID", skip_serializing_if = "String::is_empty")]
    pub check_id: String,
    /// Datacenter
    #[serde(skip_serializing_if = "String::is_empty")]
    pub datacenter: String,
    /// Namespace
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Admin partition
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
}

/// Catalog node
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Node {
    /// Node ID
    #[serde(rename = "ID")]
    pub id: String,
    /// Node name
    pub node: String,
    /// Address
    pub address: String,
    /// Datacenter
    pub datacenter: String,
    /// Tagged addresses
    #[serde(deserialize_with = "null_as_default")]
    pub tagged_addresses: BTreeMap<String, String>,
    /// Meta
    #[serde(deserialize_with = "null_as_default")]
    pub meta: BTreeMap<String, String>,
    /// Admin partition
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
}

/// Response of `GET /catalog/node/<name>`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CatalogNode {
    /// The node; absent when it is not registered
    pub node: Option<Node>,
    /// Services on the node keyed by instance ID
    #[serde(deserialize_with = "null_as_default")]
    pub services: BTreeMap<String, AgentService>,
}

/// One element of `GET /catalog/service/<name>`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CatalogService {
    /// Node ID
    #[serde(rename = "ID")]
    pub id: String,
    /// Node name
    pub node: String,
    /// Node address
    pub address: String,
    /// Datacenter
    pub datacenter: String,
    /// Node tagged addresses
    #[serde(deserialize_with = "null_as_default")]
    pub tagged_addresses: BTreeMap<String, String>,
    /// Node meta
    #[serde(deserialize_with = "null_as_default")]
    pub node_meta: BTreeMap<String, String>,
    /// Service instance ID
    #[serde(rename = "ServiceID")]
    pub service_id: String,
    /// Service name
    pub service_name: String,
    /// Service address
    pub service_address: String,
    /// Service tags
    #[serde(deserialize_with = "null_as_default")]
    pub service_tags: Vec<String>,
    /// Service meta
    #[serde(deserialize_with = "null_as_default")]
    pub service_meta: BTreeMap<String, String>,
    /// Service port
    pub service_port: u16,
    /// Allow external tag changes
    pub service_enable_tag_override: bool,
    /// Namespace
    pub namespace: String,
    /// Admin partition
    pub partition: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registration_omits_empty_parts() {
        let reg = CatalogRegistration {
            node: "web-1".into(),
            address: "10.0.0.5".into(),
            skip_node_update: true,
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&reg).unwrap(),
            json!({"Node": "web-1", "Address": "10.0.0.5", "SkipNodeUpdate": true})
        );
    }

    #[test]
    fn check_definition_uses_acronym_keys() {
        let def = HealthCheckDefinition {
            http: "http://localhost:8080/health".into(),
            tls_skip_verify: true,
            interval: "10s".into(),
            ..Default::default()
        };
        let v = serde_json::to_value(&def).unwrap();
        assert_eq!(v["HTTP"], "http://localhost:8080/health");
        assert_eq!(v["TLSSkipVerify"], true);
        assert!(v.get("TCP").is_none());
    }

    #[test]
    fn catalog_node_decodes_missing_node() {
        let node: CatalogNode = serde_json::from_value(json!(null)).unwrap_or_default();
        assert!(node.node.is_none());
        let node: CatalogNode = serde_json::from_value(json!({
            "Node": {"Node": "n1", "Address": "10.0.0.1", "Meta": null},
            "Services": {"web": {"ID": "web", "Service": "web", "Port": 80}}
        }))
        .unwrap();
        assert_eq!(node.node.unwrap().address, "10.0.0.1");
        assert_eq!(node.services["web"].port, 80);
    }
}
