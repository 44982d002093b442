//! V2 resource wire objects
//!
//! V2 resources are served under `/api/<group>/<version>/<kind>/<name>` and
//! use camelCase keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type of a V2 resource
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceType {
    /// API group, e.g. `multicluster`
    pub group: String,
    /// Group version, e.g. `v2`
    pub group_version: String,
    /// Kind, e.g. `ExportedServices`
    pub kind: String,
}

/// Tenancy of a V2 resource
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tenancy {
    /// Admin partition
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    /// Namespace
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

/// ID of a V2 resource
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceId {
    /// Name
    pub name: String,
    /// Type
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Tenancy
    pub tenancy: Tenancy,
    /// Unique ID, assigned by the remote
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uid: String,
}

/// A V2 resource with its data
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct V2Resource {
    /// Resource ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,
    /// Version used for optimistic concurrency
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Generation, assigned by the remote
    #[serde(skip_serializing_if = "String::is_empty")]
    pub generation: String,
    /// Metadata
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Kind-specific payload
    pub data: Value,
}

/// Consumer of V2 exported services
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportedServicesConsumer {
    /// Cluster peer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,
    /// Admin partition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    /// Sameness group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sameness_group: Option<String>,
}

/// Payload of the V2 exported-services kinds
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportedServicesData {
    /// Exported services; only used by the `ExportedServices` kind
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
    /// Consumers
    pub consumers: Vec<ExportedServicesConsumer>,
}
