//! Operator wire objects: autopilot, network areas, license and the Connect CA

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::acl::null_as_default;

/// Autopilot configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AutopilotConfiguration {
    /// Remove dead servers when new ones join
    pub cleanup_dead_servers: bool,
    /// Maximum time since the leader's last contact, e.g. `200ms`
    pub last_contact_threshold: String,
    /// Maximum number of log entries a server may trail by
    pub max_trailing_logs: u64,
    /// Minimum number of servers before dead servers are pruned
    pub min_quorum: u32,
    /// Time a new server must be healthy before it votes
    pub server_stabilization_time: String,
    /// Node meta key holding the redundancy zone
    pub redundancy_zone_tag: String,
    /// Disable upgrade migrations
    pub disable_upgrade_migration: bool,
    /// Node meta key holding the version used for upgrades
    pub upgrade_version_tag: String,
    /// Raft index of creation
    #[serde(skip_serializing)]
    pub create_index: u64,
    /// Raft index of the last modification
    #[serde(skip_serializing)]
    pub modify_index: u64,
}

/// Network area joining this datacenter with a peer datacenter
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Area {
    /// Area ID, assigned by the remote
    #[serde(rename = "ID", skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Datacenter on the other side
    pub peer_datacenter: String,
    /// Server addresses to join
    #[serde(deserialize_with = "null_as_default")]
    pub retry_join: Vec<String>,
    /// Use TLS for area traffic
    #[serde(rename = "UseTLS")]
    pub use_tls: bool,
}

/// Response of `POST /operator/area`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AreaCreated {
    /// ID of the new area
    #[serde(rename = "ID")]
    pub id: String,
}

/// Installed license
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct License {
    /// License ID
    #[serde(rename = "LicenseID", alias = "LicenseId")]
    pub license_id: String,
    /// Customer ID
    #[serde(rename = "CustomerID", alias = "CustomerId")]
    pub customer_id: String,
    /// Installation ID
    #[serde(rename = "InstallationID", alias = "InstallationId")]
    pub installation_id: String,
    /// Issue time
    pub issue_time: String,
    /// Start of validity
    pub start_time: String,
    /// End of validity
    pub expiration_time: String,
    /// Product name
    pub product: String,
    /// Licensed features
    #[serde(deserialize_with = "null_as_default")]
    pub features: Vec<String>,
    /// Additional flags
    #[serde(deserialize_with = "null_as_default")]
    pub flags: Map<String, Value>,
}

/// Response of the license endpoints
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LicenseReply {
    /// Whether the license is currently valid
    pub valid: bool,
    /// The license
    pub license: Option<License>,
    /// Warnings raised by the server
    #[serde(deserialize_with = "null_as_default")]
    pub warnings: Vec<String>,
}

/// Connect CA configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CaConfig {
    /// Provider: `consul`, `vault` or `aws-pca`
    pub provider: String,
    /// Provider configuration
    #[serde(deserialize_with = "null_as_default")]
    pub config: Map<String, Value>,
    /// Rotate without cross-signing
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub force_without_cross_signing: bool,
    /// Raft index of creation
    #[serde(skip_serializing)]
    pub create_index: u64,
    /// Raft index of the last modification
    #[serde(skip_serializing)]
    pub modify_index: u64,
}
