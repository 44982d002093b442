//! ACL wire objects

use serde::{Deserialize, Serialize};

/// Reference to a policy or role, by ID or name
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AclLink {
    /// Object ID
    #[serde(rename = "ID", skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Object name
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl AclLink {
    /// Whether this link refers to the given ID or name
    pub fn matches(&self, id_or_name: &str) -> bool {
        (!self.id.is_empty() && self.id == id_or_name)
            || (!self.name.is_empty() && self.name == id_or_name)
    }
}

/// Service identity granted to a role or token
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceIdentity {
    /// Service name
    pub service_name: String,
    /// Datacenters the identity is valid in; all when empty
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub datacenters: Vec<String>,
}

/// Node identity granted to a role or token
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NodeIdentity {
    /// Node name
    pub node_name: String,
    /// Datacenter the node lives in
    pub datacenter: String,
}

/// ACL policy
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AclPolicy {
    /// Policy ID, assigned by the remote
    #[serde(rename = "ID", skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Unique name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Rules in the remote's policy language
    pub rules: String,
    /// Datacenters the policy applies in; all when empty
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub datacenters: Vec<String>,
    /// Namespace
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Admin partition
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    /// Raft index of creation
    #[serde(skip_serializing)]
    pub create_index: u64,
    /// Raft index of the last modification
    #[serde(skip_serializing)]
    pub modify_index: u64,
}

/// ACL role
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AclRole {
    /// Role ID, assigned by the remote
    #[serde(rename = "ID", skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Unique name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Linked policies
    #[serde(deserialize_with = "null_as_default")]
    pub policies: Vec<AclLink>,
    /// Granted service identities
    #[serde(deserialize_with = "null_as_default")]
    pub service_identities: Vec<ServiceIdentity>,
    /// Granted node identities
    #[serde(deserialize_with = "null_as_default")]
    pub node_identities: Vec<NodeIdentity>,
    /// Namespace
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Admin partition
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    /// Raft index of creation
    #[serde(skip_serializing)]
    pub create_index: u64,
    /// Raft index of the last modification
    #[serde(skip_serializing)]
    pub modify_index: u64,
}

/// ACL token
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AclToken {
    /// Public accessor ID
    #[serde(rename = "AccessorID", skip_serializing_if = "String::is_empty")]
    pub accessor_id: String,
    /// Secret used to authenticate
    #[serde(rename = "SecretID", skip_serializing_if = "String::is_empty")]
    pub secret_id: String,
    /// Free-form description
    pub description: String,
    /// Linked policies
    #[serde(deserialize_with = "null_as_default")]
    pub policies: Vec<AclLink>,
    /// Linked roles
    #[serde(deserialize_with = "null_as_default")]
    pub roles: Vec<AclLink>,
    /// Granted service identities
    #[serde(deserialize_with = "null_as_default")]
    pub service_identities: Vec<ServiceIdentity>,
    /// Granted node identities
    #[serde(deserialize_with = "null_as_default")]
    pub node_identities: Vec<NodeIdentity>,
    /// Valid only in the datacenter it was created in
    pub local: bool,
    /// RFC 3339 expiration, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<String>,
    /// Namespace
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Admin partition
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    /// Raft index of creation
    #[serde(skip_serializing)]
    pub create_index: u64,
    /// Raft index of the last modification
    #[serde(skip_serializing)]
    pub modify_index: u64,
}

impl std::fmt::Debug for AclToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AclToken")
            .field("accessor_id", &self.accessor_id)
            .field("secret_id", &"<redacted>")
            .field("description", &self.description)
            .field("policies", &self.policies)
            .field("roles", &self.roles)
            .field("local", &self.local)
            .field("namespace", &self.namespace)
            .field("partition", &self.partition)
            .finish()
    }
}

/// Status of ACL replication in this datacenter
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AclReplicationStatus {
    /// Whether replication is enabled
    pub enabled: bool,
    /// Whether the replication routine is running
    pub running: bool,
    /// Primary datacenter being replicated from
    pub source_datacenter: String,
    /// `policies`, `tokens` or empty
    pub replication_type: String,
    /// Replicated policy index
    pub replicated_index: u64,
    /// Replicated role index
    pub replicated_role_index: u64,
    /// Replicated token index
    pub replicated_token_index: u64,
}

/// Namespace selection rule of an auth method
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NamespaceRule {
    /// Selector matched against the login identity
    pub selector: String,
    /// Namespace the token is bound to
    pub bind_namespace: String,
}

/// ACL auth method
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AclAuthMethod {
    /// Unique name
    pub name: String,
    /// Method type: `kubernetes`, `jwt`, `oidc`, ...
    #[serde(rename = "Type")]
    pub method_type: String,
    /// Name shown in UIs
    #[serde(skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    /// Free-form description
    pub description: String,
    /// Maximum lifetime of tokens created through this method
    #[serde(rename = "MaxTokenTTL", alias = "MaxTokenTtl", skip_serializing_if = "String::is_empty")]
    pub max_token_ttl: String,
    /// `local` or `global`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token_locality: String,
    /// Method-specific configuration
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub config: serde_json::Map<String, serde_json::Value>,
    /// Namespace selection rules
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub namespace_rules: Vec<NamespaceRule>,
    /// Namespace
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Admin partition
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
}

/// ACL binding rule
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AclBindingRule {
    /// Rule ID, assigned by the remote
    #[serde(rename = "ID", skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Free-form description
    pub description: String,
    /// Auth method the rule belongs to
    pub auth_method: String,
    /// Selector matched against the login identity
    pub selector: String,
    /// `service`, `node`, `role` or `policy`
    pub bind_type: String,
    /// Name bound, may interpolate identity fields
    pub bind_name: String,
    /// Namespace
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Admin partition
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
}

/// Deserialize `null` as the type's default value
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
