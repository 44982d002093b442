//! Namespace and admin partition wire objects

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::acl::{null_as_default, AclLink};

/// Default ACL links applied to tokens in a namespace
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NamespaceAclConfig {
    /// Policies linked to every token in the namespace
    #[serde(deserialize_with = "null_as_default")]
    pub policy_defaults: Vec<AclLink>,
    /// Roles linked to every token in the namespace
    #[serde(deserialize_with = "null_as_default")]
    pub role_defaults: Vec<AclLink>,
}

/// Namespace
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Namespace {
    /// Unique name within the partition
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Default ACL links
    #[serde(rename = "ACLs", skip_serializing_if = "Option::is_none")]
    pub acls: Option<NamespaceAclConfig>,
    /// Meta
    #[serde(skip_serializing_if = "BTreeMap::is_empty", deserialize_with = "null_as_default")]
    pub meta: BTreeMap<String, String>,
    /// Admin partition
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    /// Set while the namespace is being deleted
    #[serde(skip_serializing)]
    pub deleted_at: Option<String>,
    /// Raft index of the last modification
    #[serde(skip_serializing)]
    pub modify_index: u64,
}

impl Namespace {
    /// Whether the remote is tearing the namespace down
    pub fn is_deleting(&self) -> bool {
        self.deleted_at.as_deref().is_some_and(|d| !d.is_empty())
    }
}

/// Admin partition
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Partition {
    /// Unique name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Disable gossip for the partition's clients
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disable_gossip: bool,
    /// Set while the partition is being deleted
    #[serde(skip_serializing)]
    pub deleted_at: Option<String>,
    /// Raft index of the last modification
    #[serde(skip_serializing)]
    pub modify_index: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn namespace_acl_block_uses_wire_name() {
        let ns = Namespace {
            name: "team-a".into(),
            acls: Some(NamespaceAclConfig {
                policy_defaults: vec![AclLink {
                    name: "read-all".into(),
                    ..Default::default()
                }],
                role_defaults: vec![],
            }),
            ..Default::default()
        };
        let v = serde_json::to_value(&ns).unwrap();
        assert_eq!(v["ACLs"]["PolicyDefaults"][0]["Name"], "read-all");
        assert!(v.get("DeletedAt").is_none());
    }

    #[test]
    fn deleting_namespaces_are_detected() {
        let ns: Namespace =
            serde_json::from_value(json!({"Name": "a", "DeletedAt": "2024-01-01T00:00:00Z"})).unwrap();
        assert!(ns.is_deleting());
        let ns: Namespace = serde_json::from_value(json!({"Name": "a"})).unwrap();
        assert!(!ns.is_deleting());
    }
}
