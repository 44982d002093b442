//! Prepared query wire objects

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::acl::null_as_default;

/// Failover policy of a prepared query
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QueryFailover {
    /// Number of nearest remote datacenters to try
    #[serde(rename = "NearestN")]
    pub nearest_n: u32,
    /// Datacenters to try, in order
    #[serde(deserialize_with = "null_as_default")]
    pub datacenters: Vec<String>,
    /// Explicit failover targets
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub targets: Vec<QueryFailoverTarget>,
}

/// One explicit failover target
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QueryFailoverTarget {
    /// Cluster peer
    #[serde(skip_serializing_if = "String::is_empty")]
    pub peer: String,
    /// Datacenter
    #[serde(skip_serializing_if = "String::is_empty")]
    pub datacenter: String,
}

/// Service part of a prepared query
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceQuery {
    /// Service name
    pub service: String,
    /// Failover policy
    pub failover: QueryFailover,
    /// Only return passing instances
    pub only_passing: bool,
    /// Checks ignored when filtering
    #[serde(rename = "IgnoreCheckIDs", deserialize_with = "null_as_default")]
    pub ignore_check_ids: Vec<String>,
    /// Sort by distance to this node
    pub near: String,
    /// Tag filter; `!tag` excludes
    #[serde(deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    /// Node meta filter
    #[serde(deserialize_with = "null_as_default")]
    pub node_meta: BTreeMap<String, String>,
    /// Service meta filter
    #[serde(deserialize_with = "null_as_default")]
    pub service_meta: BTreeMap<String, String>,
    /// Only return Connect-capable instances
    pub connect: bool,
    /// Namespace of the service
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

/// DNS settings of a prepared query
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QueryDns {
    /// TTL of DNS answers
    #[serde(rename = "TTL", alias = "Ttl")]
    pub ttl: String,
}

/// Template settings of a prepared query
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QueryTemplate {
    /// `name_prefix_match`
    #[serde(rename = "Type")]
    pub template_type: String,
    /// Regexp applied to the query name
    pub regexp: String,
    /// Drop empty tags after interpolation
    pub remove_empty_tags: bool,
}

/// Prepared query
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PreparedQuery {
    /// Query ID, assigned by the remote
    #[serde(rename = "ID", skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Name; doubles as the DNS label
    pub name: String,
    /// Session whose invalidation removes the query
    pub session: String,
    /// Token the query runs with
    pub token: String,
    /// Service part
    pub service: ServiceQuery,
    /// DNS settings
    #[serde(rename = "DNS", alias = "Dns")]
    pub dns: QueryDns,
    /// Template settings
    pub template: QueryTemplate,
}

impl std::fmt::Debug for PreparedQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedQuery")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("session", &self.session)
            .field("token", &"<redacted>")
            .field("service", &self.service)
            .field("dns", &self.dns)
            .field("template", &self.template)
            .finish()
    }
}

/// Response of `POST /query`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QueryCreated {
    /// ID of the new query
    #[serde(rename = "ID")]
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_uses_wire_acronyms() {
        let q = PreparedQuery {
            name: "web".into(),
            service: ServiceQuery {
                service: "web".into(),
                failover: QueryFailover {
                    nearest_n: 3,
                    ..Default::default()
                },
                ..Default::default()
            },
            dns: QueryDns { ttl: "10s".into() },
            ..Default::default()
        };
        let v = serde_json::to_value(&q).unwrap();
        assert_eq!(v["DNS"]["TTL"], "10s");
        assert_eq!(v["Service"]["Failover"]["NearestN"], 3);
        assert!(v["Service"]["Failover"].get("Targets").is_none());
    }

    #[test]
    fn token_is_redacted_in_debug() {
        let q = PreparedQuery {
            token: "secret-token".into(),
            ..Default::default()
        };
        assert!(!format!("{q:?}").contains("secret-token"));
    }

    #[test]
    fn nulls_decode_as_empty() {
        let q: PreparedQuery = serde_json::from_value(json!({
            "ID": "q-1",
            "Service": {"Service": "db", "Tags": null, "Failover": {"NearestN": 2, "Datacenters": null}}
        }))
        .unwrap();
        assert!(q.service.tags.is_empty());
        assert_eq!(q.service.failover.nearest_n, 2);
    }
}
