//! ACL resources: policies, roles, tokens, auth methods, binding rules,
//! attachments and agent tokens
//!
//! Policy, role and token writes wait for ACL replication before reading
//! back; see [`crate::replication`].

pub mod agent_token;
pub mod attachment;
pub mod auth_method;
pub mod binding_rule;
pub mod bootstrap;
pub mod policy;
pub mod role;
pub mod token;

use serde_json::{Map, Value};

use meshcfg_client::types::{AclLink, NodeIdentity, ServiceIdentity};
use meshcfg_common::{Attribute, AttributeType, Error, Identity, ResourceData, Result, Schema};

use crate::resource::Resource;

/// Every ACL resource type
pub fn resources() -> Vec<Box<dyn Resource>> {
    let mut handlers: Vec<Box<dyn Resource>> = vec![
        Box::new(policy::PolicyResource),
        Box::new(role::RoleResource),
        Box::new(token::TokenResource),
        Box::new(auth_method::AuthMethodResource),
        Box::new(binding_rule::BindingRuleResource),
        Box::new(bootstrap::BootstrapTokenResource),
        Box::new(agent_token::AgentTokenResource::agent()),
        Box::new(agent_token::AgentTokenResource::recovery()),
    ];
    handlers.extend(attachment::resources());
    handlers
}

// =============================================================================
// Import IDs
// =============================================================================

/// What an ACL import ID points at
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AclRef {
    /// Remote-assigned UUID
    Id(String),
    /// Unique name, resolved with a lookup
    Name(String),
}

/// Parsed ACL import ID: `<id-or-name>` or `<partition>/<namespace>/<id-or-name>`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AclImport {
    /// Admin partition, empty for default
    pub partition: String,
    /// Namespace, empty for default
    pub namespace: String,
    /// The object itself
    pub target: AclRef,
}

impl AclImport {
    /// Parse a raw import ID
    pub fn parse(raw: &str) -> Result<Self> {
        let identity = Identity::parse(raw)?;
        if !identity.kind.is_empty() {
            return Err(Error::identity(
                raw,
                "expected <id-or-name> or <partition>/<namespace>/<id-or-name>",
            ));
        }
        let target = if uuid::Uuid::parse_str(&identity.name).is_ok() {
            AclRef::Id(identity.name)
        } else {
            AclRef::Name(identity.name)
        };
        Ok(Self {
            partition: identity.partition,
            namespace: identity.namespace,
            target,
        })
    }
}

// =============================================================================
// Links and identities
// =============================================================================

/// Links for the declared references; UUIDs link by ID, anything else by
/// name
pub fn links(references: Vec<String>) -> Vec<AclLink> {
    references
        .into_iter()
        .map(|r| {
            if uuid::Uuid::parse_str(&r).is_ok() {
                AclLink {
                    id: r,
                    ..Default::default()
                }
            } else {
                AclLink {
                    name: r,
                    ..Default::default()
                }
            }
        })
        .collect()
}

/// Observed links spelled the way the declaration refers to them
///
/// A link declared by ID reads back as its ID, everything else as its name.
pub fn link_references(observed: &[AclLink], declared: &[String]) -> Vec<String> {
    observed
        .iter()
        .map(|link| {
            if declared.iter().any(|d| d == &link.id) || link.name.is_empty() {
                link.id.clone()
            } else {
                link.name.clone()
            }
        })
        .collect()
}

pub(crate) fn service_identity_block() -> Attribute {
    Attribute::blocks(
        Schema::new()
            .attr("service_name", Attribute::required(AttributeType::String))
            .attr("datacenters", Attribute::optional(AttributeType::string_set())),
    )
}

pub(crate) fn node_identity_block() -> Attribute {
    Attribute::blocks(
        Schema::new()
            .attr("node_name", Attribute::required(AttributeType::String))
            .attr("datacenter", Attribute::required(AttributeType::String)),
    )
}

fn block_str(block: &Map<String, Value>, key: &str) -> String {
    block
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub(crate) fn service_identities(data: &ResourceData) -> Vec<ServiceIdentity> {
    data.get_blocks("service_identities")
        .into_iter()
        .map(|b| ServiceIdentity {
            service_name: block_str(b, "service_name"),
            datacenters: b
                .get("datacenters")
                .map(meshcfg_common::state::value_to_string_list)
                .unwrap_or_default(),
        })
        .collect()
}

pub(crate) fn node_identities(data: &ResourceData) -> Vec<NodeIdentity> {
    data.get_blocks("node_identities")
        .into_iter()
        .map(|b| NodeIdentity {
            node_name: block_str(b, "node_name"),
            datacenter: block_str(b, "datacenter"),
        })
        .collect()
}

pub(crate) fn service_identities_state(identities: &[ServiceIdentity]) -> Vec<Value> {
    identities
        .iter()
        .map(|i| serde_json::json!({"service_name": i.service_name, "datacenters": i.datacenters}))
        .collect()
}

pub(crate) fn node_identities_state(identities: &[NodeIdentity]) -> Vec<Value> {
    identities
        .iter()
        .map(|i| serde_json::json!({"node_name": i.node_name, "datacenter": i.datacenter}))
        .collect()
}

/// Require a non-empty string attribute
pub(crate) fn required_str<'a>(data: &'a ResourceData, field: &str) -> Result<&'a str> {
    data.get_str(field)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::decode_field(field, "must be set"))
}

#[cfg(test)]
pub(crate) mod testing {
    use meshcfg_client::transport::Response;
    use serde_json::json;

    /// Replication status at the given index for every object type
    pub fn replicated(index: u64) -> Response {
        Response::json(json!({
            "Enabled": true,
            "Running": true,
            "ReplicationType": "tokens",
            "ReplicatedIndex": index,
            "ReplicatedRoleIndex": index,
            "ReplicatedTokenIndex": index
        }))
    }
}
