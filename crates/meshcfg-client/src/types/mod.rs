//! Wire objects of the remote API
//!
//! Field names follow the remote's PascalCase JSON; acronyms the key
//! formatter does not produce (`ID`, `HTTP`, `SNI`, ...) are renamed
//! explicitly and accept the formatted spelling as an alias.

pub mod acl;
pub mod agent;
pub mod catalog;
pub mod config_entry;
pub mod intention;
pub mod kv;
pub mod operator;
pub mod peering;
pub mod query;
pub mod scope;
pub mod v2;

pub use acl::{
    AclAuthMethod, AclBindingRule, AclLink, AclPolicy, AclReplicationStatus, AclRole, AclToken,
    NamespaceRule, NodeIdentity, ServiceIdentity,
};
pub use agent::{AgentSelf, AgentTokenSlot};
pub use catalog::{
    AgentService, CatalogDeregistration, CatalogNode, CatalogRegistration, CatalogService,
    HealthCheck, HealthCheckDefinition, Node,
};
pub use config_entry::{ConfigEntry, EntryHeader};
pub use intention::Intention;
pub use kv::KvPair;
pub use operator::{Area, AutopilotConfiguration, CaConfig, LicenseReply};
pub use peering::{Peering, PeeringState};
pub use query::PreparedQuery;
pub use scope::{Namespace, NamespaceAclConfig, Partition};
pub use v2::V2Resource;
