//! Resource handlers for meshcfg
//!
//! Every resource type the engine manages implements [`Resource`]. Handlers
//! translate between declared state ([`ResourceData`](meshcfg_common::ResourceData))
//! and the cluster's HTTP API through the shared [`Context`].
//!
//! # Modules
//!
//! - [`resource`] - the lifecycle contract and the reconciliation context
//! - [`replication`] - waiting for ACL writes to reach the replicas
//! - [`config_entry`] - the generic config-entry framework and its kinds
//! - [`intention`] - legacy intentions stored as `service-intentions` sources
//! - [`acl`] - policies, roles, tokens, auth methods and their attachments
//! - [`scope`] - namespaces and admin partitions
//! - [`catalog`] - nodes, services and health checks
//! - [`kv`] - declared keys and owned key prefixes
//! - [`operator`] - autopilot, the Connect CA, network areas and the license
//! - [`query`] - prepared queries
//! - [`peering`] - cluster peerings and peering tokens

#![deny(missing_docs)]

pub mod acl;
pub mod catalog;
pub mod config_entry;
pub mod intention;
pub mod kv;
pub mod operator;
pub mod peering;
pub mod query;
pub mod replication;
pub mod resource;
pub mod scope;

pub use replication::{ReplicationTarget, ReplicationWaiter};
pub use resource::{Context, Resource, Settings};

/// Every resource handler, in registration order
pub fn all() -> Vec<Box<dyn Resource>> {
    let mut handlers = acl::resources();
    handlers.push(Box::new(scope::NamespaceResource));
    handlers.push(Box::new(scope::PartitionResource));
    handlers.extend(catalog::resources());
    handlers.extend(kv::resources());
    handlers.extend(config_entry::resources());
    handlers.push(Box::new(intention::IntentionResource));
    handlers.extend(operator::resources());
    handlers.push(Box::new(query::PreparedQueryResource));
    handlers.push(Box::new(peering::PeeringResource));
    handlers.push(Box::new(peering::token::PeeringTokenResource));
    handlers
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn type_names_are_unique() {
        let handlers = all();
        let names: HashSet<&str> = handlers.iter().map(|h| h.type_name()).collect();
        assert_eq!(names.len(), handlers.len());
    }

    #[test]
    fn every_handler_declares_a_schema() {
        for handler in all() {
            assert!(
                !handler.schema().is_empty(),
                "{} has an empty schema",
                handler.type_name()
            );
        }
    }
}
