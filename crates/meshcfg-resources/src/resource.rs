//! Lifecycle contract shared by every resource handler
//!
//! The lifecycle host drives each resource through [`Resource`]: create,
//! read, update, delete and import, each against a [`ResourceData`] holding
//! the declared (and, on update, prior) state. Handlers talk to the remote
//! through the [`Context`] and report observed state back through the same
//! `ResourceData`.

use async_trait::async_trait;
use tracing::info;

use meshcfg_client::{ApiClient, QueryOptions, WriteOptions};
use meshcfg_common::backoff::Backoff;
use meshcfg_common::{ResourceData, Result, Schema, DEFAULT_EXTERNAL_SOURCE};

use crate::replication::ReplicationWaiter;

/// Engine-wide settings handlers consult
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Value of the external-source marker on catalog services
    pub external_source: String,
    /// Schedule of the ACL replication waits
    pub replication: Backoff,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            external_source: DEFAULT_EXTERNAL_SOURCE.to_string(),
            replication: Backoff::default(),
        }
    }
}

/// Everything a lifecycle call needs besides the resource state
#[derive(Clone, Debug)]
pub struct Context {
    /// Client for the remote API
    pub api: ApiClient,
    /// Engine settings
    pub settings: Settings,
}

impl Context {
    /// Context with default settings
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            settings: Settings::default(),
        }
    }

    /// Replace the settings
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Waiter for ACL replication using the configured schedule
    pub fn replication(&self) -> ReplicationWaiter {
        ReplicationWaiter::new(self.settings.replication)
    }
}

/// One resource type the engine manages
///
/// `read` is the only operation allowed to discover that the resource is
/// gone: it clears the ID and returns `Ok`. `import` only records the
/// identity; the host follows it with `read`.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Resource type name (`acl_policy`, `config_entry_service_defaults`)
    fn type_name(&self) -> &'static str;

    /// Declarative shape of the resource
    fn schema(&self) -> &Schema;

    /// Create the resource from the declared state
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()>;

    /// Refresh the state from the remote
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()>;

    /// Apply a changed declaration
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()>;

    /// Delete the resource
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()>;

    /// Adopt an existing remote object by its ID
    async fn import(&self, _ctx: &Context, id: &str, data: &mut ResourceData) -> Result<()> {
        data.set_id(id);
        Ok(())
    }
}

// =============================================================================
// Helpers shared by handlers
// =============================================================================

/// Read options scoped by the `partition`, `namespace` and `datacenter`
/// attributes, when the resource declares them
pub fn query_options(data: &ResourceData) -> QueryOptions {
    QueryOptions::scoped(
        data.get_str("partition").unwrap_or_default(),
        data.get_str("namespace").unwrap_or_default(),
    )
    .in_datacenter(data.get_str("datacenter").unwrap_or_default())
}

/// Write options scoped like [`query_options`]
pub fn write_options(data: &ResourceData) -> WriteOptions {
    WriteOptions::scoped(
        data.get_str("partition").unwrap_or_default(),
        data.get_str("namespace").unwrap_or_default(),
    )
    .in_datacenter(data.get_str("datacenter").unwrap_or_default())
}

/// Forget a resource that no longer exists on the remote
pub fn gone(data: &mut ResourceData, resource_type: &str) {
    info!(
        resource_type,
        id = data.id_or_empty(),
        "resource no longer exists, removing from state"
    );
    data.clear_id();
}

/// Observed scope value, or the declared one when the remote reports none
///
/// Empty means "default" on the remote, so an empty observation never
/// overrides what was declared.
pub fn observed_or_declared(observed: &str, data: &ResourceData, attribute: &str) -> String {
    if observed.is_empty() {
        data.get_string(attribute)
    } else {
        observed.to_string()
    }
}

/// The datacenter the resource lives in: declared, or the client's default
pub async fn datacenter(ctx: &Context, data: &ResourceData) -> Result<String> {
    match data.get_str("datacenter") {
        Some(dc) => Ok(dc.to_string()),
        None => ctx.api.datacenter().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn options_follow_declared_scope() {
        let data = ResourceData::from_value(json!({
            "partition": "p1",
            "namespace": "",
            "datacenter": "dc2"
        }));
        let opts = query_options(&data);
        assert_eq!(opts.partition.as_deref(), Some("p1"));
        assert_eq!(opts.namespace, None);
        assert_eq!(opts.datacenter.as_deref(), Some("dc2"));
    }

    #[test]
    fn empty_observed_scope_keeps_declaration() {
        let data = ResourceData::from_value(json!({"namespace": "team"}));
        assert_eq!(observed_or_declared("", &data, "namespace"), "team");
        assert_eq!(observed_or_declared("other", &data, "namespace"), "other");
    }
}
