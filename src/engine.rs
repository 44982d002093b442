//! Lifecycle entry points for the host
//!
//! The [`Engine`] dispatches each lifecycle call to the handler registered
//! for the resource type. Every call runs in a tracing span carrying the
//! resource type and ID, and errors leave it wrapped with the resource they
//! occurred on.

use std::sync::Arc;

use tracing::{debug, info_span, warn, Instrument};

use meshcfg_client::{ApiClient, HttpTransport};
use meshcfg_common::plan::{self, AttributeChange};
use meshcfg_common::telemetry::init_logging;
use meshcfg_common::{Error, ResourceData, Result};
use meshcfg_resources::{Context, Resource};

use crate::config::EngineConfig;
use crate::registry::ResourceRegistry;

/// Declarative reconciliation over one remote cluster
pub struct Engine {
    registry: ResourceRegistry,
    ctx: Context,
}

impl Engine {
    /// Engine over an existing context with every built-in handler
    pub fn new(ctx: Context) -> Self {
        Self::with_registry(ctx, ResourceRegistry::new())
    }

    /// Engine over an existing context and registry
    pub fn with_registry(ctx: Context, registry: ResourceRegistry) -> Self {
        Self { registry, ctx }
    }

    /// Validate the configuration and connect to the remote cluster
    ///
    /// Unset connection fields are filled from the environment first.
    pub fn configure(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        if let Some(logging) = &config.logging {
            if let Err(e) = init_logging(logging.to_logging_config()?) {
                warn!(error = %e, "logging already initialized by the host");
            }
        }
        let resolved = config.client.clone().with_env_defaults().resolve()?;
        let datacenter = resolved.datacenter.clone().unwrap_or_default();
        let transport = HttpTransport::from_resolved(resolved)?;
        let api = ApiClient::new(Arc::new(transport)).with_datacenter(datacenter);
        let ctx = Context::new(api).with_settings(config.settings()?);
        debug!("engine configured");
        Ok(Self::new(ctx))
    }

    /// Registered handlers
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Context handed to every handler
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Abort every in-flight request; later calls fail with `Cancelled`
    pub fn cancel(&self) {
        self.ctx.api.cancellation().cancel();
    }

    /// Create the resource and record its ID and observed state
    pub async fn create(&self, resource_type: &str, data: &mut ResourceData) -> Result<()> {
        let handler = self.registry.get(resource_type)?;
        check_declared(handler, data).map_err(|e| in_resource(e, resource_type, data))?;
        let span = info_span!("create", resource_type, id = tracing::field::Empty);
        let result = handler.create(&self.ctx, data).instrument(span.clone()).await;
        span.record("id", data.id_or_empty());
        result.map_err(|e| in_resource(e, resource_type, data))
    }

    /// Refresh observed state; a resource gone from the remote leaves the ID
    /// cleared
    pub async fn read(&self, resource_type: &str, data: &mut ResourceData) -> Result<()> {
        let handler = self.registry.get(resource_type)?;
        let span = info_span!("read", resource_type, id = data.id_or_empty());
        let result = handler.read(&self.ctx, data).instrument(span).await;
        result.map_err(|e| in_resource(e, resource_type, data))
    }

    /// Apply in-place changes
    pub async fn update(&self, resource_type: &str, data: &mut ResourceData) -> Result<()> {
        let handler = self.registry.get(resource_type)?;
        check_declared(handler, data).map_err(|e| in_resource(e, resource_type, data))?;
        let span = info_span!("update", resource_type, id = data.id_or_empty());
        let result = handler.update(&self.ctx, data).instrument(span).await;
        result.map_err(|e| in_resource(e, resource_type, data))
    }

    /// Delete the resource and clear its ID
    pub async fn delete(&self, resource_type: &str, data: &mut ResourceData) -> Result<()> {
        let handler = self.registry.get(resource_type)?;
        let span = info_span!("delete", resource_type, id = data.id_or_empty());
        let result = handler.delete(&self.ctx, data).instrument(span).await;
        result.map_err(|e| in_resource(e, resource_type, data))
    }

    /// Adopt an existing remote object by its import ID and read it
    pub async fn import(&self, resource_type: &str, id: &str, data: &mut ResourceData) -> Result<()> {
        let handler = self.registry.get(resource_type)?;
        let span = info_span!("import", resource_type, id);
        let result = async {
            handler.import(&self.ctx, id, data).await?;
            handler.read(&self.ctx, data).await
        }
        .instrument(span)
        .await;
        result.map_err(|e| in_resource(e, resource_type, data))
    }

    /// Attributes whose declared value differs from the recorded state
    ///
    /// `data` holds the declaration; its prior state is the last recorded one.
    pub fn plan(&self, resource_type: &str, data: &ResourceData) -> Result<Vec<AttributeChange>> {
        let schema = self.registry.schema(resource_type)?;
        Ok(plan::diff(schema, data.values(), data.prior()))
    }
}

/// Reject declarations the schema cannot hold before any remote call
fn check_declared(handler: &dyn Resource, data: &ResourceData) -> Result<()> {
    let schema = handler.schema();
    let missing = schema.missing_required(data.values());
    if !missing.is_empty() {
        return Err(Error::decode(format!(
            "missing required attributes: {}",
            missing.join(", ")
        )));
    }
    schema
        .check_object(&serde_json::Value::Object(data.values().clone()))
        .map_err(Error::decode)
}

fn in_resource(err: Error, resource_type: &str, data: &ResourceData) -> Error {
    let name = data
        .get_str("name")
        .or(data.id())
        .unwrap_or_default()
        .to_string();
    err.in_resource(resource_type, name)
}
