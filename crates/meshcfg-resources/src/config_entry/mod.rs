//! Config-entry framework
//!
//! Every config-entry kind is a typed document stored under
//! `(kind, name, partition, namespace)` and written with a single idempotent
//! `set`. A kind only supplies a [`ConfigEntryImplementation`]: its wire kind,
//! its schema, and (when the declared shape differs from the wire shape) its
//! own decode and write. [`ConfigEntryResource`] turns any implementation
//! into a full [`Resource`].
//!
//! Lifecycle rules shared by all kinds:
//!
//! - create and update set the entry and immediately read it back; a missing
//!   entry on that read means the cluster dropped the write
//!   ([`Error::EntryLost`])
//! - read treats a missing entry as deleted
//! - delete treats a missing entry as success
//! - import accepts every [`Identity`] form

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use meshcfg_client::types::config_entry::kind;
use meshcfg_client::types::ConfigEntry;
use meshcfg_client::{QueryOptions, WriteOptions};
use meshcfg_common::keys::{format_key, lookup, to_state, to_wire};
use meshcfg_common::{
    Attribute, AttributeType, Error, Identity, ResourceData, Result, Schema, StateWriter,
};

use crate::resource::{gone, observed_or_declared, Context, Resource};

pub mod chain;
pub mod gateway;
pub mod generic;
pub mod intentions;
pub mod mesh;
pub mod service;
pub mod v2;

/// Attributes every kind shares; handled by the framework itself
pub const HEADER_ATTRIBUTES: &[&str] = &["kind", "name", "partition", "namespace", "meta"];

/// Schema of the attributes every kind shares
///
/// Partition and namespace are computed as well as optional: the remote
/// reports `default` for undeclared scopes, which must not show up as drift.
pub fn header_schema() -> Schema {
    Schema::new()
        .attr(
            "kind",
            Attribute::computed_only(AttributeType::String).describe("Config entry kind"),
        )
        .attr(
            "name",
            Attribute::required(AttributeType::String)
                .force_new()
                .describe("Config entry name"),
        )
        .attr(
            "partition",
            Attribute::optional(AttributeType::String)
                .computed()
                .force_new(),
        )
        .attr(
            "namespace",
            Attribute::optional(AttributeType::String)
                .computed()
                .force_new(),
        )
        .attr("meta", Attribute::optional(AttributeType::Map))
}

/// One config-entry kind
pub trait ConfigEntryImplementation: Send + Sync + 'static {
    /// Resource type name
    fn type_name(&self) -> &'static str;

    /// Wire kind
    fn kind(&self) -> &'static str;

    /// Full schema, including [`header_schema`]
    fn schema(&self) -> &Schema;

    /// Build the wire entry from the declared state
    fn decode(&self, data: &ResourceData) -> Result<ConfigEntry> {
        let body = decode_body(self.schema(), data);
        finish_decode(self.kind(), data, body)
    }

    /// Copy an observed entry into the state
    fn write(&self, entry: &ConfigEntry, sw: &mut StateWriter<'_>) -> Result<()> {
        write_header(entry, sw);
        write_body(&entry.to_value()?, sw, &[]);
        Ok(())
    }
}

// =============================================================================
// Schema-driven decode and write
// =============================================================================

/// Wire body of every declared non-header attribute, keys formatted
pub fn decode_body(schema: &Schema, data: &ResourceData) -> Map<String, Value> {
    let mut body = Map::new();
    for (name, attr) in schema.iter() {
        if HEADER_ATTRIBUTES.contains(&name) || attr.is_computed_only() {
            continue;
        }
        if let Some(wire) = data.get(name).and_then(|v| to_wire(&attr.ty, v)) {
            body.insert(format_key(name), wire);
        }
    }
    body
}

/// Add the header fields to a wire body and type it as `kind`
pub fn finish_decode(kind: &str, data: &ResourceData, mut body: Map<String, Value>) -> Result<ConfigEntry> {
    let name = data
        .get_str("name")
        .ok_or_else(|| Error::decode_field("name", "a config entry needs a name"))?;
    body.insert("Name".into(), Value::String(name.to_string()));
    for (attr, key) in [("partition", "Partition"), ("namespace", "Namespace")] {
        if let Some(v) = data.get_str(attr) {
            body.insert(key.into(), Value::String(v.to_string()));
        }
    }
    let meta = data.get_map("meta");
    if !meta.is_empty() {
        body.insert("Meta".into(), serde_json::to_value(meta)?);
    }
    ConfigEntry::from_parts(kind, Value::Object(body)).map_err(|e| Error::decode(e.to_string()))
}

/// Write the shared fields of an observed entry
///
/// An empty observed partition or namespace keeps the declared value, and
/// each scope is only ever written to its own attribute.
pub fn write_header(entry: &ConfigEntry, sw: &mut StateWriter<'_>) {
    let header = entry.header();
    let partition = observed_or_declared(&header.partition, sw.data(), "partition");
    let namespace = observed_or_declared(&header.namespace, sw.data(), "namespace");
    sw.set("kind", entry.kind())
        .set("name", &header.name)
        .set("partition", &partition)
        .set("namespace", &namespace)
        .set("meta", &header.meta);
}

/// Write every non-header schema attribute from a wire document
///
/// Attributes missing on the wire are cleared so removals show up as drift.
/// Attributes listed in `skip` are left to the caller.
pub fn write_body(wire: &Value, sw: &mut StateWriter<'_>, skip: &[&str]) {
    let empty = Map::new();
    let wire = wire.as_object().unwrap_or(&empty);
    let schema = sw.schema();
    for (name, attr) in schema.iter() {
        if HEADER_ATTRIBUTES.contains(&name) || skip.contains(&name) {
            continue;
        }
        let value = lookup(wire, name)
            .map(|v| to_state(&attr.ty, v))
            .unwrap_or(Value::Null);
        sw.set(name, &value);
    }
}

// =============================================================================
// Lifecycle shared by all kinds
// =============================================================================

/// Scope an entry is addressed with
///
/// Exported-services entries other than `default` are scoped by the
/// partition named after them.
pub fn entry_scope(kind_name: &str, name: &str, data: &ResourceData) -> (QueryOptions, WriteOptions) {
    let namespace = data.get_str("namespace").unwrap_or_default();
    let partition = if kind_name == kind::EXPORTED_SERVICES && name != "default" {
        name
    } else {
        data.get_str("partition").unwrap_or_default()
    };
    let dc = data.get_str("datacenter").unwrap_or_default();
    (
        QueryOptions::scoped(partition, namespace).in_datacenter(dc),
        WriteOptions::scoped(partition, namespace).in_datacenter(dc),
    )
}

/// Set an entry and return what the remote stored
pub async fn set_and_confirm(ctx: &Context, entry: &ConfigEntry, data: &ResourceData) -> Result<ConfigEntry> {
    let (kind_name, name) = (entry.kind().to_string(), entry.name().to_string());
    let (query, write) = entry_scope(&kind_name, &name, data);
    if !ctx.api.config_entry_set(entry, &write).await? {
        warn!(kind = %kind_name, name = %name, "config entry set was not applied");
    }
    ctx.api
        .config_entry_get(&kind_name, &name, &query)
        .await?
        .ok_or(Error::EntryLost {
            kind: kind_name,
            name,
        })
}

/// Name the entry is addressed by: the declared name, else the ID
pub fn entry_name(data: &ResourceData) -> String {
    data.get_str("name")
        .or_else(|| data.id())
        .unwrap_or_default()
        .to_string()
}

/// Parse an import ID for a kind and record the identity
pub fn import_identity(kind_name: &str, raw: &str, data: &mut ResourceData, schema: &Schema) -> Result<()> {
    let identity = Identity::parse(raw)?;
    if !identity.kind.is_empty() && identity.kind != kind_name {
        return Err(Error::identity(
            raw,
            format!("expected kind {kind_name:?}, got {:?}", identity.kind),
        ));
    }
    let mut sw = data.writer(schema);
    sw.set("kind", kind_name)
        .set("name", &identity.name)
        .set("partition", &identity.partition)
        .set("namespace", &identity.namespace)
        .set_id(identity.name.clone());
    sw.finish()
}

/// [`Resource`] implementation over a [`ConfigEntryImplementation`]
pub struct ConfigEntryResource<I> {
    inner: I,
}

impl<I: ConfigEntryImplementation> ConfigEntryResource<I> {
    /// Wrap a kind implementation
    pub fn new(inner: I) -> Self {
        Self { inner }
    }

    fn store(&self, entry: &ConfigEntry, data: &mut ResourceData) -> Result<()> {
        data.set_id(entry.name());
        let mut sw = data.writer(self.inner.schema());
        if let Err(e) = self.inner.write(entry, &mut sw) {
            sw.record(e);
        }
        sw.finish()
    }

    async fn apply(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let entry = self.inner.decode(data)?;
        let stored = set_and_confirm(ctx, &entry, data).await?;
        info!(kind = self.inner.kind(), name = %stored.name(), "config entry set");
        self.store(&stored, data)
    }
}

#[async_trait]
impl<I: ConfigEntryImplementation> Resource for ConfigEntryResource<I> {
    fn type_name(&self) -> &'static str {
        self.inner.type_name()
    }

    fn schema(&self) -> &Schema {
        self.inner.schema()
    }

    #[instrument(skip_all, fields(kind = self.inner.kind()))]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.apply(ctx, data).await
    }

    #[instrument(skip_all, fields(kind = self.inner.kind(), id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let name = entry_name(data);
        let (query, _) = entry_scope(self.inner.kind(), &name, data);
        match ctx
            .api
            .config_entry_get(self.inner.kind(), &name, &query)
            .await?
        {
            Some(entry) => self.store(&entry, data),
            None => {
                gone(data, self.inner.type_name());
                Ok(())
            }
        }
    }

    #[instrument(skip_all, fields(kind = self.inner.kind(), id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.apply(ctx, data).await
    }

    #[instrument(skip_all, fields(kind = self.inner.kind(), id = data.id_or_empty()))]
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let name = entry_name(data);
        let (_, write) = entry_scope(self.inner.kind(), &name, data);
        ctx.api
            .config_entry_delete(self.inner.kind(), &name, &write)
            .await?;
        info!(kind = self.inner.kind(), name = %name, "config entry deleted");
        data.clear_id();
        Ok(())
    }

    async fn import(&self, _ctx: &Context, id: &str, data: &mut ResourceData) -> Result<()> {
        import_identity(self.inner.kind(), id, data, self.inner.schema())
    }
}

/// Every typed kind as a boxed resource
pub fn resources() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(ConfigEntryResource::new(service::ServiceDefaults)),
        Box::new(ConfigEntryResource::new(service::ProxyDefaults)),
        Box::new(ConfigEntryResource::new(chain::ServiceRouter)),
        Box::new(ConfigEntryResource::new(chain::ServiceSplitter)),
        Box::new(ConfigEntryResource::new(chain::ServiceResolver)),
        Box::new(ConfigEntryResource::new(intentions::ServiceIntentions)),
        Box::new(ConfigEntryResource::new(mesh::SamenessGroup)),
        Box::new(ConfigEntryResource::new(mesh::ExportedServices)),
        Box::new(ConfigEntryResource::new(mesh::Mesh)),
        Box::new(ConfigEntryResource::new(mesh::JwtProvider)),
        Box::new(ConfigEntryResource::new(gateway::IngressGateway)),
        Box::new(ConfigEntryResource::new(gateway::TerminatingGateway)),
        Box::new(generic::GenericConfigEntry),
        Box::new(v2::ExportedServicesV2),
    ]
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use meshcfg_client::transport::MockTransport;
    use meshcfg_client::types::ConfigEntry;
    use meshcfg_client::ApiClient;
    use meshcfg_common::plan::is_converged;
    use meshcfg_common::ResourceData;
    use serde_json::Value;

    use super::ConfigEntryImplementation;
    use crate::resource::Context;

    /// Context over a mocked transport, with the datacenter preset
    pub fn context(transport: MockTransport) -> Context {
        Context::new(ApiClient::new(Arc::new(transport)).with_datacenter("dc1"))
    }

    /// Write `observed` into state and assert the declaration plans clean
    pub fn round_trip<I: ConfigEntryImplementation>(implementation: &I, declared: Value, observed: Value) -> ResourceData {
        let entry = ConfigEntry::from_value(observed).unwrap();
        let mut data = ResourceData::from_value(declared.clone());
        let mut sw = data.writer(implementation.schema());
        implementation.write(&entry, &mut sw).unwrap();
        sw.finish().unwrap();
        assert!(
            is_converged(implementation.schema(), declared.as_object().unwrap(), data.values()),
            "{} drifted: {:?}",
            implementation.type_name(),
            data.values()
        );
        data
    }

    /// Decode the declaration, then [`round_trip`] the wire form it produced
    pub fn decode_round_trip<I: ConfigEntryImplementation>(implementation: &I, declared: Value) -> ResourceData {
        let wire = implementation
            .decode(&ResourceData::from_value(declared.clone()))
            .unwrap()
            .to_value()
            .unwrap();
        round_trip(implementation, declared, wire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_entry::testing::{context, decode_round_trip};
    use meshcfg_client::transport::{Method, MockTransport, RequestBody, Response};
    use meshcfg_common::plan::is_converged;
    use serde_json::json;

    fn declared_service_defaults() -> Value {
        json!({
            "kind": "service-defaults",
            "name": "foo",
            "meta": {},
            "protocol": "http",
            "expose": {},
            "mesh_gateway": {},
            "transparent_proxy": {}
        })
    }

    /// Declared service-defaults are written with empty blocks kept, empty
    /// meta dropped, and read back without drift
    #[tokio::test]
    async fn story_service_defaults_set_and_read() {
        let wire = json!({
            "Kind": "service-defaults",
            "Name": "foo",
            "Protocol": "http",
            "Expose": {},
            "MeshGateway": {},
            "TransparentProxy": {}
        });
        let expected = wire.clone();
        let mut transport = MockTransport::new();
        transport
            .expect_write()
            .withf(move |method, path, body, _| {
                *method == Method::Put && path == "/config" && *body == RequestBody::Json(expected.clone())
            })
            .times(1)
            .returning(|_, _, _, _| Ok(Response::json(json!(true))));
        let stored = json!({
            "Kind": "service-defaults",
            "Name": "foo",
            "Protocol": "http",
            "Expose": {},
            "MeshGateway": {},
            "TransparentProxy": {},
            "CreateIndex": 7,
            "ModifyIndex": 7
        });
        transport
            .expect_query()
            .withf(|path, _| path == "/config/service-defaults/foo")
            .times(2)
            .returning(move |_, _| Ok(Response::json(stored.clone())));
        let ctx = context(transport);
        let resource = ConfigEntryResource::new(service::ServiceDefaults);

        let declared = declared_service_defaults();
        let mut data = ResourceData::from_value(declared.clone());
        resource.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some("foo"));

        resource.read(&ctx, &mut data).await.unwrap();
        assert!(is_converged(
            resource.schema(),
            declared.as_object().unwrap(),
            data.values()
        ));
        assert_eq!(data.get_str("kind"), Some("service-defaults"));
    }

    #[tokio::test]
    async fn lost_entry_after_set_is_reported() {
        let mut transport = MockTransport::new();
        transport
            .expect_write()
            .returning(|_, _, _, _| Ok(Response::json(json!(true))));
        transport
            .expect_query()
            .returning(|_, _| Err(Error::remote(404, "Config entry not found")));
        let ctx = context(transport);
        let resource = ConfigEntryResource::new(service::ServiceDefaults);

        let mut data = ResourceData::from_value(declared_service_defaults());
        let err = resource.create(&ctx, &mut data).await.unwrap_err();
        assert!(matches!(err, Error::EntryLost { ref kind, ref name } if kind == "service-defaults" && name == "foo"));
        assert_eq!(data.id(), None);
    }

    #[tokio::test]
    async fn missing_entry_on_read_clears_state() {
        let mut transport = MockTransport::new();
        transport
            .expect_query()
            .returning(|_, _| Err(Error::remote(404, "")));
        let ctx = context(transport);
        let resource = ConfigEntryResource::new(mesh::Mesh);

        let mut data = ResourceData::from_value(json!({"name": "mesh"})).with_id("mesh");
        resource.read(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), None);
    }

    #[tokio::test]
    async fn delete_of_missing_entry_succeeds() {
        let mut transport = MockTransport::new();
        transport
            .expect_delete()
            .withf(|path, _| path == "/config/service-router/web")
            .returning(|_, _| Err(Error::remote(404, "")));
        let ctx = context(transport);
        let resource = ConfigEntryResource::new(chain::ServiceRouter);

        let mut data = ResourceData::from_value(json!({"name": "web"})).with_id("web");
        resource.delete(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), None);
    }

    /// A four-part import ID fills in the whole identity
    #[tokio::test]
    async fn story_import_of_qualified_id() {
        let ctx = context(MockTransport::new());
        let resource = ConfigEntryResource::new(chain::ServiceResolver);

        let mut data = ResourceData::default();
        resource
            .import(&ctx, "p1/n1/service-resolver/web", &mut data)
            .await
            .unwrap();
        assert_eq!(data.get_str("partition"), Some("p1"));
        assert_eq!(data.get_str("namespace"), Some("n1"));
        assert_eq!(data.get_str("kind"), Some("service-resolver"));
        assert_eq!(data.get_str("name"), Some("web"));
        assert_eq!(data.id(), Some("web"));
    }

    #[tokio::test]
    async fn import_rejects_a_different_kind() {
        let ctx = context(MockTransport::new());
        let resource = ConfigEntryResource::new(chain::ServiceResolver);
        let mut data = ResourceData::default();
        let err = resource
            .import(&ctx, "service-defaults/web", &mut data)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IdentityMalformed { .. }));
    }

    #[test]
    fn exported_services_are_scoped_by_their_partition() {
        let data = ResourceData::from_value(json!({"name": "team-a"}));
        let (query, _) = entry_scope(kind::EXPORTED_SERVICES, "team-a", &data);
        assert_eq!(query.partition.as_deref(), Some("team-a"));

        let (query, _) = entry_scope(kind::EXPORTED_SERVICES, "default", &data);
        assert_eq!(query.partition, None);
    }

    #[test]
    fn namespace_on_read_keeps_declaration_when_unreported() {
        let resource = ConfigEntryResource::new(service::ServiceDefaults);
        let entry = ConfigEntry::from_value(json!({
            "Kind": "service-defaults",
            "Name": "web",
            "Partition": "p1"
        }))
        .unwrap();
        let mut data = ResourceData::from_value(json!({"name": "web", "namespace": "team"}));
        resource.store(&entry, &mut data).unwrap();
        assert_eq!(data.get_str("namespace"), Some("team"));
        assert_eq!(data.get_str("partition"), Some("p1"));
    }

    #[test]
    fn every_kind_plans_clean_after_its_own_write() {
        decode_round_trip(&service::ServiceDefaults, json!({"name": "web", "protocol": "http"}));
        decode_round_trip(&service::ProxyDefaults, json!({"name": "global", "mode": "transparent"}));
        decode_round_trip(&chain::ServiceRouter, json!({"name": "web"}));
        decode_round_trip(&chain::ServiceSplitter, json!({"name": "web"}));
        decode_round_trip(&chain::ServiceResolver, json!({"name": "web", "connect_timeout": "5s"}));
        decode_round_trip(&intentions::ServiceIntentions, json!({"name": "web"}));
        decode_round_trip(&mesh::SamenessGroup, json!({"name": "sg", "default_for_failover": true}));
        decode_round_trip(&mesh::ExportedServices, json!({"name": "default"}));
        decode_round_trip(&mesh::Mesh, json!({"name": "mesh"}));
        decode_round_trip(&mesh::JwtProvider, json!({"name": "okta", "issuer": "https://okta.example"}));
        decode_round_trip(&gateway::IngressGateway, json!({"name": "ingress"}));
        decode_round_trip(&gateway::TerminatingGateway, json!({"name": "egress"}));
    }
}
