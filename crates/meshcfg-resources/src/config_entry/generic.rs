//! Config entry of any kind, declared as a raw JSON body
//!
//! `config_json` holds the kind-specific fields in their wire spelling
//! (`{"Protocol": "http"}`); the header fields come from the `kind`, `name`,
//! `partition` and `namespace` attributes. Kinds without a dedicated
//! resource, like api-gateway or http-route, are managed this way.

use std::sync::LazyLock;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, instrument};

use meshcfg_client::types::ConfigEntry;
use meshcfg_common::{Attribute, AttributeType, Error, Identity, ResourceData, Result, Schema};

use super::{entry_name, entry_scope, set_and_confirm};
use crate::resource::{gone, observed_or_declared, Context, Resource};

/// Wire fields carried by attributes rather than `config_json`
const HEADER_FIELDS: &[&str] = &["Kind", "Name", "Partition", "Namespace"];

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new()
        .attr(
            "kind",
            Attribute::required(AttributeType::String)
                .force_new()
                .describe("Config entry kind"),
        )
        .attr(
            "name",
            Attribute::required(AttributeType::String).force_new(),
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
        .attr(
            "config_json",
            Attribute::optional(AttributeType::String)
                .json()
                .describe("Kind-specific fields as a JSON object"),
        )
});

/// The `config_entry` resource
pub struct GenericConfigEntry;

impl GenericConfigEntry {
    fn decode(data: &ResourceData) -> Result<ConfigEntry> {
        let kind = data
            .get_str("kind")
            .ok_or_else(|| Error::decode_field("kind", "must be set"))?;
        let name = data
            .get_str("name")
            .ok_or_else(|| Error::decode_field("name", "must be set"))?;
        let mut body: Map<String, Value> = match data.get_str("config_json") {
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| Error::decode_field("config_json", format!("invalid JSON object: {e}")))?,
            None => Map::new(),
        };
        body.insert("Name".into(), Value::String(name.to_string()));
        for (attr, key) in [("partition", "Partition"), ("namespace", "Namespace")] {
            if let Some(v) = data.get_str(attr) {
                body.insert(key.into(), Value::String(v.to_string()));
            }
        }
        ConfigEntry::from_parts(kind, Value::Object(body)).map_err(|e| Error::decode(e.to_string()))
    }

    fn store(entry: &ConfigEntry, data: &mut ResourceData) -> Result<()> {
        let mut body = match entry.to_value()? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        body.retain(|k, _| !HEADER_FIELDS.contains(&k.as_str()));
        let config = serde_json::to_string(&body)?;

        let header = entry.header();
        let partition = observed_or_declared(&header.partition, data, "partition");
        let namespace = observed_or_declared(&header.namespace, data, "namespace");
        data.set_id(entry.name());
        let mut sw = data.writer(&SCHEMA);
        sw.set("kind", entry.kind())
            .set("name", entry.name())
            .set("partition", &partition)
            .set("namespace", &namespace)
            .set("config_json", &config);
        sw.finish()
    }
}

#[async_trait]
impl Resource for GenericConfigEntry {
    fn type_name(&self) -> &'static str {
        "config_entry"
    }

    fn schema(&self) -> &Schema {
        &SCHEMA
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let entry = Self::decode(data)?;
        let stored = set_and_confirm(ctx, &entry, data).await?;
        info!(kind = %stored.kind(), name = %stored.name(), "config entry set");
        Self::store(&stored, data)
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let kind = data.get_string("kind");
        let name = entry_name(data);
        let (query, _) = entry_scope(&kind, &name, data);
        match ctx.api.config_entry_get(&kind, &name, &query).await? {
            Some(entry) => Self::store(&entry, data),
            None => {
                gone(data, self.type_name());
                Ok(())
            }
        }
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.create(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let kind = data.get_string("kind");
        let name = entry_name(data);
        let (_, write) = entry_scope(&kind, &name, data);
        ctx.api.config_entry_delete(&kind, &name, &write).await?;
        info!(%kind, %name, "config entry deleted");
        data.clear_id();
        Ok(())
    }

    async fn import(&self, _ctx: &Context, id: &str, data: &mut ResourceData) -> Result<()> {
        let identity = Identity::parse(id)?;
        if identity.kind.is_empty() {
            return Err(Error::identity(
                id,
                "expected <kind>/<name> or <partition>/<namespace>/<kind>/<name>",
            ));
        }
        let mut sw = data.writer(&SCHEMA);
        sw.set("kind", &identity.kind)
            .set("name", &identity.name)
            .set("partition", &identity.partition)
            .set("namespace", &identity.namespace)
            .set_id(identity.name.clone());
        sw.finish()
    }
}
