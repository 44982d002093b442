//! The `catalog_entry` resource: a node registered together with its
//! services
//!
//! Every service carries the external-source marker. Read and delete only
//! see marked services, so services other agents put on the same node are
//! left alone.

use std::sync::LazyLock;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{info, instrument, warn};

use meshcfg_client::types::{AgentService, CatalogDeregistration, CatalogRegistration};
use meshcfg_common::state::{value_to_string_list, value_to_string_map};
use meshcfg_common::{Attribute, AttributeType, Error, ResourceData, Result, Schema, EXTERNAL_SOURCE_META_KEY};

use crate::acl::required_str;
use crate::resource::{datacenter, gone, query_options, write_options, Context, Resource};

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    let service = Schema::new()
        .attr("id", Attribute::optional(AttributeType::String))
        .attr("name", Attribute::required(AttributeType::String))
        .attr("address", Attribute::optional(AttributeType::String))
        .attr("port", Attribute::optional(AttributeType::Int))
        .attr("tags", Attribute::optional(AttributeType::string_list()))
        .attr("meta", Attribute::optional(AttributeType::Map));
    Schema::new()
        .attr("node", Attribute::required(AttributeType::String).force_new())
        .attr("address", Attribute::required(AttributeType::String).force_new())
        .attr(
            "datacenter",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
        .attr("meta", Attribute::optional(AttributeType::Map))
        .attr("tagged_addresses", Attribute::optional(AttributeType::Map))
        .attr("service", Attribute::block_set(service))
});

/// The `catalog_entry` resource
pub struct CatalogEntryResource;

fn service_from_block(block: &Map<String, Value>) -> Result<AgentService> {
    let text = |key: &str| block.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    let name = text("name");
    let id = match text("id") {
        id if id.is_empty() => name.clone(),
        id => id,
    };
    let port = block.get("port").and_then(Value::as_i64).unwrap_or(0);
    let port = u16::try_from(port)
        .map_err(|_| Error::decode_field("service.port", format!("{port} is not a valid port")))?;
    let meta = block.get("meta").map(value_to_string_map).unwrap_or_default();
    if meta.contains_key(EXTERNAL_SOURCE_META_KEY) {
        return Err(Error::decode_field(
            "service.meta",
            format!("{EXTERNAL_SOURCE_META_KEY:?} is reserved"),
        ));
    }
    Ok(AgentService {
        id,
        service: name,
        tags: block.get("tags").map(value_to_string_list).unwrap_or_default(),
        meta,
        port,
        address: text("address"),
        ..Default::default()
    })
}

fn is_managed(ctx: &Context, service: &AgentService) -> bool {
    service.meta.get(EXTERNAL_SOURCE_META_KEY) == Some(&ctx.settings.external_source)
}

impl CatalogEntryResource {
    fn registrations(ctx: &Context, data: &ResourceData) -> Result<Vec<CatalogRegistration>> {
        let base = CatalogRegistration {
            node: required_str(data, "node")?.to_string(),
            address: required_str(data, "address")?.to_string(),
            datacenter: data.get_string("datacenter"),
            node_meta: data.get_map("meta"),
            tagged_addresses: data.get_map("tagged_addresses"),
            ..Default::default()
        };
        let services = data
            .get_blocks("service")
            .into_iter()
            .map(service_from_block)
            .collect::<Result<Vec<_>>>()?;
        if services.is_empty() {
            return Ok(vec![base]);
        }
        Ok(services
            .into_iter()
            .map(|mut service| {
                service.meta.insert(
                    EXTERNAL_SOURCE_META_KEY.to_string(),
                    ctx.settings.external_source.clone(),
                );
                CatalogRegistration {
                    service: Some(service),
                    ..base.clone()
                }
            })
            .collect())
    }

    async fn register(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let registrations = Self::registrations(ctx, data)?;
        let opts = write_options(data);
        for registration in &registrations {
            ctx.api.catalog_register(registration, &opts).await?;
        }
        let node = data.get_string("node");
        info!(%node, services = registrations.len(), "registered catalog entry");
        data.set_id(node);
        self.read(ctx, data).await
    }

    async fn deregister_service(&self, ctx: &Context, data: &ResourceData, node: &str, id: &str) -> Result<()> {
        let deregistration = CatalogDeregistration {
            node: node.to_string(),
            service_id: id.to_string(),
            datacenter: data.get_string("datacenter"),
            ..Default::default()
        };
        ctx.api.catalog_deregister(&deregistration, &write_options(data)).await
    }
}

#[async_trait]
impl Resource for CatalogEntryResource {
    fn type_name(&self) -> &'static str {
        "catalog_entry"
    }

    fn schema(&self) -> &Schema {
        &SCHEMA
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.register(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let name = data.id_or_empty().to_string();
        let Some(catalog_node) = ctx.api.catalog_node(&name, &query_options(data)).await? else {
            gone(data, self.type_name());
            return Ok(());
        };
        let Some(node) = catalog_node.node else {
            gone(data, self.type_name());
            return Ok(());
        };
        let services: Vec<Value> = catalog_node
            .services
            .values()
            .filter(|s| is_managed(ctx, s))
            .map(|s| {
                let mut meta = s.meta.clone();
                meta.remove(EXTERNAL_SOURCE_META_KEY);
                json!({
                    "id": s.id,
                    "name": s.service,
                    "address": s.address,
                    "port": s.port,
                    "tags": s.tags,
                    "meta": meta,
                })
            })
            .collect();
        let dc = if node.datacenter.is_empty() {
            datacenter(ctx, data).await?
        } else {
            node.datacenter.clone()
        };
        let mut sw = data.writer(&SCHEMA);
        sw.set("node", &node.node)
            .set("address", &node.address)
            .set("datacenter", &dc)
            .set("meta", &node.meta)
            .set("tagged_addresses", &node.tagged_addresses)
            .set("service", &services);
        sw.finish()
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        // services dropped from the declaration are deregistered first
        let kept: Vec<String> = data
            .get_blocks("service")
            .into_iter()
            .map(service_from_block)
            .map(|s| s.map(|s| s.id))
            .collect::<Result<_>>()?;
        let prior: Vec<String> = data
            .prior()
            .get("service")
            .and_then(Value::as_array)
            .map(|services| {
                services
                    .iter()
                    .filter_map(Value::as_object)
                    .filter_map(|b| service_from_block(b).ok())
                    .map(|s| s.id)
                    .collect()
            })
            .unwrap_or_default();
        let node = data.get_string("node");
        for id in prior.iter().filter(|id| !kept.contains(id)) {
            self.deregister_service(ctx, data, &node, id).await?;
        }
        self.register(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let node = data.id_or_empty().to_string();
        let Some(catalog_node) = ctx.api.catalog_node(&node, &query_options(data)).await? else {
            data.clear_id();
            return Ok(());
        };
        let (managed, foreign): (Vec<_>, Vec<_>) =
            catalog_node.services.values().partition(|s| is_managed(ctx, s));
        for service in &managed {
            self.deregister_service(ctx, data, &node, &service.id).await?;
        }
        if foreign.is_empty() {
            let deregistration = CatalogDeregistration {
                node: node.clone(),
                datacenter: data.get_string("datacenter"),
                ..Default::default()
            };
            ctx.api
                .catalog_deregister(&deregistration, &write_options(data))
                .await?;
        } else {
            warn!(%node, foreign = foreign.len(), "node keeps services registered by other sources");
        }
        data.clear_id();
        Ok(())
    }
}
