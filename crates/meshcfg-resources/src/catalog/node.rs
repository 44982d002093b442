//! The `node` resource

use std::sync::LazyLock;

use async_trait::async_trait;
use tracing::{info, instrument};

use meshcfg_client::types::{CatalogDeregistration, CatalogRegistration, Node};
use meshcfg_client::{QueryOptions, WriteOptions};
use meshcfg_common::{Attribute, AttributeType, ResourceData, Result, Schema};

use crate::acl::required_str;
use crate::resource::{datacenter, gone, Context, Resource};

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new()
        .attr("name", Attribute::required(AttributeType::String).force_new())
        .attr("address", Attribute::required(AttributeType::String))
        .attr(
            "datacenter",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
        .attr("meta", Attribute::optional(AttributeType::Map))
        .attr("tagged_addresses", Attribute::optional(AttributeType::Map))
        .attr(
            "partition",
            Attribute::optional(AttributeType::String).force_new(),
        )
});

/// The `node` resource
pub struct NodeResource;

impl NodeResource {
    fn decode(data: &ResourceData) -> Result<CatalogRegistration> {
        Ok(CatalogRegistration {
            node: required_str(data, "name")?.to_string(),
            address: required_str(data, "address")?.to_string(),
            tagged_addresses: data.get_map("tagged_addresses"),
            node_meta: data.get_map("meta"),
            datacenter: data.get_string("datacenter"),
            partition: data.get_string("partition"),
            ..Default::default()
        })
    }

    async fn register(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let registration = Self::decode(data)?;
        ctx.api
            .catalog_register(&registration, &node_write(data))
            .await?;
        info!(node = %registration.node, address = %registration.address, "registered node");
        data.set_id(registration.node);
        self.read(ctx, data).await
    }
}

fn node_query(data: &ResourceData) -> QueryOptions {
    QueryOptions::scoped(data.get_str("partition").unwrap_or_default(), "")
        .in_datacenter(data.get_str("datacenter").unwrap_or_default())
}

fn node_write(data: &ResourceData) -> WriteOptions {
    WriteOptions::scoped(data.get_str("partition").unwrap_or_default(), "")
        .in_datacenter(data.get_str("datacenter").unwrap_or_default())
}

/// Write the observed node's fields
pub(crate) fn store_node(node: &Node, dc: &str, data: &mut ResourceData, schema: &Schema) -> Result<()> {
    let mut sw = data.writer(schema);
    sw.set("name", &node.node)
        .set("address", &node.address)
        .set("datacenter", dc)
        .set("meta", &node.meta)
        .set("tagged_addresses", &node.tagged_addresses);
    sw.finish()
}

#[async_trait]
impl Resource for NodeResource {
    fn type_name(&self) -> &'static str {
        "node"
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
        let Some(node) = ctx
            .api
            .catalog_node(&name, &node_query(data))
            .await?
            .and_then(|n| n.node)
        else {
            gone(data, self.type_name());
            return Ok(());
        };
        let dc = if node.datacenter.is_empty() {
            datacenter(ctx, data).await?
        } else {
            node.datacenter.clone()
        };
        store_node(&node, &dc, data, &SCHEMA)
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.register(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let deregistration = CatalogDeregistration {
            node: data.id_or_empty().to_string(),
            datacenter: data.get_string("datacenter"),
            partition: data.get_string("partition"),
            ..Default::default()
        };
        ctx.api
            .catalog_deregister(&deregistration, &node_write(data))
            .await?;
        info!(node = %deregistration.node, "deregistered node");
        data.clear_id();
        Ok(())
    }
}
