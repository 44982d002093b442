//! Namespaces and admin partitions
//!
//! Both are enterprise features; on other editions every call fails with
//! [`Error::EnterpriseOnly`](meshcfg_common::Error::EnterpriseOnly).

use std::sync::LazyLock;

use async_trait::async_trait;
use tracing::{info, instrument};

use meshcfg_client::types::{Namespace, NamespaceAclConfig, Partition};
use meshcfg_client::{QueryOptions, WriteOptions};
use meshcfg_common::{Attribute, AttributeType, ResourceData, Result, Schema};

use crate::acl::{link_references, links, required_str};
use crate::resource::{gone, Context, Resource};

// =============================================================================
// namespace
// =============================================================================

static NAMESPACE_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new()
        .attr("name", Attribute::required(AttributeType::String).force_new())
        .attr("description", Attribute::optional(AttributeType::String))
        .attr(
            "policy_defaults",
            Attribute::optional(AttributeType::string_set()).describe("Policies linked to every token in the namespace"),
        )
        .attr(
            "role_defaults",
            Attribute::optional(AttributeType::string_set()).describe("Roles linked to every token in the namespace"),
        )
        .attr("meta", Attribute::optional(AttributeType::Map))
        .attr(
            "partition",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
});

/// The `namespace` resource
pub struct NamespaceResource;

impl NamespaceResource {
    fn decode(data: &ResourceData) -> Result<Namespace> {
        let policies = data.get_string_list("policy_defaults");
        let roles = data.get_string_list("role_defaults");
        let acls = (!policies.is_empty() || !roles.is_empty()).then(|| NamespaceAclConfig {
            policy_defaults: links(policies),
            role_defaults: links(roles),
        });
        Ok(Namespace {
            name: required_str(data, "name")?.to_string(),
            description: data.get_string("description"),
            acls,
            meta: data.get_map("meta"),
            partition: data.get_string("partition"),
            ..Default::default()
        })
    }

    fn store(ns: &Namespace, data: &mut ResourceData) -> Result<()> {
        let acls = ns.acls.clone().unwrap_or_default();
        let policies = link_references(&acls.policy_defaults, &data.get_string_list("policy_defaults"));
        let roles = link_references(&acls.role_defaults, &data.get_string_list("role_defaults"));
        let partition = crate::resource::observed_or_declared(&ns.partition, data, "partition");
        let mut sw = data.writer(&NAMESPACE_SCHEMA);
        sw.set_id(ns.name.clone())
            .set("name", &ns.name)
            .set("description", &ns.description)
            .set("policy_defaults", &policies)
            .set("role_defaults", &roles)
            .set("meta", &ns.meta)
            .set("partition", &partition);
        sw.finish()
    }
}

/// Options scoped by the `partition` attribute alone
pub(crate) fn partition_query(data: &ResourceData) -> QueryOptions {
    QueryOptions::scoped(data.get_str("partition").unwrap_or_default(), "")
}

pub(crate) fn partition_write(data: &ResourceData) -> WriteOptions {
    WriteOptions::scoped(data.get_str("partition").unwrap_or_default(), "")
}

#[async_trait]
impl Resource for NamespaceResource {
    fn type_name(&self) -> &'static str {
        "namespace"
    }

    fn schema(&self) -> &Schema {
        &NAMESPACE_SCHEMA
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let ns = Self::decode(data)?;
        let created = ctx.api.namespace_create(&ns, &partition_write(data)).await?;
        info!(namespace = %created.name, "created namespace");
        Self::store(&created, data)
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let name = data.id_or_empty().to_string();
        match ctx.api.namespace_read(&name, &partition_query(data)).await? {
            Some(ns) => Self::store(&ns, data),
            None => {
                gone(data, self.type_name());
                Ok(())
            }
        }
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let ns = Self::decode(data)?;
        let updated = ctx.api.namespace_update(&ns, &partition_write(data)).await?;
        Self::store(&updated, data)
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        ctx.api
            .namespace_delete(data.id_or_empty(), &partition_write(data))
            .await?;
        data.clear_id();
        Ok(())
    }
}

// =============================================================================
// admin_partition
// =============================================================================

static PARTITION_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new()
        .attr("name", Attribute::required(AttributeType::String).force_new())
        .attr("description", Attribute::optional(AttributeType::String))
        .attr("disable_gossip", Attribute::optional(AttributeType::Bool))
});

/// The `admin_partition` resource
pub struct PartitionResource;

impl PartitionResource {
    fn decode(data: &ResourceData) -> Result<Partition> {
        Ok(Partition {
            name: required_str(data, "name")?.to_string(),
            description: data.get_string("description"),
            disable_gossip: data.get_bool("disable_gossip"),
            ..Default::default()
        })
    }

    fn store(partition: &Partition, data: &mut ResourceData) -> Result<()> {
        let mut sw = data.writer(&PARTITION_SCHEMA);
        sw.set_id(partition.name.clone())
            .set("name", &partition.name)
            .set("description", &partition.description)
            .set("disable_gossip", &partition.disable_gossip);
        sw.finish()
    }
}

#[async_trait]
impl Resource for PartitionResource {
    fn type_name(&self) -> &'static str {
        "admin_partition"
    }

    fn schema(&self) -> &Schema {
        &PARTITION_SCHEMA
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let partition = Self::decode(data)?;
        let created = ctx
            .api
            .partition_create(&partition, &WriteOptions::default())
            .await?;
        info!(partition = %created.name, "created admin partition");
        Self::store(&created, data)
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let name = data.id_or_empty().to_string();
        match ctx
            .api
            .partition_read(&name, &QueryOptions::default())
            .await?
        {
            Some(partition) => Self::store(&partition, data),
            None => {
                gone(data, self.type_name());
                Ok(())
            }
        }
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let partition = Self::decode(data)?;
        let updated = ctx
            .api
            .partition_update(&partition, &WriteOptions::default())
            .await?;
        Self::store(&updated, data)
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        ctx.api
            .partition_delete(data.id_or_empty(), &WriteOptions::default())
            .await?;
        data.clear_id();
        Ok(())
    }
}
