//! Exported services on the V2 resource API
//!
//! Unlike the config-entry kinds these live under
//! `/api/multicluster/v2/<kind>/<name>` and carry their payload in a `data`
//! object. The three kinds differ in scope: `ExportedServices` names its
//! services explicitly, `NamespaceExportedServices` and
//! `PartitionExportedServices` export everything in their namespace or
//! partition.

use std::sync::LazyLock;

use async_trait::async_trait;
use tracing::{info, instrument};

use meshcfg_client::types::v2::{
    ExportedServicesConsumer, ExportedServicesData, ResourceId, ResourceType, Tenancy,
};
use meshcfg_client::types::V2Resource;
use meshcfg_common::{Attribute, AttributeType, Error, Identity, ResourceData, Result, Schema};

use crate::resource::{gone, observed_or_declared, query_options, write_options, Context, Resource};

/// API group of the exported-services kinds
pub const GROUP: &str = "multicluster";

/// Version of the exported-services kinds
pub const GROUP_VERSION: &str = "v2";

/// Accepted V2 kinds
pub const KINDS: &[&str] = &[
    "ExportedServices",
    "NamespaceExportedServices",
    "PartitionExportedServices",
];

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new()
        .attr(
            "kind",
            Attribute::required(AttributeType::String)
                .force_new()
                .describe("ExportedServices, NamespaceExportedServices or PartitionExportedServices"),
        )
        .attr("name", Attribute::required(AttributeType::String).force_new())
        .attr(
            "partition",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
        .attr(
            "namespace",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
        .attr("services", Attribute::optional(AttributeType::string_list()))
        .attr("peer_consumers", Attribute::optional(AttributeType::string_list()))
        .attr("partition_consumers", Attribute::optional(AttributeType::string_list()))
        .attr(
            "sameness_group_consumers",
            Attribute::optional(AttributeType::string_list()),
        )
});

fn resource_type(kind: &str) -> Result<ResourceType> {
    if !KINDS.contains(&kind) {
        return Err(Error::decode_field(
            "kind",
            format!("must be one of {KINDS:?}, got {kind:?}"),
        ));
    }
    Ok(ResourceType {
        group: GROUP.into(),
        group_version: GROUP_VERSION.into(),
        kind: kind.into(),
    })
}

/// The `config_entry_v2_exported_services` resource
pub struct ExportedServicesV2;

impl ExportedServicesV2 {
    fn decode(data: &ResourceData) -> Result<(ResourceType, String, V2Resource)> {
        let rtype = resource_type(&data.get_string("kind"))?;
        let name = data
            .get_str("name")
            .ok_or_else(|| Error::decode_field("name", "must be set"))?
            .to_string();
        let consumers = data
            .get_string_list("peer_consumers")
            .into_iter()
            .map(|peer| ExportedServicesConsumer {
                peer: Some(peer),
                ..Default::default()
            })
            .chain(data.get_string_list("partition_consumers").into_iter().map(|partition| {
                ExportedServicesConsumer {
                    partition: Some(partition),
                    ..Default::default()
                }
            }))
            .chain(
                data.get_string_list("sameness_group_consumers")
                    .into_iter()
                    .map(|group| ExportedServicesConsumer {
                        sameness_group: Some(group),
                        ..Default::default()
                    }),
            )
            .collect();
        let payload = ExportedServicesData {
            services: data.get_string_list("services"),
            consumers,
        };
        let resource = V2Resource {
            id: Some(ResourceId {
                name: name.clone(),
                resource_type: rtype.clone(),
                tenancy: Tenancy {
                    partition: data.get_string("partition"),
                    namespace: data.get_string("namespace"),
                },
                uid: String::new(),
            }),
            data: serde_json::to_value(&payload)?,
            ..Default::default()
        };
        Ok((rtype, name, resource))
    }

    fn store(kind: &str, name: &str, resource: &V2Resource, data: &mut ResourceData) -> Result<()> {
        let payload: ExportedServicesData = serde_json::from_value(resource.data.clone())
            .map_err(|e| Error::serialization(format!("invalid exported services payload: {e}")))?;
        let tenancy = resource.id.as_ref().map(|id| id.tenancy.clone()).unwrap_or_default();
        let partition = observed_or_declared(&tenancy.partition, data, "partition");
        let namespace = observed_or_declared(&tenancy.namespace, data, "namespace");

        let (mut peers, mut partitions, mut groups) = (Vec::new(), Vec::new(), Vec::new());
        for consumer in &payload.consumers {
            peers.extend(consumer.peer.clone());
            partitions.extend(consumer.partition.clone());
            groups.extend(consumer.sameness_group.clone());
        }

        data.set_id(name);
        let mut sw = data.writer(&SCHEMA);
        sw.set("kind", kind)
            .set("name", name)
            .set("partition", &partition)
            .set("namespace", &namespace)
            .set("services", &payload.services)
            .set("peer_consumers", &peers)
            .set("partition_consumers", &partitions)
            .set("sameness_group_consumers", &groups);
        sw.finish()
    }
}

#[async_trait]
impl Resource for ExportedServicesV2 {
    fn type_name(&self) -> &'static str {
        "config_entry_v2_exported_services"
    }

    fn schema(&self) -> &Schema {
        &SCHEMA
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let (rtype, name, resource) = Self::decode(data)?;
        let written = ctx
            .api
            .v2_write(&rtype, &name, &resource, &write_options(data))
            .await?;
        info!(kind = %rtype.kind, %name, version = %written.version, "exported services written");
        self.read_back(ctx, &rtype, &name, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let rtype = resource_type(&data.get_string("kind"))?;
        let name = data.get_str("name").or(data.id()).unwrap_or_default().to_string();
        match ctx.api.v2_read(&rtype, &name, &query_options(data)).await? {
            Some(resource) => Self::store(&rtype.kind, &name, &resource, data),
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
        let rtype = resource_type(&data.get_string("kind"))?;
        let name = data.get_str("name").or(data.id()).unwrap_or_default().to_string();
        ctx.api
            .v2_delete(&rtype, &name, &write_options(data))
            .await?;
        data.clear_id();
        Ok(())
    }

    async fn import(&self, _ctx: &Context, id: &str, data: &mut ResourceData) -> Result<()> {
        let identity = Identity::parse(id)?;
        resource_type(&identity.kind).map_err(|_| {
            Error::identity(id, format!("kind must be one of {KINDS:?}"))
        })?;
        let mut sw = data.writer(&SCHEMA);
        sw.set("kind", &identity.kind)
            .set("name", &identity.name)
            .set("partition", &identity.partition)
            .set("namespace", &identity.namespace)
            .set_id(identity.name.clone());
        sw.finish()
    }
}

impl ExportedServicesV2 {
    async fn read_back(&self, ctx: &Context, rtype: &ResourceType, name: &str, data: &mut ResourceData) -> Result<()> {
        match ctx.api.v2_read(rtype, name, &query_options(data)).await? {
            Some(resource) => Self::store(&rtype.kind, name, &resource, data),
            None => Err(Error::EntryLost {
                kind: rtype.kind.clone(),
                name: name.to_string(),
            }),
        }
    }
}
