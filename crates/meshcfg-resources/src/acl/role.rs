//! The `acl_role` resource

use std::sync::LazyLock;

use async_trait::async_trait;
use tracing::{info, instrument};

use meshcfg_client::types::AclRole;
use meshcfg_common::{Attribute, AttributeType, Error, ResourceData, Result, Schema};

use super::{
    link_references, links, node_identities, node_identities_state, node_identity_block, required_str,
    service_identities, service_identities_state, service_identity_block, AclImport, AclRef,
};
use crate::replication::ReplicationTarget;
use crate::resource::{gone, observed_or_declared, query_options, write_options, Context, Resource};

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new()
        .attr("name", Attribute::required(AttributeType::String))
        .attr("description", Attribute::optional(AttributeType::String))
        .attr(
            "policies",
            Attribute::optional(AttributeType::string_set()).describe("Policy IDs or names"),
        )
        .attr("service_identities", service_identity_block())
        .attr("node_identities", node_identity_block())
        .attr(
            "partition",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
        .attr(
            "namespace",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
});

/// The `acl_role` resource
pub struct RoleResource;

impl RoleResource {
    fn decode(data: &ResourceData) -> Result<AclRole> {
        Ok(AclRole {
            id: data.id_or_empty().to_string(),
            name: required_str(data, "name")?.to_string(),
            description: data.get_string("description"),
            policies: links(data.get_string_list("policies")),
            service_identities: service_identities(data),
            node_identities: node_identities(data),
            namespace: data.get_string("namespace"),
            partition: data.get_string("partition"),
            ..Default::default()
        })
    }

    fn store(role: &AclRole, data: &mut ResourceData) -> Result<()> {
        let policies = link_references(&role.policies, &data.get_string_list("policies"));
        let partition = observed_or_declared(&role.partition, data, "partition");
        let namespace = observed_or_declared(&role.namespace, data, "namespace");
        let mut sw = data.writer(&SCHEMA);
        sw.set_id(role.id.clone())
            .set("name", &role.name)
            .set("description", &role.description)
            .set("policies", &policies)
            .set("service_identities", &service_identities_state(&role.service_identities))
            .set("node_identities", &node_identities_state(&role.node_identities))
            .set("partition", &partition)
            .set("namespace", &namespace);
        sw.finish()
    }

    async fn write(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let role = Self::decode(data)?;
        let opts = write_options(data);
        let (written, index) = if role.id.is_empty() {
            ctx.api.acl_role_create(&role, &opts).await?
        } else {
            ctx.api.acl_role_update(&role.id, &role, &opts).await?
        };
        info!(id = %written.id, name = %written.name, index, "wrote ACL role");
        Self::store(&written, data)?;
        ctx.replication()
            .wait(&ctx.api, ReplicationTarget::Role, index)
            .await?;
        self.read(ctx, data).await
    }
}

#[async_trait]
impl Resource for RoleResource {
    fn type_name(&self) -> &'static str {
        "acl_role"
    }

    fn schema(&self) -> &Schema {
        &SCHEMA
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        data.clear_id();
        self.write(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.id_or_empty().to_string();
        match ctx.api.acl_role_read(&id, &query_options(data)).await? {
            Some(role) => Self::store(&role, data),
            None => {
                gone(data, self.type_name());
                Ok(())
            }
        }
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.write(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        ctx.api
            .acl_role_delete(data.id_or_empty(), &write_options(data))
            .await?;
        data.clear_id();
        Ok(())
    }

    async fn import(&self, ctx: &Context, id: &str, data: &mut ResourceData) -> Result<()> {
        let import = AclImport::parse(id)?;
        let mut sw = data.writer(&SCHEMA);
        sw.set("partition", &import.partition)
            .set("namespace", &import.namespace);
        sw.finish()?;
        match import.target {
            AclRef::Id(uuid) => data.set_id(uuid),
            AclRef::Name(name) => {
                let role = ctx
                    .api
                    .acl_role_read_by_name(&name, &query_options(data))
                    .await?
                    .ok_or_else(|| Error::identity(id, format!("no ACL role named {name:?}")))?;
                data.set_id(role.id);
            }
        }
        Ok(())
    }
}
