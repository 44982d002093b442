//! The `acl_token` resource
//!
//! Tokens are identified by their accessor ID. The secret is generated by
//! the remote unless declared, and is only ever read as part of the token
//! it belongs to. Local tokens never replicate, so writing one does not
//! wait for replication.

use std::sync::LazyLock;

use async_trait::async_trait;
use tracing::{info, instrument};

use meshcfg_client::types::AclToken;
use meshcfg_common::{Attribute, AttributeType, Error, ResourceData, Result, Schema};

use super::{
    link_references, links, node_identities, node_identities_state, node_identity_block, service_identities,
    service_identities_state, service_identity_block, AclImport, AclRef,
};
use crate::replication::ReplicationTarget;
use crate::resource::{gone, observed_or_declared, query_options, write_options, Context, Resource};

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new()
        .attr(
            "accessor_id",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
        .attr(
            "secret_id",
            Attribute::optional(AttributeType::String)
                .computed()
                .sensitive()
                .force_new(),
        )
        .attr("description", Attribute::optional(AttributeType::String))
        .attr(
            "policies",
            Attribute::optional(AttributeType::string_set()).describe("Policy IDs or names"),
        )
        .attr(
            "roles",
            Attribute::optional(AttributeType::string_set()).describe("Role IDs or names"),
        )
        .attr("service_identities", service_identity_block())
        .attr("node_identities", node_identity_block())
        .attr("local", Attribute::optional(AttributeType::Bool).force_new())
        .attr(
            "expiration_time",
            Attribute::optional(AttributeType::String)
                .computed()
                .force_new()
                .describe("RFC 3339 timestamp after which the token is invalid"),
        )
        .attr(
            "partition",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
        .attr(
            "namespace",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
});

/// The `acl_token` resource
pub struct TokenResource;

impl TokenResource {
    fn decode(data: &ResourceData) -> AclToken {
        AclToken {
            accessor_id: data.get_string("accessor_id"),
            secret_id: data.get_string("secret_id"),
            description: data.get_string("description"),
            policies: links(data.get_string_list("policies")),
            roles: links(data.get_string_list("roles")),
            service_identities: service_identities(data),
            node_identities: node_identities(data),
            local: data.get_bool("local"),
            expiration_time: data.get_str("expiration_time").map(str::to_string),
            namespace: data.get_string("namespace"),
            partition: data.get_string("partition"),
            ..Default::default()
        }
    }

    fn store(token: &AclToken, data: &mut ResourceData) -> Result<()> {
        let policies = link_references(&token.policies, &data.get_string_list("policies"));
        let roles = link_references(&token.roles, &data.get_string_list("roles"));
        let partition = observed_or_declared(&token.partition, data, "partition");
        let namespace = observed_or_declared(&token.namespace, data, "namespace");
        let secret = observed_or_declared(&token.secret_id, data, "secret_id");
        let mut sw = data.writer(&SCHEMA);
        sw.set_id(token.accessor_id.clone())
            .set("accessor_id", &token.accessor_id)
            .set("secret_id", &secret)
            .set("description", &token.description)
            .set("policies", &policies)
            .set("roles", &roles)
            .set("service_identities", &service_identities_state(&token.service_identities))
            .set("node_identities", &node_identities_state(&token.node_identities))
            .set("local", &token.local)
            .set("expiration_time", &token.expiration_time)
            .set("partition", &partition)
            .set("namespace", &namespace);
        sw.finish()
    }

    async fn wait(ctx: &Context, token: &AclToken, index: u64) -> Result<()> {
        if token.local {
            return Ok(());
        }
        ctx.replication()
            .wait(&ctx.api, ReplicationTarget::Token, index)
            .await
    }
}

#[async_trait]
impl Resource for TokenResource {
    fn type_name(&self) -> &'static str {
        "acl_token"
    }

    fn schema(&self) -> &Schema {
        &SCHEMA
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let token = Self::decode(data);
        let (created, index) = ctx
            .api
            .acl_token_create(&token, &write_options(data))
            .await?;
        info!(accessor_id = %created.accessor_id, local = created.local, index, "created ACL token");
        Self::store(&created, data)?;
        Self::wait(ctx, &created, index).await?;
        self.read(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.id_or_empty().to_string();
        match ctx.api.acl_token_read(&id, &query_options(data)).await? {
            Some(token) => Self::store(&token, data),
            None => {
                gone(data, self.type_name());
                Ok(())
            }
        }
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let mut token = Self::decode(data);
        token.accessor_id = data.id_or_empty().to_string();
        let (updated, index) = ctx
            .api
            .acl_token_update(&token.accessor_id, &token, &write_options(data))
            .await?;
        info!(accessor_id = %updated.accessor_id, index, "updated ACL token");
        Self::store(&updated, data)?;
        Self::wait(ctx, &updated, index).await?;
        self.read(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        ctx.api
            .acl_token_delete(data.id_or_empty(), &write_options(data))
            .await?;
        data.clear_id();
        Ok(())
    }

    async fn import(&self, _ctx: &Context, id: &str, data: &mut ResourceData) -> Result<()> {
        let import = AclImport::parse(id)?;
        let AclRef::Id(accessor) = import.target else {
            return Err(Error::identity(id, "tokens are imported by accessor ID"));
        };
        let mut sw = data.writer(&SCHEMA);
        sw.set("partition", &import.partition)
            .set("namespace", &import.namespace)
            .set_id(accessor);
        sw.finish()
    }
}
