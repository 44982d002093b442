//! The `peering_token` resource: a token issued for a peer to dial with
//!
//! Tokens are issue-only. Every declared attribute forces a new token and
//! destroy only forgets the issued one.

use std::sync::LazyLock;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use meshcfg_client::types::peering::PeeringGenerateTokenRequest;
use meshcfg_common::{Attribute, AttributeType, ResourceData, Result, Schema};

use crate::acl::required_str;
use crate::resource::{gone, Context, Resource};
use crate::scope::{partition_query, partition_write};

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new()
        .attr("peer_name", Attribute::required(AttributeType::String).force_new())
        .attr(
            "partition",
            Attribute::optional(AttributeType::String).force_new(),
        )
        .attr(
            "meta",
            Attribute::optional(AttributeType::Map).force_new(),
        )
        .attr(
            "server_external_addresses",
            Attribute::optional(AttributeType::string_list()).force_new(),
        )
        .attr(
            "peering_token",
            Attribute::computed_only(AttributeType::String).sensitive(),
        )
});

/// The `peering_token` resource
pub struct PeeringTokenResource;

#[async_trait]
impl Resource for PeeringTokenResource {
    fn type_name(&self) -> &'static str {
        "peering_token"
    }

    fn schema(&self) -> &Schema {
        &SCHEMA
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let request = PeeringGenerateTokenRequest {
            peer_name: required_str(data, "peer_name")?.to_string(),
            partition: data.get_string("partition"),
            meta: data.get_map("meta"),
            server_external_addresses: data.get_string_list("server_external_addresses"),
        };
        let response = ctx
            .api
            .peering_generate_token(&request, &partition_write(data))
            .await?;
        info!(peer = %request.peer_name, "issued peering token");
        let mut sw = data.writer(&SCHEMA);
        sw.set_id(request.peer_name.clone())
            .set("peering_token", &response.peering_token);
        sw.finish()
    }

    /// The token itself cannot be read back; only the pending peering it
    /// created is checked
    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let name = data.id_or_empty().to_string();
        if ctx.api.peering_read(&name, &partition_query(data)).await?.is_none() {
            gone(data, self.type_name());
        }
        Ok(())
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.read(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, _ctx: &Context, data: &mut ResourceData) -> Result<()> {
        warn!(peer = data.id_or_empty(), "peering tokens cannot be revoked, forgetting it");
        data.clear_id();
        Ok(())
    }
}
