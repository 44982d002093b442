//! Cluster peering: the dialing side (`peering`) and the accepting side's
//! issued token (`peering_token`)
//!
//! A peering is identified by the local name given to the peer. The opaque
//! peering token cannot be read back, so imported peerings keep an empty
//! `peering_token`.

pub mod token;

use std::sync::LazyLock;

use async_trait::async_trait;
use tracing::{info, instrument};

use meshcfg_client::types::peering::PeeringEstablishRequest;
use meshcfg_client::types::PeeringState;
use meshcfg_common::{Attribute, AttributeType, ResourceData, Result, Schema};

use crate::acl::required_str;
use crate::resource::{gone, Context, Resource};
use crate::scope::{partition_query, partition_write};

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new()
        .attr("peer_name", Attribute::required(AttributeType::String).force_new())
        .attr(
            "peering_token",
            Attribute::required(AttributeType::String).sensitive().force_new(),
        )
        .attr(
            "partition",
            Attribute::optional(AttributeType::String).force_new(),
        )
        .attr(
            "meta",
            Attribute::optional(AttributeType::Map).force_new(),
        )
        .attr("peering_id", Attribute::computed_only(AttributeType::String))
        .attr("state", Attribute::computed_only(AttributeType::String))
        .attr("peer_id", Attribute::computed_only(AttributeType::String))
        .attr("peer_server_name", Attribute::computed_only(AttributeType::String))
        .attr("peer_ca_pems", Attribute::computed_only(AttributeType::string_list()))
        .attr(
            "peer_server_addresses",
            Attribute::computed_only(AttributeType::string_list()),
        )
        .attr("deleted_at", Attribute::computed_only(AttributeType::String))
});

/// The `peering` resource
pub struct PeeringResource;

#[async_trait]
impl Resource for PeeringResource {
    fn type_name(&self) -> &'static str {
        "peering"
    }

    fn schema(&self) -> &Schema {
        &SCHEMA
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let request = PeeringEstablishRequest {
            peer_name: required_str(data, "peer_name")?.to_string(),
            peering_token: required_str(data, "peering_token")?.to_string(),
            partition: data.get_string("partition"),
            meta: data.get_map("meta"),
        };
        ctx.api
            .peering_establish(&request, &partition_write(data))
            .await?;
        info!(peer = %request.peer_name, "established peering");
        data.set_id(request.peer_name);
        self.read(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let name = data.id_or_empty().to_string();
        let Some(peering) = ctx.api.peering_read(&name, &partition_query(data)).await? else {
            gone(data, self.type_name());
            return Ok(());
        };
        if peering.state == PeeringState::Terminated {
            info!(peer = %name, "peering was terminated by the peer");
        }
        let partition = crate::resource::observed_or_declared(&peering.partition, data, "partition");
        let mut sw = data.writer(&SCHEMA);
        sw.set("peer_name", &peering.name)
            .set("partition", &partition)
            .set("meta", &peering.meta)
            .set("peering_id", &peering.id)
            .set("state", &peering.state)
            .set("peer_id", &peering.peer_id)
            .set("peer_server_name", &peering.peer_server_name)
            .set("peer_ca_pems", &peering.peer_ca_pems)
            .set("peer_server_addresses", &peering.peer_server_addresses)
            .set("deleted_at", &peering.deleted_at);
        sw.finish()
    }

    /// Every declared attribute forces replacement; an update only refreshes
    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.read(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        ctx.api
            .peering_delete(data.id_or_empty(), &partition_write(data))
            .await?;
        info!(peer = data.id_or_empty(), "deleted peering");
        data.clear_id();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_entry::testing::context;
    use meshcfg_client::transport::{MockTransport, RequestBody, Response};
    use serde_json::json;

    fn remote(state: &str) -> Response {
        Response::json(json!({
            "ID": "b3e2a9c1-6a4e-4f0c-9f55-4d0a2c1d8e11",
            "Name": "east",
            "State": state,
            "PeerID": "peer-1",
            "PeerServerName": "server.east.peering.consul",
            "PeerCAPems": ["pem"],
            "PeerServerAddresses": ["10.2.0.1:8502"]
        }))
    }

    #[tokio::test]
    async fn establish_submits_the_token_and_reads_state() {
        let mut transport = MockTransport::new();
        transport
            .expect_write()
            .withf(|_, path, body, _| {
                path == "/peering/establish"
                    && matches!(body, RequestBody::Json(v)
                        if v["PeerName"] == "east" && v["PeeringToken"] == "tok")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(Response::json(json!({}))));
        transport
            .expect_query()
            .withf(|path, _| path == "/peering/east")
            .returning(|_, _| Ok(remote("ESTABLISHING")));
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({"peer_name": "east", "peering_token": "tok"}));
        PeeringResource.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some("east"));
        assert_eq!(data.get_string("state"), "ESTABLISHING");
        assert_eq!(data.get_string_list("peer_server_addresses"), vec!["10.2.0.1:8502"]);
        assert_eq!(data.get_string("peering_token"), "tok");
    }

    #[tokio::test]
    async fn unknown_states_are_kept_verbatim() {
        let mut transport = MockTransport::new();
        transport.expect_query().returning(|_, _| Ok(remote("DRAINING")));
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({"peer_name": "east"})).with_id("east");
        PeeringResource.read(&ctx, &mut data).await.unwrap();
        assert_eq!(data.get_string("state"), "DRAINING");
    }

    #[tokio::test]
    async fn deleted_peering_reads_as_gone() {
        let mut transport = MockTransport::new();
        transport
            .expect_query()
            .returning(|_, _| Err(meshcfg_common::Error::remote(404, "peering not found")));
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({"peer_name": "east"})).with_id("east");
        PeeringResource.read(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), None);
    }
}
