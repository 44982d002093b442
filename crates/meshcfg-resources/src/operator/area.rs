//! The `network_area` resource (enterprise only)

use std::sync::LazyLock;

use async_trait::async_trait;
use tracing::{info, instrument};

use meshcfg_client::types::Area;
use meshcfg_common::{Attribute, AttributeType, ResourceData, Result, Schema};

use crate::acl::required_str;
use crate::resource::{datacenter, gone, query_options, write_options, Context, Resource};

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new()
        .attr(
            "peer_datacenter",
            Attribute::required(AttributeType::String).force_new(),
        )
        .attr("retry_join", Attribute::optional(AttributeType::string_list()))
        .attr("use_tls", Attribute::optional(AttributeType::Bool))
        .attr(
            "datacenter",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
});

/// The `network_area` resource
pub struct NetworkAreaResource;

impl NetworkAreaResource {
    fn decode(data: &ResourceData) -> Result<Area> {
        Ok(Area {
            id: data.id_or_empty().to_string(),
            peer_datacenter: required_str(data, "peer_datacenter")?.to_string(),
            retry_join: data.get_string_list("retry_join"),
            use_tls: data.get_bool("use_tls"),
        })
    }
}

#[async_trait]
impl Resource for NetworkAreaResource {
    fn type_name(&self) -> &'static str {
        "network_area"
    }

    fn schema(&self) -> &Schema {
        &SCHEMA
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let area = Self::decode(data)?;
        let id = ctx.api.area_create(&area, &write_options(data)).await?;
        info!(%id, peer = %area.peer_datacenter, "created network area");
        data.set_id(id);
        self.read(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.id_or_empty().to_string();
        let Some(area) = ctx.api.area_read(&id, &query_options(data)).await? else {
            gone(data, self.type_name());
            return Ok(());
        };
        let dc = datacenter(ctx, data).await?;
        let mut sw = data.writer(&SCHEMA);
        sw.set("peer_datacenter", &area.peer_datacenter)
            .set("retry_join", &area.retry_join)
            .set("use_tls", &area.use_tls)
            .set("datacenter", &dc);
        sw.finish()
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let area = Self::decode(data)?;
        ctx.api.area_update(&area.id, &area, &write_options(data)).await?;
        info!(id = %area.id, "updated network area");
        self.read(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        ctx.api
            .area_delete(data.id_or_empty(), &write_options(data))
            .await?;
        data.clear_id();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_entry::testing::context;
    use meshcfg_client::transport::{MockTransport, Response};
    use meshcfg_common::Error;
    use serde_json::json;

    /// A community-edition remote rejects the area with EnterpriseOnly
    #[tokio::test]
    async fn story_network_area_on_community_edition() {
        let mut transport = MockTransport::new();
        transport.expect_write().times(1).returning(|_, _, _, _| {
            Err(Error::remote(
                404,
                "Invalid URL path: not a recognized HTTP API endpoint",
            ))
        });
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({"peer_datacenter": "dc2"}));
        let err = NetworkAreaResource.create(&ctx, &mut data).await.unwrap_err();
        assert!(matches!(err, Error::EnterpriseOnly { ref resource } if resource == "network_area"));
        assert_eq!(data.id(), None);
    }

    #[tokio::test]
    async fn created_area_is_identified_by_the_server_id() {
        let id = "8f246b77-f3e1-ff88-5b48-8ec93abf3e05";
        let mut transport = MockTransport::new();
        transport
            .expect_write()
            .returning(move |_, _, _, _| Ok(Response::json(json!({"ID": id}))));
        transport
            .expect_query()
            .withf(move |path, _| path == format!("/operator/area/{id}"))
            .returning(move |_, _| {
                Ok(Response::json(json!([{
                    "ID": id, "PeerDatacenter": "dc2", "RetryJoin": ["10.1.2.3"], "UseTLS": true
                }])))
            });
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({
            "peer_datacenter": "dc2",
            "retry_join": ["10.1.2.3"],
            "use_tls": true
        }));
        NetworkAreaResource.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some(id));
        assert_eq!(data.get_string_list("retry_join"), vec!["10.1.2.3"]);
        assert_eq!(data.get_string("datacenter"), "dc1");
    }
}
