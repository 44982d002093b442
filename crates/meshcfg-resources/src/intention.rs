//! Legacy intentions, addressed by a remote-assigned ID
//!
//! Superseded by service-intentions config entries but still served by the
//! remote; both views share the same underlying rules.

use std::sync::LazyLock;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, instrument};

use meshcfg_client::types::Intention;
use meshcfg_common::{Attribute, AttributeType, Error, ResourceData, Result, Schema};

use crate::config_entry::intentions::check_action;
use crate::resource::{gone, query_options, write_options, Context, Resource};

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new()
        .attr("source_name", Attribute::required(AttributeType::String))
        .attr(
            "source_namespace",
            Attribute::optional(AttributeType::String).computed(),
        )
        .attr("destination_name", Attribute::required(AttributeType::String))
        .attr(
            "destination_namespace",
            Attribute::optional(AttributeType::String).computed(),
        )
        .attr(
            "action",
            Attribute::required(AttributeType::String).describe("allow or deny"),
        )
        .attr("description", Attribute::optional(AttributeType::String))
        .attr("meta", Attribute::optional(AttributeType::Map))
        .attr(
            "datacenter",
            Attribute::optional(AttributeType::String)
                .computed()
                .force_new(),
        )
});

/// The `intention` resource
pub struct IntentionResource;

impl IntentionResource {
    fn decode(data: &ResourceData) -> Result<Intention> {
        let action = data.get_string("action");
        check_action("action", Some(&Value::String(action.clone())))?;
        if action.is_empty() {
            return Err(Error::decode_field("action", "must be allow or deny"));
        }
        Ok(Intention {
            id: data.id_or_empty().to_string(),
            source_ns: data.get_string("source_namespace"),
            source_name: data.get_string("source_name"),
            destination_ns: data.get_string("destination_namespace"),
            destination_name: data.get_string("destination_name"),
            source_type: "consul".into(),
            action,
            description: data.get_string("description"),
            meta: data.get_map("meta"),
            precedence: 0,
        })
    }
}

#[async_trait]
impl Resource for IntentionResource {
    fn type_name(&self) -> &'static str {
        "intention"
    }

    fn schema(&self) -> &Schema {
        &SCHEMA
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let intention = Self::decode(data)?;
        let id = ctx
            .api
            .intention_create(&intention, &write_options(data))
            .await?;
        info!(%id, source = %intention.source_name, destination = %intention.destination_name, "created intention");
        data.set_id(id);
        self.read(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.id_or_empty().to_string();
        let Some(intention) = ctx.api.intention_read(&id, &query_options(data)).await? else {
            gone(data, self.type_name());
            return Ok(());
        };
        let dc = crate::resource::datacenter(ctx, data).await?;
        let mut sw = data.writer(&SCHEMA);
        sw.set("source_name", &intention.source_name)
            .set("source_namespace", &intention.source_ns)
            .set("destination_name", &intention.destination_name)
            .set("destination_namespace", &intention.destination_ns)
            .set("action", &intention.action)
            .set("description", &intention.description)
            .set("meta", &intention.meta)
            .set("datacenter", &dc);
        sw.finish()
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let intention = Self::decode(data)?;
        ctx.api
            .intention_update(&intention, &write_options(data))
            .await?;
        self.read(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        ctx.api
            .intention_delete(data.id_or_empty(), &write_options(data))
            .await?;
        data.clear_id();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_entry::testing::context;
    use meshcfg_client::transport::{Method, MockTransport, RequestBody, Response};
    use serde_json::json;

    #[tokio::test]
    async fn created_intention_takes_the_assigned_id() {
        let mut transport = MockTransport::new();
        transport
            .expect_write()
            .withf(|method, path, body, _| {
                *method == Method::Post
                    && path == "/connect/intentions"
                    && matches!(body, RequestBody::Json(v) if v["Action"] == "deny" && v["SourceType"] == "consul")
            })
            .returning(|_, _, _, _| Ok(Response::json(json!({"ID": "i-1"}))));
        transport
            .expect_query()
            .withf(|path, _| path == "/connect/intentions/i-1")
            .returning(|_, _| {
                Ok(Response::json(json!({
                    "ID": "i-1",
                    "SourceName": "web",
                    "SourceNS": "default",
                    "DestinationName": "db",
                    "DestinationNS": "default",
                    "SourceType": "consul",
                    "Action": "deny",
                    "Precedence": 9
                })))
            });
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({
            "source_name": "web",
            "destination_name": "db",
            "action": "deny"
        }));
        IntentionResource.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some("i-1"));
        assert_eq!(data.get_str("source_namespace"), Some("default"));
        assert_eq!(data.get_str("datacenter"), Some("dc1"));
    }

    #[test]
    fn action_must_be_allow_or_deny() {
        let data = ResourceData::from_value(json!({
            "source_name": "web",
            "destination_name": "db",
            "action": "permit"
        }));
        assert!(matches!(
            IntentionResource::decode(&data).unwrap_err(),
            Error::Decode { .. }
        ));
    }
}
