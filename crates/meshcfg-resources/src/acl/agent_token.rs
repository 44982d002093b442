//! Tokens installed on the local agent
//!
//! The agent does not report which token sits in a slot, so read can only
//! check that the declared secret still resolves to a token. Delete leaves
//! the agent untouched.

use std::sync::LazyLock;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use meshcfg_client::types::AgentTokenSlot;
use meshcfg_client::{QueryOptions, WriteOptions};
use meshcfg_common::{Attribute, AttributeType, Error, ResourceData, Result, Schema};

use super::required_str;
use crate::resource::{gone, Context, Resource};

static AGENT_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new()
        .attr(
            "type",
            Attribute::required(AttributeType::String)
                .force_new()
                .describe("default, agent, replication, dns or config_file_service_registration"),
        )
        .attr(
            "token",
            Attribute::required(AttributeType::String).sensitive(),
        )
});

static RECOVERY_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new().attr(
        "token",
        Attribute::required(AttributeType::String).sensitive(),
    )
});

/// `agent_token` and `agent_master_token`
pub struct AgentTokenResource {
    type_name: &'static str,
    /// Fixed slot; `None` takes it from the `type` attribute
    slot: Option<AgentTokenSlot>,
    schema: &'static LazyLock<Schema>,
}

impl AgentTokenResource {
    /// `agent_token`, with the slot chosen by the `type` attribute
    pub fn agent() -> Self {
        Self {
            type_name: "agent_token",
            slot: None,
            schema: &AGENT_SCHEMA,
        }
    }

    /// `agent_master_token`, always the recovery slot
    pub fn recovery() -> Self {
        Self {
            type_name: "agent_master_token",
            slot: Some(AgentTokenSlot::AgentRecovery),
            schema: &RECOVERY_SCHEMA,
        }
    }

    fn slot(&self, data: &ResourceData) -> Result<AgentTokenSlot> {
        if let Some(slot) = self.slot {
            return Ok(slot);
        }
        let name = required_str(data, "type")?;
        match AgentTokenSlot::parse(name) {
            Some(AgentTokenSlot::AgentRecovery) => Err(Error::decode_field(
                "type",
                "the recovery token is managed by agent_master_token",
            )),
            Some(slot) => Ok(slot),
            None => Err(Error::decode_field("type", format!("unknown token type {name:?}"))),
        }
    }

    async fn install(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let slot = self.slot(data)?;
        let token = required_str(data, "token")?;
        ctx.api
            .agent_token_update(slot, token, &WriteOptions::default())
            .await?;
        info!(slot = slot.as_str(), "installed agent token");
        data.set_id(slot.as_str());
        Ok(())
    }
}

#[async_trait]
impl Resource for AgentTokenResource {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn schema(&self) -> &Schema {
        self.schema
    }

    #[instrument(skip_all, fields(resource_type = self.type_name))]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.install(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let secret = data.get_string("token");
        if ctx
            .api
            .acl_token_read_self(&secret, &QueryOptions::default())
            .await?
            .is_none()
        {
            gone(data, self.type_name);
        }
        Ok(())
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.install(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, _ctx: &Context, data: &mut ResourceData) -> Result<()> {
        warn!("the agent keeps its token; it is only removed from state");
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
    async fn token_lands_in_the_declared_slot() {
        let mut transport = MockTransport::new();
        transport
            .expect_write()
            .withf(|method, path, body, _| {
                *method == Method::Put
                    && path == "/agent/token/dns"
                    && matches!(body, RequestBody::Json(v) if v["Token"] == "s-1")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(Response::json(json!(null))));
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({"type": "dns", "token": "s-1"}));
        AgentTokenResource::agent().create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some("dns"));
    }

    #[tokio::test]
    async fn master_token_uses_the_recovery_slot() {
        let mut transport = MockTransport::new();
        transport
            .expect_write()
            .withf(|_, path, _, _| path == "/agent/token/agent_recovery")
            .times(1)
            .returning(|_, _, _, _| Ok(Response::json(json!(null))));
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({"token": "s-1"}));
        AgentTokenResource::recovery().create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some("agent_recovery"));
    }

    #[test]
    fn recovery_slot_is_not_an_agent_token_type() {
        let data = ResourceData::from_value(json!({"type": "agent_master", "token": "s"}));
        assert!(AgentTokenResource::agent().slot(&data).is_err());
    }

    #[tokio::test]
    async fn revoked_secret_reads_as_gone() {
        let mut transport = MockTransport::new();
        transport
            .expect_query()
            .withf(|path, _| path == "/acl/token/self")
            .returning(|_, _| Err(Error::remote(403, "ACL not found")));
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({"type": "agent", "token": "s"})).with_id("agent");
        AgentTokenResource::agent().read(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), None);
    }
}
