//! Local agent endpoints

use meshcfg_common::Result;

use crate::client::ApiClient;
use crate::transport::{QueryOptions, WriteOptions};
use crate::types::agent::AgentTokenUpdate;
use crate::types::{AgentSelf, AgentTokenSlot};

impl ApiClient {
    /// The agent's own configuration
    pub async fn agent_self(&self) -> Result<AgentSelf> {
        let (me, _) = self
            .get_json("/agent/self", &QueryOptions::default())
            .await?;
        Ok(me)
    }

    /// Datacenter objects default to
    ///
    /// The configured datacenter when set, otherwise the one the agent
    /// reports.
    pub async fn datacenter(&self) -> Result<String> {
        if let Some(dc) = self.configured_datacenter() {
            return Ok(dc.to_string());
        }
        Ok(self.agent_self().await?.config.datacenter)
    }

    /// Set one of the agent's tokens
    pub async fn agent_token_update(&self, slot: AgentTokenSlot, token: &str, opts: &WriteOptions) -> Result<()> {
        let path = format!("/agent/token/{}", slot.as_str());
        let body = AgentTokenUpdate {
            token: token.to_string(),
        };
        self.put_unit(&path, &body, opts).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::transport::{Method, MockTransport, RequestBody, Response};
    use serde_json::json;

    #[tokio::test]
    async fn datacenter_falls_back_to_agent() {
        let mut transport = MockTransport::new();
        transport
            .expect_query()
            .withf(|path, _| path == "/agent/self")
            .times(1)
            .returning(|_, _| Ok(Response::json(json!({"Config": {"Datacenter": "dc1"}}))));
        let client = ApiClient::new(Arc::new(transport));
        assert_eq!(client.datacenter().await.unwrap(), "dc1");
    }

    #[tokio::test]
    async fn configured_datacenter_skips_agent() {
        let client = ApiClient::new(Arc::new(MockTransport::new())).with_datacenter("dc9");
        assert_eq!(client.datacenter().await.unwrap(), "dc9");
    }

    #[tokio::test]
    async fn token_update_targets_slot() {
        let mut transport = MockTransport::new();
        transport
            .expect_write()
            .withf(|method, path, body, _| {
                *method == Method::Put
                    && path == "/agent/token/agent_recovery"
                    && *body == RequestBody::Json(json!({"Token": "s3cret"}))
            })
            .times(1)
            .returning(|_, _, _, _| Ok(Response::json(serde_json::Value::Null)));
        let client = ApiClient::new(Arc::new(transport));
        client
            .agent_token_update(AgentTokenSlot::AgentRecovery, "s3cret", &WriteOptions::default())
            .await
            .unwrap();
    }
}
