//! Cluster peering endpoints

use meshcfg_common::Result;

use crate::client::{escape_segment, ApiClient};
use crate::transport::{Method, QueryOptions, WriteOptions};
use crate::types::peering::{
    PeeringEstablishRequest, PeeringGenerateTokenRequest, PeeringGenerateTokenResponse,
};
use crate::types::Peering;

impl ApiClient {
    /// Issue a peering token for a peer to establish with
    pub async fn peering_generate_token(
        &self,
        request: &PeeringGenerateTokenRequest,
        opts: &WriteOptions,
    ) -> Result<PeeringGenerateTokenResponse> {
        let (response, _) = self
            .send_json(Method::Post, "/peering/token", request, opts)
            .await?;
        Ok(response)
    }

    /// Establish a peering with a token issued by the peer
    pub async fn peering_establish(&self, request: &PeeringEstablishRequest, opts: &WriteOptions) -> Result<()> {
        let _: (serde_json::Value, _) = self
            .send_json(Method::Post, "/peering/establish", request, opts)
            .await?;
        Ok(())
    }

    /// Read a peering by name
    pub async fn peering_read(&self, name: &str, opts: &QueryOptions) -> Result<Option<Peering>> {
        let path = format!("/peering/{}", escape_segment(name));
        let peering: Option<Option<Peering>> = self.get_optional(&path, opts).await?;
        Ok(peering.flatten())
    }

    /// Delete a peering; missing peerings count as deleted
    pub async fn peering_delete(&self, name: &str, opts: &WriteOptions) -> Result<()> {
        self.delete_existing(&format!("/peering/{}", escape_segment(name)), opts)
            .await
    }
}
