//! Operator endpoints: autopilot, network areas, license and the Connect CA

use meshcfg_common::Result;

use crate::client::{decode, enterprise_gate, escape_segment, is_missing, ApiClient};
use crate::transport::{Method, QueryOptions, RequestBody, WriteOptions};
use crate::types::operator::AreaCreated;
use crate::types::{Area, AutopilotConfiguration, CaConfig, LicenseReply};

const NETWORK_AREA: &str = "network_area";
const LICENSE: &str = "license";

impl ApiClient {
    // =========================================================================
    // Autopilot
    // =========================================================================

    /// Current autopilot configuration
    pub async fn autopilot_get(&self, opts: &QueryOptions) -> Result<AutopilotConfiguration> {
        let (config, _) = self
            .get_json("/operator/autopilot/configuration", opts)
            .await?;
        Ok(config)
    }

    /// Replace the autopilot configuration
    pub async fn autopilot_set(&self, config: &AutopilotConfiguration, opts: &WriteOptions) -> Result<()> {
        self.put_unit("/operator/autopilot/configuration", config, opts)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Network areas
    // =========================================================================

    /// Create a network area, returning its ID
    pub async fn area_create(&self, area: &Area, opts: &WriteOptions) -> Result<String> {
        let (created, _): (AreaCreated, _) = self
            .send_json(Method::Post, "/operator/area", area, opts)
            .await
            .map_err(|e| enterprise_gate(e, NETWORK_AREA))?;
        Ok(created.id)
    }

    /// Update a network area in place
    pub async fn area_update(&self, id: &str, area: &Area, opts: &WriteOptions) -> Result<()> {
        let path = format!("/operator/area/{}", escape_segment(id));
        let _: (serde_json::Value, _) = self
            .put_json(&path, area, opts)
            .await
            .map_err(|e| enterprise_gate(e, NETWORK_AREA))?;
        Ok(())
    }

    /// Read a network area by ID
    pub async fn area_read(&self, id: &str, opts: &QueryOptions) -> Result<Option<Area>> {
        let path = format!("/operator/area/{}", escape_segment(id));
        let areas: Option<Option<Vec<Area>>> = self.get_gated(&path, opts, NETWORK_AREA).await?;
        Ok(areas.flatten().and_then(|a| a.into_iter().next()))
    }

    /// Delete a network area
    pub async fn area_delete(&self, id: &str, opts: &WriteOptions) -> Result<()> {
        let path = format!("/operator/area/{}", escape_segment(id));
        match self.delete(&path, opts).await {
            Ok(_) => Ok(()),
            Err(e) => match enterprise_gate(e, NETWORK_AREA) {
                e if is_missing(&e) => Ok(()),
                e => Err(e),
            },
        }
    }

    // =========================================================================
    // License
    // =========================================================================

    /// Current license
    pub async fn license_get(&self, opts: &QueryOptions) -> Result<Option<LicenseReply>> {
        self.get_gated("/operator/license", opts, LICENSE).await
    }

    /// Install a license from its signed text
    pub async fn license_put(&self, license: &str, opts: &WriteOptions) -> Result<LicenseReply> {
        let response = self
            .write(
                Method::Put,
                "/operator/license",
                RequestBody::Raw(license.trim().as_bytes().to_vec()),
                opts,
            )
            .await
            .map_err(|e| enterprise_gate(e, LICENSE))?;
        decode("/operator/license", response.body)
    }

    /// Revert to the built-in license
    pub async fn license_reset(&self, opts: &WriteOptions) -> Result<()> {
        self.delete("/operator/license", opts)
            .await
            .map_err(|e| enterprise_gate(e, LICENSE))?;
        Ok(())
    }

    // =========================================================================
    // Connect CA
    // =========================================================================

    /// Current CA configuration
    pub async fn ca_get(&self, opts: &QueryOptions) -> Result<CaConfig> {
        let (config, _) = self.get_json("/connect/ca/configuration", opts).await?;
        Ok(config)
    }

    /// Replace the CA configuration
    pub async fn ca_set(&self, config: &CaConfig, opts: &WriteOptions) -> Result<()> {
        self.put_unit("/connect/ca/configuration", config, opts)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::transport::{MockTransport, Response};
    use meshcfg_common::Error;
    use serde_json::json;

    #[tokio::test]
    async fn area_create_posts_and_returns_id() {
        let mut transport = MockTransport::new();
        transport
            .expect_write()
            .withf(|method, path, body, _| {
                *method == Method::Post
                    && path == "/operator/area"
                    && matches!(body, RequestBody::Json(v) if v["UseTLS"] == true)
            })
            .returning(|_, _, _, _| Ok(Response::json(json!({"ID": "a-1"}))));
        let client = ApiClient::new(Arc::new(transport));
        let area = Area {
            peer_datacenter: "dc2".into(),
            use_tls: true,
            ..Default::default()
        };
        assert_eq!(
            client
                .area_create(&area, &WriteOptions::default())
                .await
                .unwrap(),
            "a-1"
        );
    }

    #[tokio::test]
    async fn area_read_takes_first_listed() {
        let mut transport = MockTransport::new();
        transport.expect_query().returning(|_, _| {
            Ok(Response::json(json!([{"ID": "a-1", "PeerDatacenter": "dc2", "RetryJoin": null}])))
        });
        let client = ApiClient::new(Arc::new(transport));
        let area = client
            .area_read("a-1", &QueryOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(area.peer_datacenter, "dc2");
        assert!(area.retry_join.is_empty());
    }

    #[tokio::test]
    async fn license_on_community_edition() {
        let mut transport = MockTransport::new();
        transport
            .expect_query()
            .returning(|_, _| Err(Error::remote(404, "Invalid URL path: not a recognized HTTP API endpoint")));
        let client = ApiClient::new(Arc::new(transport));
        let err = client
            .license_get(&QueryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EnterpriseOnly { ref resource } if resource == "license"));
    }
}
