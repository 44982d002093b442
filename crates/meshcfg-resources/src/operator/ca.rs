//! The `certificate_authority` singleton: Connect CA provider settings

use std::sync::LazyLock;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use meshcfg_client::types::CaConfig;
use meshcfg_common::duration::parse_duration;
use meshcfg_common::{Attribute, AttributeType, Error, ResourceData, Result, Schema};

use crate::acl::required_str;
use crate::resource::{datacenter, gone, query_options, write_options, Context, Resource};

/// ID of the singleton
pub const CA_ID: &str = "connect-ca";

/// Provider settings holding duration strings
const DURATION_KEYS: &[&str] = &[
    "LeafCertTTL",
    "IntermediateCertTTL",
    "RootCertTTL",
    "RotationPeriod",
];

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new()
        .attr(
            "connect_provider",
            Attribute::required(AttributeType::String).describe("consul, vault or aws-pca"),
        )
        .attr(
            "config_json",
            Attribute::optional(AttributeType::String)
                .json()
                .describe("Provider configuration as a JSON object"),
        )
        .attr(
            "datacenter",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
});

fn declared_config(data: &ResourceData) -> Result<Map<String, Value>> {
    let Some(raw) = data.get_str("config_json") else {
        return Ok(Map::new());
    };
    let config: Map<String, Value> = serde_json::from_str(raw)
        .map_err(|e| Error::decode_field("config_json", e.to_string()))?;
    for key in DURATION_KEYS {
        if let Some(value) = config.get(*key).and_then(Value::as_str) {
            parse_duration(&format!("config_json.{key}"), value)?;
        }
    }
    Ok(config)
}

/// The `certificate_authority` resource
pub struct CertificateAuthorityResource;

impl CertificateAuthorityResource {
    async fn apply(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let config = CaConfig {
            provider: required_str(data, "connect_provider")?.to_string(),
            config: declared_config(data)?,
            ..Default::default()
        };
        ctx.api.ca_set(&config, &write_options(data)).await?;
        info!(provider = %config.provider, "applied CA configuration");
        data.set_id(CA_ID);
        self.read(ctx, data).await
    }
}

#[async_trait]
impl Resource for CertificateAuthorityResource {
    fn type_name(&self) -> &'static str {
        "certificate_authority"
    }

    fn schema(&self) -> &Schema {
        &SCHEMA
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.apply(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let remote = match ctx.api.ca_get(&query_options(data)).await {
            Ok(remote) => remote,
            Err(e) if e.is_not_found() => {
                gone(data, self.type_name());
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        // the remote fills in provider defaults; only declared settings are compared
        let declared = declared_config(data)?;
        let observed: Map<String, Value> = remote
            .config
            .into_iter()
            .filter(|(k, _)| declared.contains_key(k))
            .collect();
        let config_json = if observed.is_empty() && declared.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&observed).map_err(|e| Error::serialization(e.to_string()))?)
        };
        let dc = datacenter(ctx, data).await?;
        let mut sw = data.writer(&SCHEMA);
        sw.set("connect_provider", &remote.provider)
            .set("config_json", &config_json)
            .set("datacenter", &dc);
        sw.finish()
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.apply(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, _ctx: &Context, data: &mut ResourceData) -> Result<()> {
        warn!("the CA configuration cannot be deleted, leaving it in place");
        data.clear_id();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_entry::testing::context;
    use meshcfg_client::transport::{MockTransport, RequestBody, Response};
    use meshcfg_common::plan::is_converged;
    use serde_json::json;

    #[tokio::test]
    async fn remote_defaults_are_not_drift() {
        let mut transport = MockTransport::new();
        transport
            .expect_write()
            .withf(|_, path, body, _| {
                path == "/connect/ca/configuration"
                    && matches!(body, RequestBody::Json(v)
                        if v["Provider"] == "consul" && v["Config"]["LeafCertTTL"] == "24h")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(Response::json(json!(null))));
        transport.expect_query().returning(|_, _| {
            Ok(Response::json(json!({
                "Provider": "consul",
                "Config": {"LeafCertTTL": "24h", "RotationPeriod": "2160h", "PrivateKeyType": "ec"},
                "ModifyIndex": 3
            })))
        });
        let ctx = context(transport);

        let declared = json!({"connect_provider": "consul", "config_json": "{\"LeafCertTTL\": \"24h\"}"});
        let mut data = ResourceData::from_value(declared.clone());
        CertificateAuthorityResource.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some(CA_ID));
        assert!(is_converged(
            CertificateAuthorityResource.schema(),
            declared.as_object().unwrap(),
            data.values()
        ));
    }

    #[tokio::test]
    async fn bad_ttl_is_a_duration_error() {
        let mut transport = MockTransport::new();
        transport.expect_write().never();
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({
            "connect_provider": "consul",
            "config_json": "{\"LeafCertTTL\": \"a day\"}"
        }));
        let err = CertificateAuthorityResource.create(&ctx, &mut data).await.unwrap_err();
        assert!(matches!(err, Error::DurationInvalid { ref field, .. } if field == "config_json.LeafCertTTL"));
    }

    #[tokio::test]
    async fn missing_configuration_reads_as_gone() {
        let mut transport = MockTransport::new();
        transport
            .expect_query()
            .returning(|_, _| Err(Error::remote(404, "CA configuration not found")));
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({"connect_provider": "consul"})).with_id(CA_ID);
        CertificateAuthorityResource.read(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), None);
    }
}
