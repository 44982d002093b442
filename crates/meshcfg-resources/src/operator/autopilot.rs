//! The `autopilot_config` singleton
//!
//! There is one autopilot configuration per datacenter. Destroy leaves the
//! last applied configuration in place.

use std::sync::LazyLock;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use meshcfg_client::types::AutopilotConfiguration;
use meshcfg_common::duration::validate_duration;
use meshcfg_common::{Attribute, AttributeType, Error, ResourceData, Result, Schema};

use crate::resource::{datacenter, gone, query_options, write_options, Context, Resource};

const DEFAULT_LAST_CONTACT_THRESHOLD: &str = "200ms";
const DEFAULT_MAX_TRAILING_LOGS: i64 = 250;
const DEFAULT_SERVER_STABILIZATION_TIME: &str = "10s";

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new()
        .attr(
            "datacenter",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
        .attr(
            "cleanup_dead_servers",
            Attribute::optional(AttributeType::Bool).with_default(true),
        )
        .attr(
            "last_contact_threshold",
            Attribute::optional(AttributeType::Duration).with_default(DEFAULT_LAST_CONTACT_THRESHOLD),
        )
        .attr(
            "max_trailing_logs",
            Attribute::optional(AttributeType::Int).with_default(DEFAULT_MAX_TRAILING_LOGS),
        )
        .attr("min_quorum", Attribute::optional(AttributeType::Int))
        .attr(
            "server_stabilization_time",
            Attribute::optional(AttributeType::Duration).with_default(DEFAULT_SERVER_STABILIZATION_TIME),
        )
        .attr("redundancy_zone_tag", Attribute::optional(AttributeType::String))
        .attr("disable_upgrade_migration", Attribute::optional(AttributeType::Bool))
        .attr("upgrade_version_tag", Attribute::optional(AttributeType::String))
});

/// The `autopilot_config` resource
pub struct AutopilotResource;

impl AutopilotResource {
    fn decode(data: &ResourceData) -> Result<AutopilotConfiguration> {
        let last_contact = validate_duration("last_contact_threshold", data.get_str("last_contact_threshold"))?
            .unwrap_or(DEFAULT_LAST_CONTACT_THRESHOLD);
        let stabilization =
            validate_duration("server_stabilization_time", data.get_str("server_stabilization_time"))?
                .unwrap_or(DEFAULT_SERVER_STABILIZATION_TIME);
        let unsigned = |field: &str, default: i64| {
            let n = data.get_i64(field).unwrap_or(default);
            u64::try_from(n).map_err(|_| Error::decode_field(field, format!("{n} is negative")))
        };
        let min_quorum = unsigned("min_quorum", 0)?;
        Ok(AutopilotConfiguration {
            cleanup_dead_servers: data.get_opt_bool("cleanup_dead_servers").unwrap_or(true),
            last_contact_threshold: last_contact.to_string(),
            max_trailing_logs: unsigned("max_trailing_logs", DEFAULT_MAX_TRAILING_LOGS)?,
            min_quorum: u32::try_from(min_quorum)
                .map_err(|_| Error::decode_field("min_quorum", format!("{min_quorum} is too large")))?,
            server_stabilization_time: stabilization.to_string(),
            redundancy_zone_tag: data.get_string("redundancy_zone_tag"),
            disable_upgrade_migration: data.get_bool("disable_upgrade_migration"),
            upgrade_version_tag: data.get_string("upgrade_version_tag"),
            ..Default::default()
        })
    }

    async fn apply(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let config = Self::decode(data)?;
        let dc = datacenter(ctx, data).await?;
        ctx.api.autopilot_set(&config, &write_options(data)).await?;
        info!(datacenter = %dc, "applied autopilot configuration");
        data.set_id(format!("autopilot-{dc}"));
        self.read(ctx, data).await
    }
}

#[async_trait]
impl Resource for AutopilotResource {
    fn type_name(&self) -> &'static str {
        "autopilot_config"
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
        let config = match ctx.api.autopilot_get(&query_options(data)).await {
            Ok(config) => config,
            Err(e) if e.is_not_found() => {
                gone(data, self.type_name());
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let dc = datacenter(ctx, data).await?;
        let mut sw = data.writer(&SCHEMA);
        sw.set("datacenter", &dc)
            .set("cleanup_dead_servers", &config.cleanup_dead_servers)
            .set("last_contact_threshold", &config.last_contact_threshold)
            .set("max_trailing_logs", &config.max_trailing_logs)
            .set("min_quorum", &config.min_quorum)
            .set("server_stabilization_time", &config.server_stabilization_time)
            .set("redundancy_zone_tag", &config.redundancy_zone_tag)
            .set("disable_upgrade_migration", &config.disable_upgrade_migration)
            .set("upgrade_version_tag", &config.upgrade_version_tag);
        sw.finish()
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.apply(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, _ctx: &Context, data: &mut ResourceData) -> Result<()> {
        warn!("autopilot configuration cannot be deleted, leaving it in place");
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

    fn remote_config() -> serde_json::Value {
        json!({
            "CleanupDeadServers": true,
            "LastContactThreshold": "200ms",
            "MaxTrailingLogs": 500,
            "MinQuorum": 3,
            "ServerStabilizationTime": "10s",
            "RedundancyZoneTag": "",
            "DisableUpgradeMigration": false,
            "UpgradeVersionTag": "",
            "ModifyIndex": 9
        })
    }

    #[tokio::test]
    async fn unset_fields_are_sent_with_defaults() {
        let mut transport = MockTransport::new();
        transport
            .expect_write()
            .withf(|_, path, body, _| {
                path == "/operator/autopilot/configuration"
                    && matches!(body, RequestBody::Json(v)
                        if v["LastContactThreshold"] == "200ms"
                            && v["MaxTrailingLogs"] == 500
                            && v["CleanupDeadServers"] == true
                            && v["ServerStabilizationTime"] == "10s")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(Response::json(json!(true))));
        transport
            .expect_query()
            .returning(|_, _| Ok(Response::json(remote_config())));
        let ctx = context(transport);

        let declared = json!({"max_trailing_logs": 500, "min_quorum": 3});
        let mut data = ResourceData::from_value(declared.clone());
        AutopilotResource.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some("autopilot-dc1"));
        assert!(is_converged(
            AutopilotResource.schema(),
            declared.as_object().unwrap(),
            data.values()
        ));
    }

    #[tokio::test]
    async fn malformed_duration_is_rejected_before_any_call() {
        let mut transport = MockTransport::new();
        transport.expect_write().never();
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({"last_contact_threshold": "fast"}));
        let err = AutopilotResource.create(&ctx, &mut data).await.unwrap_err();
        assert!(matches!(err, Error::DurationInvalid { ref field, .. } if field == "last_contact_threshold"));
    }

    #[tokio::test]
    async fn destroy_leaves_configuration_in_place() {
        let mut transport = MockTransport::new();
        transport.expect_write().never();
        transport.expect_delete().never();
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({})).with_id("autopilot-dc1");
        AutopilotResource.delete(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), None);
    }
}
