//! The `license` resource (enterprise only)
//!
//! The signed license text is write-only: reads refresh the decoded license
//! details but never the text itself.

use std::sync::LazyLock;

use async_trait::async_trait;
use tracing::{info, instrument};

use meshcfg_client::types::LicenseReply;
use meshcfg_common::{Attribute, AttributeType, ResourceData, Result, Schema};

use crate::acl::required_str;
use crate::resource::{datacenter, gone, query_options, write_options, Context, Resource};

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    let computed = |ty| Attribute::computed_only(ty);
    Schema::new()
        .attr(
            "license",
            Attribute::required(AttributeType::String).sensitive().force_new(),
        )
        .attr(
            "datacenter",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
        .attr("valid", computed(AttributeType::Bool))
        .attr("license_id", computed(AttributeType::String))
        .attr("customer_id", computed(AttributeType::String))
        .attr("installation_id", computed(AttributeType::String))
        .attr("issue_time", computed(AttributeType::String))
        .attr("start_time", computed(AttributeType::String))
        .attr("expiration_time", computed(AttributeType::String))
        .attr("product", computed(AttributeType::String))
        .attr("features", computed(AttributeType::string_list()))
        .attr("warnings", computed(AttributeType::string_list()))
});

/// The `license` resource
pub struct LicenseResource;

impl LicenseResource {
    async fn store(ctx: &Context, reply: &LicenseReply, data: &mut ResourceData) -> Result<()> {
        let license = reply.license.clone().unwrap_or_default();
        let dc = datacenter(ctx, data).await?;
        let mut sw = data.writer(&SCHEMA);
        sw.set_id(license.license_id.clone())
            .set("datacenter", &dc)
            .set("valid", &reply.valid)
            .set("license_id", &license.license_id)
            .set("customer_id", &license.customer_id)
            .set("installation_id", &license.installation_id)
            .set("issue_time", &license.issue_time)
            .set("start_time", &license.start_time)
            .set("expiration_time", &license.expiration_time)
            .set("product", &license.product)
            .set("features", &license.features)
            .set("warnings", &reply.warnings);
        sw.finish()
    }
}

#[async_trait]
impl Resource for LicenseResource {
    fn type_name(&self) -> &'static str {
        "license"
    }

    fn schema(&self) -> &Schema {
        &SCHEMA
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let text = required_str(data, "license")?.to_string();
        let reply = ctx.api.license_put(&text, &write_options(data)).await?;
        info!(valid = reply.valid, "installed license");
        Self::store(ctx, &reply, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let Some(reply) = ctx.api.license_get(&query_options(data)).await? else {
            gone(data, self.type_name());
            return Ok(());
        };
        let installed = reply.license.as_ref().map(|l| l.license_id.as_str());
        if installed != data.id() {
            gone(data, self.type_name());
            return Ok(());
        }
        Self::store(ctx, &reply, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.read(ctx, data).await
    }

    /// Revert the cluster to its built-in license
    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        ctx.api.license_reset(&write_options(data)).await?;
        info!("reset license");
        data.clear_id();
        Ok(())
    }
}
