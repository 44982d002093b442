//! The `acl_bootstrap_token` resource
//!
//! Bootstrapping happens once per cluster and cannot be undone, so delete
//! only forgets the token.

use std::sync::LazyLock;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use meshcfg_client::types::AclToken;
use meshcfg_common::{Attribute, AttributeType, ResourceData, Result, Schema};

use crate::resource::{gone, Context, Resource};
use meshcfg_client::WriteOptions;

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new()
        .attr("accessor_id", Attribute::computed_only(AttributeType::String))
        .attr(
            "secret_id",
            Attribute::computed_only(AttributeType::String).sensitive(),
        )
        .attr("description", Attribute::computed_only(AttributeType::String))
});

/// The `acl_bootstrap_token` resource
pub struct BootstrapTokenResource;

impl BootstrapTokenResource {
    fn store(token: &AclToken, secret: &str, data: &mut ResourceData) -> Result<()> {
        let mut sw = data.writer(&SCHEMA);
        sw.set_id(token.accessor_id.clone())
            .set("accessor_id", &token.accessor_id)
            .set("secret_id", secret)
            .set("description", &token.description);
        sw.finish()
    }
}

#[async_trait]
impl Resource for BootstrapTokenResource {
    fn type_name(&self) -> &'static str {
        "acl_bootstrap_token"
    }

    fn schema(&self) -> &Schema {
        &SCHEMA
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let token = ctx.api.acl_bootstrap(&WriteOptions::default()).await?;
        info!(accessor_id = %token.accessor_id, "bootstrapped the ACL system");
        Self::store(&token, &token.secret_id, data)
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let secret = data.get_string("secret_id");
        match ctx.api.acl_token_read_self(&secret, &Default::default()).await? {
            Some(token) => Self::store(&token, &secret, data),
            None => {
                gone(data, self.type_name());
                Ok(())
            }
        }
    }

    async fn update(&self, _ctx: &Context, _data: &mut ResourceData) -> Result<()> {
        Ok(())
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, _ctx: &Context, data: &mut ResourceData) -> Result<()> {
        warn!("the bootstrap token stays valid on the cluster; it is only removed from state");
        data.clear_id();
        Ok(())
    }
}
