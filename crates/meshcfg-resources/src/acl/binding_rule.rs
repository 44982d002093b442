//! The `acl_binding_rule` resource

use std::sync::LazyLock;

use async_trait::async_trait;
use tracing::{info, instrument};

use meshcfg_client::types::AclBindingRule;
use meshcfg_common::{Attribute, AttributeType, Error, ResourceData, Result, Schema};

use super::{required_str, AclImport, AclRef};
use crate::resource::{gone, observed_or_declared, query_options, write_options, Context, Resource};

/// Accepted `bind_type` values
pub const BIND_TYPES: &[&str] = &["service", "node", "role", "templated-policy"];

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new()
        .attr("auth_method", Attribute::required(AttributeType::String))
        .attr("description", Attribute::optional(AttributeType::String))
        .attr("selector", Attribute::optional(AttributeType::String))
        .attr("bind_type", Attribute::required(AttributeType::String))
        .attr("bind_name", Attribute::required(AttributeType::String))
        .attr(
            "partition",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
        .attr(
            "namespace",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
});

/// The `acl_binding_rule` resource
pub struct BindingRuleResource;

impl BindingRuleResource {
    fn decode(data: &ResourceData) -> Result<AclBindingRule> {
        let bind_type = required_str(data, "bind_type")?;
        if !BIND_TYPES.contains(&bind_type) {
            return Err(Error::decode_field(
                "bind_type",
                format!("must be one of {BIND_TYPES:?}, got {bind_type:?}"),
            ));
        }
        Ok(AclBindingRule {
            id: data.id_or_empty().to_string(),
            description: data.get_string("description"),
            auth_method: required_str(data, "auth_method")?.to_string(),
            selector: data.get_string("selector"),
            bind_type: bind_type.to_string(),
            bind_name: required_str(data, "bind_name")?.to_string(),
            namespace: data.get_string("namespace"),
            partition: data.get_string("partition"),
        })
    }

    fn store(rule: &AclBindingRule, data: &mut ResourceData) -> Result<()> {
        let partition = observed_or_declared(&rule.partition, data, "partition");
        let namespace = observed_or_declared(&rule.namespace, data, "namespace");
        let mut sw = data.writer(&SCHEMA);
        sw.set_id(rule.id.clone())
            .set("auth_method", &rule.auth_method)
            .set("description", &rule.description)
            .set("selector", &rule.selector)
            .set("bind_type", &rule.bind_type)
            .set("bind_name", &rule.bind_name)
            .set("partition", &partition)
            .set("namespace", &namespace);
        sw.finish()
    }
}

#[async_trait]
impl Resource for BindingRuleResource {
    fn type_name(&self) -> &'static str {
        "acl_binding_rule"
    }

    fn schema(&self) -> &Schema {
        &SCHEMA
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let rule = Self::decode(data)?;
        let created = ctx
            .api
            .acl_binding_rule_create(&rule, &write_options(data))
            .await?;
        info!(id = %created.id, auth_method = %created.auth_method, "created binding rule");
        data.set_id(created.id);
        self.read(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.id_or_empty().to_string();
        match ctx.api.acl_binding_rule_read(&id, &query_options(data)).await? {
            Some(rule) => Self::store(&rule, data),
            None => {
                gone(data, self.type_name());
                Ok(())
            }
        }
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let rule = Self::decode(data)?;
        ctx.api
            .acl_binding_rule_update(&rule.id, &rule, &write_options(data))
            .await?;
        self.read(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        ctx.api
            .acl_binding_rule_delete(data.id_or_empty(), &write_options(data))
            .await?;
        data.clear_id();
        Ok(())
    }

    async fn import(&self, _ctx: &Context, id: &str, data: &mut ResourceData) -> Result<()> {
        let import = AclImport::parse(id)?;
        let AclRef::Id(rule_id) = import.target else {
            return Err(Error::identity(id, "binding rules are imported by ID"));
        };
        let mut sw = data.writer(&SCHEMA);
        sw.set("partition", &import.partition)
            .set("namespace", &import.namespace)
            .set_id(rule_id);
        sw.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_entry::testing::context;
    use meshcfg_client::transport::{MockTransport, Response};
    use serde_json::json;

    const RULE_ID: &str = "0c9b8a7d-6e5f-4a3b-9c2d-1e0f9a8b7c6d";

    #[tokio::test]
    async fn binding_rule_takes_the_remote_id() {
        let observed = json!({
            "ID": RULE_ID,
            "AuthMethod": "minikube",
            "Selector": "serviceaccount.namespace==default",
            "BindType": "service",
            "BindName": "${serviceaccount.name}"
        });
        let mut transport = MockTransport::new();
        let created = observed.clone();
        transport
            .expect_write()
            .withf(|_, path, _, _| path == "/acl/binding-rule")
            .returning(move |_, _, _, _| Ok(Response::json(created.clone())));
        transport
            .expect_query()
            .withf(|path, _| path == format!("/acl/binding-rule/{RULE_ID}"))
            .returning(move |_, _| Ok(Response::json(observed.clone())));
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({
            "auth_method": "minikube",
            "selector": "serviceaccount.namespace==default",
            "bind_type": "service",
            "bind_name": "${serviceaccount.name}"
        }));
        BindingRuleResource.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some(RULE_ID));
        assert_eq!(data.get_str("bind_type"), Some("service"));
    }

    #[test]
    fn unknown_bind_type_is_rejected() {
        let data = ResourceData::from_value(json!({
            "auth_method": "m",
            "bind_type": "group",
            "bind_name": "x"
        }));
        assert!(matches!(
            BindingRuleResource::decode(&data).unwrap_err(),
            Error::Decode { .. }
        ));
    }
}
