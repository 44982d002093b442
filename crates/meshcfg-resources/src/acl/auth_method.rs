//! The `acl_auth_method` resource, identified by its name

use std::sync::LazyLock;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, instrument};

use meshcfg_client::types::acl::NamespaceRule;
use meshcfg_client::types::AclAuthMethod;
use meshcfg_common::duration::validate_duration;
use meshcfg_common::{Attribute, AttributeType, Error, Identity, ResourceData, Result, Schema};

use super::required_str;
use crate::resource::{gone, observed_or_declared, query_options, write_options, Context, Resource};

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    let namespace_rule = Schema::new()
        .attr("selector", Attribute::optional(AttributeType::String))
        .attr("bind_namespace", Attribute::required(AttributeType::String));
    Schema::new()
        .attr("name", Attribute::required(AttributeType::String).force_new())
        .attr(
            "type",
            Attribute::required(AttributeType::String)
                .force_new()
                .describe("kubernetes, jwt, oidc or aws-iam"),
        )
        .attr("display_name", Attribute::optional(AttributeType::String))
        .attr("description", Attribute::optional(AttributeType::String))
        .attr("max_token_ttl", Attribute::optional(AttributeType::Duration))
        .attr(
            "token_locality",
            Attribute::optional(AttributeType::String).describe("local or global"),
        )
        .attr(
            "config_json",
            Attribute::required(AttributeType::String)
                .json()
                .describe("Method-specific configuration as a JSON object"),
        )
        .attr("namespace_rule", Attribute::blocks(namespace_rule))
        .attr(
            "partition",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
        .attr(
            "namespace",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
});

/// The `acl_auth_method` resource
pub struct AuthMethodResource;

impl AuthMethodResource {
    fn decode(data: &ResourceData) -> Result<AclAuthMethod> {
        let config: Map<String, Value> = serde_json::from_str(required_str(data, "config_json")?)
            .map_err(|e| Error::decode_field("config_json", format!("invalid JSON object: {e}")))?;
        let max_token_ttl = validate_duration("max_token_ttl", data.get_str("max_token_ttl"))?;
        let locality = data.get_string("token_locality");
        if !matches!(locality.as_str(), "" | "local" | "global") {
            return Err(Error::decode_field("token_locality", "must be local or global"));
        }
        Ok(AclAuthMethod {
            name: required_str(data, "name")?.to_string(),
            method_type: required_str(data, "type")?.to_string(),
            display_name: data.get_string("display_name"),
            description: data.get_string("description"),
            max_token_ttl: max_token_ttl.unwrap_or_default().to_string(),
            token_locality: locality,
            config,
            namespace_rules: data
                .get_blocks("namespace_rule")
                .into_iter()
                .map(|rule| NamespaceRule {
                    selector: rule.get("selector").and_then(Value::as_str).unwrap_or_default().into(),
                    bind_namespace: rule
                        .get("bind_namespace")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .into(),
                })
                .collect(),
            namespace: data.get_string("namespace"),
            partition: data.get_string("partition"),
        })
    }

    fn store(method: &AclAuthMethod, data: &mut ResourceData) -> Result<()> {
        let config = serde_json::to_string(&method.config)?;
        let rules: Vec<Value> = method
            .namespace_rules
            .iter()
            .map(|r| serde_json::json!({"selector": r.selector, "bind_namespace": r.bind_namespace}))
            .collect();
        let partition = observed_or_declared(&method.partition, data, "partition");
        let namespace = observed_or_declared(&method.namespace, data, "namespace");
        let mut sw = data.writer(&SCHEMA);
        sw.set_id(method.name.clone())
            .set("name", &method.name)
            .set("type", &method.method_type)
            .set("display_name", &method.display_name)
            .set("description", &method.description)
            .set("max_token_ttl", &method.max_token_ttl)
            .set("token_locality", &method.token_locality)
            .set("config_json", &config)
            .set("namespace_rule", &rules)
            .set("partition", &partition)
            .set("namespace", &namespace);
        sw.finish()
    }
}

#[async_trait]
impl Resource for AuthMethodResource {
    fn type_name(&self) -> &'static str {
        "acl_auth_method"
    }

    fn schema(&self) -> &Schema {
        &SCHEMA
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let method = Self::decode(data)?;
        let created = ctx
            .api
            .acl_auth_method_create(&method, &write_options(data))
            .await?;
        info!(name = %created.name, method_type = %created.method_type, "created auth method");
        data.set_id(created.name);
        self.read(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let name = data.id_or_empty().to_string();
        match ctx.api.acl_auth_method_read(&name, &query_options(data)).await? {
            Some(method) => Self::store(&method, data),
            None => {
                gone(data, self.type_name());
                Ok(())
            }
        }
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let method = Self::decode(data)?;
        ctx.api
            .acl_auth_method_update(&method, &write_options(data))
            .await?;
        self.read(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        ctx.api
            .acl_auth_method_delete(data.id_or_empty(), &write_options(data))
            .await?;
        data.clear_id();
        Ok(())
    }

    async fn import(&self, _ctx: &Context, id: &str, data: &mut ResourceData) -> Result<()> {
        let identity = Identity::parse(id)?;
        if !identity.kind.is_empty() {
            return Err(Error::identity(id, "expected <name> or <partition>/<namespace>/<name>"));
        }
        let mut sw = data.writer(&SCHEMA);
        sw.set("partition", &identity.partition)
            .set("namespace", &identity.namespace)
            .set_id(identity.name);
        sw.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_entry::testing::context;
    use meshcfg_client::transport::{MockTransport, RequestBody, Response};
    use meshcfg_common::plan::is_converged;
    use serde_json::json;

    fn observed() -> Value {
        json!({
            "Name": "minikube",
            "Type": "kubernetes",
            "MaxTokenTTL": "1h0m0s",
            "Config": {"Host": "https://k8s.local", "ServiceAccountJWT": "eyJ"},
            "NamespaceRules": [{"Selector": "", "BindNamespace": "apps"}]
        })
    }

    #[tokio::test]
    async fn auth_method_config_round_trips_as_json() {
        let mut transport = MockTransport::new();
        transport
            .expect_write()
            .withf(|_, path, body, _| {
                path == "/acl/auth-method"
                    && matches!(body, RequestBody::Json(v)
                        if v["Type"] == "kubernetes" && v["Config"]["Host"] == "https://k8s.local" && v["MaxTokenTTL"] == "1h")
            })
            .returning(|_, _, _, _| Ok(Response::json(observed())));
        transport
            .expect_query()
            .withf(|path, _| path == "/acl/auth-method/minikube")
            .returning(|_, _| Ok(Response::json(observed())));
        let ctx = context(transport);

        let declared = json!({
            "name": "minikube",
            "type": "kubernetes",
            "max_token_ttl": "1h",
            "config_json": "{\"ServiceAccountJWT\": \"eyJ\", \"Host\": \"https://k8s.local\"}",
            "namespace_rule": [{"bind_namespace": "apps"}]
        });
        let mut data = ResourceData::from_value(declared.clone());
        AuthMethodResource.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some("minikube"));
        // the remote reports the TTL in its own normalized form
        assert_eq!(data.get_str("max_token_ttl"), Some("1h0m0s"));
        let mut expected = declared.as_object().unwrap().clone();
        expected.insert("max_token_ttl".into(), json!("1h0m0s"));
        assert!(is_converged(AuthMethodResource.schema(), &expected, data.values()));
    }

    #[test]
    fn invalid_ttl_is_rejected_before_any_request() {
        let data = ResourceData::from_value(json!({
            "name": "m",
            "type": "jwt",
            "max_token_ttl": "forever",
            "config_json": "{}"
        }));
        assert!(matches!(
            AuthMethodResource::decode(&data).unwrap_err(),
            Error::DurationInvalid { .. }
        ));
    }
}
