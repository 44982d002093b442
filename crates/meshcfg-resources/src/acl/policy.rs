//! The `acl_policy` resource

use std::sync::LazyLock;

use async_trait::async_trait;
use tracing::{info, instrument};

use meshcfg_client::types::AclPolicy;
use meshcfg_common::{Attribute, AttributeType, Error, ResourceData, Result, Schema};

use super::{required_str, AclImport, AclRef};
use crate::replication::ReplicationTarget;
use crate::resource::{gone, observed_or_declared, query_options, write_options, Context, Resource};

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new()
        .attr("name", Attribute::required(AttributeType::String))
        .attr("description", Attribute::optional(AttributeType::String))
        .attr(
            "rules",
            Attribute::required(AttributeType::String).describe("Policy rules in HCL or JSON"),
        )
        .attr("datacenters", Attribute::optional(AttributeType::string_set()))
        .attr(
            "partition",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
        .attr(
            "namespace",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
});

/// The `acl_policy` resource
pub struct PolicyResource;

impl PolicyResource {
    fn decode(data: &ResourceData) -> Result<AclPolicy> {
        Ok(AclPolicy {
            id: data.id_or_empty().to_string(),
            name: required_str(data, "name")?.to_string(),
            description: data.get_string("description"),
            rules: required_str(data, "rules")?.to_string(),
            datacenters: data.get_string_list("datacenters"),
            namespace: data.get_string("namespace"),
            partition: data.get_string("partition"),
            ..Default::default()
        })
    }

    fn store(policy: &AclPolicy, data: &mut ResourceData) -> Result<()> {
        let partition = observed_or_declared(&policy.partition, data, "partition");
        let namespace = observed_or_declared(&policy.namespace, data, "namespace");
        let mut sw = data.writer(&SCHEMA);
        sw.set_id(policy.id.clone())
            .set("name", &policy.name)
            .set("description", &policy.description)
            .set("rules", &policy.rules)
            .set("datacenters", &policy.datacenters)
            .set("partition", &partition)
            .set("namespace", &namespace);
        sw.finish()
    }
}

#[async_trait]
impl Resource for PolicyResource {
    fn type_name(&self) -> &'static str {
        "acl_policy"
    }

    fn schema(&self) -> &Schema {
        &SCHEMA
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let policy = Self::decode(data)?;
        let (created, index) = ctx
            .api
            .acl_policy_create(&policy, &write_options(data))
            .await?;
        info!(id = %created.id, name = %created.name, index, "created ACL policy");
        Self::store(&created, data)?;
        ctx.replication()
            .wait(&ctx.api, ReplicationTarget::Policy, index)
            .await?;
        self.read(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.id_or_empty().to_string();
        match ctx.api.acl_policy_read(&id, &query_options(data)).await? {
            Some(policy) => Self::store(&policy, data),
            None => {
                gone(data, self.type_name());
                Ok(())
            }
        }
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let policy = Self::decode(data)?;
        let (updated, index) = ctx
            .api
            .acl_policy_update(&policy.id, &policy, &write_options(data))
            .await?;
        info!(id = %updated.id, index, "updated ACL policy");
        Self::store(&updated, data)?;
        ctx.replication()
            .wait(&ctx.api, ReplicationTarget::Policy, index)
            .await?;
        self.read(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        ctx.api
            .acl_policy_delete(data.id_or_empty(), &write_options(data))
            .await?;
        data.clear_id();
        Ok(())
    }

    async fn import(&self, ctx: &Context, id: &str, data: &mut ResourceData) -> Result<()> {
        let import = AclImport::parse(id)?;
        let mut sw = data.writer(&SCHEMA);
        sw.set("partition", &import.partition)
            .set("namespace", &import.namespace);
        sw.finish()?;
        match import.target {
            AclRef::Id(uuid) => data.set_id(uuid),
            AclRef::Name(name) => {
                let policy = ctx
                    .api
                    .acl_policy_read_by_name(&name, &query_options(data))
                    .await?
                    .ok_or_else(|| Error::identity(id, format!("no ACL policy named {name:?}")))?;
                data.set_id(policy.id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::acl::testing::replicated;
    use crate::config_entry::testing::context;
    use meshcfg_client::transport::{Method, MockTransport, RequestBody, Response};
    use meshcfg_common::plan::is_converged;
    use serde_json::json;

    const POLICY_ID: &str = "8d0f3a4e-6c1b-4f0e-9a53-0b1f2c3d4e5f";
    const RULES: &str = "node_prefix \"\" { policy = \"read\" }";

    fn observed() -> serde_json::Value {
        json!({
            "ID": POLICY_ID,
            "Name": "p1",
            "Rules": RULES,
            "Datacenters": ["dc1"],
            "CreateIndex": 42,
            "ModifyIndex": 42
        })
    }

    /// A created policy is only read back once replication has caught up
    /// with the write index
    #[tokio::test(start_paused = true)]
    async fn story_policy_create_waits_for_replication() {
        let polls = Arc::new(AtomicU32::new(0));
        let seen = polls.clone();
        let mut transport = MockTransport::new();
        transport
            .expect_write()
            .withf(|method, path, body, _| {
                *method == Method::Put
                    && path == "/acl/policy"
                    && matches!(body, RequestBody::Json(v) if v["Name"] == "p1" && v["Datacenters"] == json!(["dc1"]))
            })
            .times(1)
            .returning(|_, _, _, _| Ok(Response::with_index(observed(), 42)));
        transport
            .expect_query()
            .withf(|path, _| path == "/acl/replication")
            .times(4)
            .returning(move |_, _| {
                let n = seen.fetch_add(1, Ordering::SeqCst);
                Ok(replicated([10, 20, 40, 45][n as usize]))
            });
        transport
            .expect_query()
            .withf(|path, _| path == format!("/acl/policy/{POLICY_ID}"))
            .times(1)
            .returning(|_, _| Ok(Response::json(observed())));
        let ctx = context(transport);

        let declared = json!({"name": "p1", "rules": RULES, "datacenters": ["dc1"]});
        let mut data = ResourceData::from_value(declared.clone());
        PolicyResource.create(&ctx, &mut data).await.unwrap();

        assert_eq!(polls.load(Ordering::SeqCst), 4);
        assert_eq!(data.id(), Some(POLICY_ID));
        assert!(is_converged(
            PolicyResource.schema(),
            declared.as_object().unwrap(),
            data.values()
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn replication_timeout_keeps_the_created_id() {
        let mut transport = MockTransport::new();
        transport
            .expect_write()
            .returning(|_, _, _, _| Ok(Response::with_index(observed(), 42)));
        transport
            .expect_query()
            .withf(|path, _| path == "/acl/replication")
            .returning(|_, _| Ok(replicated(1)));
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({"name": "p1", "rules": RULES}));
        let err = PolicyResource.create(&ctx, &mut data).await.unwrap_err();
        assert!(matches!(err, Error::ReplicationTimeout { .. }));
        assert_eq!(data.id(), Some(POLICY_ID));
    }

    #[tokio::test]
    async fn import_by_name_resolves_the_id() {
        let mut transport = MockTransport::new();
        transport
            .expect_query()
            .withf(|path, _| path == "/acl/policy/name/p1")
            .returning(|_, _| Ok(Response::json(observed())));
        let ctx = context(transport);

        let mut data = ResourceData::default();
        PolicyResource.import(&ctx, "p1", &mut data).await.unwrap();
        assert_eq!(data.id(), Some(POLICY_ID));
    }

    #[tokio::test]
    async fn deleted_policy_reads_as_gone() {
        let mut transport = MockTransport::new();
        transport
            .expect_query()
            .returning(|_, _| Err(Error::remote(404, "ACL not found")));
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({"name": "p1", "rules": RULES})).with_id(POLICY_ID);
        PolicyResource.read(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), None);
    }
}
