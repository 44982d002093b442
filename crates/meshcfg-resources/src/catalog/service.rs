//! The `service` resource
//!
//! Services are registered on an existing node and tagged with the
//! external-source marker in their meta. The marker is how delete tells
//! services this engine registered from ones it merely observes; it never
//! shows up in the `meta` attribute.

use std::sync::LazyLock;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use meshcfg_client::types::{AgentService, CatalogDeregistration, CatalogRegistration, CatalogService};
use meshcfg_common::{Attribute, AttributeType, Error, ResourceData, Result, Schema, EXTERNAL_SOURCE_META_KEY};

use super::{check_block, checks_state, decode_checks};
use crate::acl::required_str;
use crate::resource::{datacenter, gone, observed_or_declared, query_options, write_options, Context, Resource};

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new()
        .attr("name", Attribute::required(AttributeType::String).force_new())
        .attr(
            "service_id",
            Attribute::optional(AttributeType::String)
                .computed()
                .force_new()
                .describe("Defaults to the name"),
        )
        .attr("node", Attribute::required(AttributeType::String).force_new())
        .attr("address", Attribute::optional(AttributeType::String).computed())
        .attr("port", Attribute::optional(AttributeType::Int))
        .attr("tags", Attribute::optional(AttributeType::string_list()))
        .attr("meta", Attribute::optional(AttributeType::Map))
        .attr("enable_tag_override", Attribute::optional(AttributeType::Bool))
        .attr("check", check_block())
        .attr(
            "datacenter",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
        .attr(
            "partition",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
        .attr(
            "namespace",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
});

/// The `service` resource
pub struct ServiceResource;

fn service_id(data: &ResourceData) -> String {
    match data.get_str("service_id").filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => data.get_string("name"),
    }
}

impl ServiceResource {
    fn decode(ctx: &Context, data: &ResourceData, node_address: &str) -> Result<CatalogRegistration> {
        let name = required_str(data, "name")?.to_string();
        let node = required_str(data, "node")?.to_string();
        let id = service_id(data);
        let mut meta = data.get_map("meta");
        if meta.contains_key(EXTERNAL_SOURCE_META_KEY) {
            return Err(Error::decode_field(
                "meta",
                format!("{EXTERNAL_SOURCE_META_KEY:?} is reserved"),
            ));
        }
        meta.insert(
            EXTERNAL_SOURCE_META_KEY.to_string(),
            ctx.settings.external_source.clone(),
        );
        let port = data.get_i64("port").unwrap_or(0);
        let port = u16::try_from(port).map_err(|_| Error::decode_field("port", format!("{port} is not a valid port")))?;
        let checks = decode_checks(&data.get_blocks("check"), &node, &id, &name)?;
        Ok(CatalogRegistration {
            node,
            address: node_address.to_string(),
            datacenter: data.get_string("datacenter"),
            service: Some(AgentService {
                id,
                service: name,
                tags: data.get_string_list("tags"),
                meta,
                port,
                address: data.get_string("address"),
                enable_tag_override: data.get_bool("enable_tag_override"),
                namespace: data.get_string("namespace"),
                partition: data.get_string("partition"),
            }),
            checks,
            skip_node_update: true,
            partition: data.get_string("partition"),
            ..Default::default()
        })
    }

    async fn register(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let node_name = required_str(data, "node")?.to_string();
        let node = ctx
            .api
            .catalog_node(&node_name, &query_options(data))
            .await?
            .and_then(|n| n.node)
            .ok_or_else(|| Error::remote(404, format!("node {node_name:?} is not registered")))?;
        let registration = Self::decode(ctx, data, &node.address)?;
        ctx.api
            .catalog_register(&registration, &write_options(data))
            .await?;
        let id = service_id(data);
        info!(service = %id, node = %node_name, "registered service");
        data.set_id(id);
        self.read(ctx, data).await
    }

    /// The registered instance on the declared node, if any
    async fn instance(&self, ctx: &Context, data: &ResourceData) -> Result<Option<CatalogService>> {
        let node = data.get_string("node");
        let id = data.id().map(str::to_string).unwrap_or_else(|| service_id(data));
        let instances = ctx
            .api
            .catalog_service(&data.get_string("name"), &query_options(data))
            .await?;
        Ok(instances
            .into_iter()
            .find(|s| s.node == node && s.service_id == id))
    }
}

#[async_trait]
impl Resource for ServiceResource {
    fn type_name(&self) -> &'static str {
        "service"
    }

    fn schema(&self) -> &Schema {
        &SCHEMA
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.register(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let Some(instance) = self.instance(ctx, data).await? else {
            gone(data, self.type_name());
            return Ok(());
        };
        let checks: Vec<_> = ctx
            .api
            .health_checks(&instance.service_name, &query_options(data))
            .await?
            .into_iter()
            .filter(|c| c.node == instance.node && c.service_id == instance.service_id)
            .collect();
        let mut meta = instance.service_meta.clone();
        meta.remove(EXTERNAL_SOURCE_META_KEY);
        let dc = if instance.datacenter.is_empty() {
            datacenter(ctx, data).await?
        } else {
            instance.datacenter.clone()
        };
        let partition = observed_or_declared(&instance.partition, data, "partition");
        let namespace = observed_or_declared(&instance.namespace, data, "namespace");

        let mut sw = data.writer(&SCHEMA);
        sw.set("name", &instance.service_name)
            .set("service_id", &instance.service_id)
            .set("node", &instance.node)
            .set("address", &instance.service_address)
            .set("port", &instance.service_port)
            .set("tags", &instance.service_tags)
            .set("meta", &meta)
            .set("enable_tag_override", &instance.service_enable_tag_override)
            .set("check", &checks_state(&checks))
            .set("datacenter", &dc)
            .set("partition", &partition)
            .set("namespace", &namespace);
        sw.finish()
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.register(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let Some(instance) = self.instance(ctx, data).await? else {
            data.clear_id();
            return Ok(());
        };
        let owned = instance
            .service_meta
            .get(EXTERNAL_SOURCE_META_KEY)
            .is_some_and(|source| *source == ctx.settings.external_source);
        if !owned {
            warn!(
                service = %instance.service_id,
                node = %instance.node,
                "service was not registered by this engine, leaving it in place"
            );
            data.clear_id();
            return Ok(());
        }
        let deregistration = CatalogDeregistration {
            node: instance.node.clone(),
            service_id: instance.service_id.clone(),
            datacenter: data.get_string("datacenter"),
            namespace: data.get_string("namespace"),
            partition: data.get_string("partition"),
            ..Default::default()
        };
        ctx.api
            .catalog_deregister(&deregistration, &write_options(data))
            .await?;
        info!(service = %instance.service_id, node = %instance.node, "deregistered service");
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
    use serde_json::{json, Value};

    fn instance(source: &str) -> Value {
        json!([{
            "ID": "",
            "Node": "ext-1",
            "Address": "10.0.0.9",
            "Datacenter": "dc1",
            "ServiceID": "web",
            "ServiceName": "web",
            "ServiceAddress": "10.0.0.9",
            "ServicePort": 8080,
            "ServiceTags": ["v1"],
            "ServiceMeta": {"external-source": source, "team": "edge"}
        }])
    }

    fn health() -> Value {
        json!([{
            "Node": "ext-1",
            "CheckID": "web-http",
            "Name": "web http",
            "Status": "critical",
            "ServiceID": "web",
            "ServiceName": "web",
            "Definition": {"HTTP": "http://10.0.0.9:8080/health", "Interval": "10s", "Timeout": "2s"}
        }])
    }

    #[tokio::test]
    async fn service_carries_the_external_source_marker() {
        let mut transport = MockTransport::new();
        transport
            .expect_query()
            .withf(|path, _| path == "/catalog/node/ext-1")
            .returning(|_, _| Ok(Response::json(json!({"Node": {"Node": "ext-1", "Address": "10.0.0.9"}}))));
        transport
            .expect_write()
            .withf(|_, path, body, _| {
                path == "/catalog/register"
                    && matches!(body, RequestBody::Json(v)
                        if v["Service"]["Meta"] == json!({"external-source": "terraform", "team": "edge"})
                            && v["Checks"][0]["Definition"]["HTTP"] == "http://10.0.0.9:8080/health"
                            && v["Address"] == "10.0.0.9"
                            && v["SkipNodeUpdate"] == true)
            })
            .times(1)
            .returning(|_, _, _, _| Ok(Response::json(json!(true))));
        transport
            .expect_query()
            .withf(|path, _| path == "/catalog/service/web")
            .returning(|_, _| Ok(Response::json(instance("terraform"))));
        transport
            .expect_query()
            .withf(|path, _| path == "/health/checks/web")
            .returning(|_, _| Ok(Response::json(health())));
        let ctx = context(transport);

        let declared = json!({
            "name": "web",
            "node": "ext-1",
            "address": "10.0.0.9",
            "port": 8080,
            "tags": ["v1"],
            "meta": {"team": "edge"},
            "check": [{
                "check_id": "web-http",
                "name": "web http",
                "http": "http://10.0.0.9:8080/health",
                "interval": "10s",
                "timeout": "2s"
            }]
        });
        let mut data = ResourceData::from_value(declared.clone());
        ServiceResource.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some("web"));
        assert_eq!(data.get_map("meta").get("external-source"), None);
        assert!(is_converged(
            ServiceResource.schema(),
            declared.as_object().unwrap(),
            data.values()
        ));
    }

    /// The node was deregistered behind our back; the catalog answers with
    /// an empty list and the service is dropped from state
    #[tokio::test]
    async fn story_service_not_found_on_read() {
        let mut transport = MockTransport::new();
        transport
            .expect_query()
            .withf(|path, _| path == "/catalog/service/foo")
            .times(1)
            .returning(|_, _| Ok(Response::json(json!([]))));
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({"name": "foo", "node": "ext-1"})).with_id("foo");
        ServiceResource.read(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), None);
    }

    #[tokio::test]
    async fn delete_leaves_foreign_services_alone() {
        let mut transport = MockTransport::new();
        transport
            .expect_query()
            .withf(|path, _| path == "/catalog/service/web")
            .returning(|_, _| Ok(Response::json(instance("k8s-sync"))));
        transport.expect_write().never();
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({"name": "web", "node": "ext-1"})).with_id("web");
        ServiceResource.delete(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), None);
    }

    #[tokio::test]
    async fn delete_deregisters_owned_services() {
        let mut transport = MockTransport::new();
        transport
            .expect_query()
            .returning(|_, _| Ok(Response::json(instance("terraform"))));
        transport
            .expect_write()
            .withf(|_, path, body, _| {
                path == "/catalog/deregister"
                    && matches!(body, RequestBody::Json(v) if v["Node"] == "ext-1" && v["ServiceID"] == "web")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(Response::json(json!(true))));
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({"name": "web", "node": "ext-1"})).with_id("web");
        ServiceResource.delete(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), None);
    }

    #[test]
    fn reserved_meta_key_is_rejected() {
        let ctx = context(MockTransport::new());
        let data = ResourceData::from_value(json!({
            "name": "web",
            "node": "ext-1",
            "meta": {"external-source": "me"}
        }));
        assert!(ServiceResource::decode(&ctx, &data, "10.0.0.9").is_err());
    }
}
