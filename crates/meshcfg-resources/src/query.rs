//! The `prepared_query` resource
//!
//! `failover.nearest_n` may be rewritten by the servers, so reads always take
//! the remote value. Templates and DNS TTLs are stored verbatim.

use std::sync::LazyLock;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, instrument};

use meshcfg_client::types::query::{QueryDns, QueryFailover, QueryTemplate, ServiceQuery};
use meshcfg_client::types::PreparedQuery;
use meshcfg_common::duration::validate_duration;
use meshcfg_common::state::value_to_string_list;
use meshcfg_common::{Attribute, AttributeType, Error, ResourceData, Result, Schema};

use crate::acl::required_str;
use crate::resource::{datacenter, gone, query_options, write_options, Context, Resource};

/// Placeholder the remote returns instead of a stored token
const HIDDEN_TOKEN: &str = "<hidden>";

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    let failover = Schema::new()
        .attr("nearest_n", Attribute::optional(AttributeType::Int).computed())
        .attr("datacenters", Attribute::optional(AttributeType::string_list()));
    let template = Schema::new()
        .attr("type", Attribute::required(AttributeType::String))
        .attr("regexp", Attribute::optional(AttributeType::String))
        .attr("remove_empty_tags", Attribute::optional(AttributeType::Bool));
    let dns = Schema::new().attr("ttl", Attribute::optional(AttributeType::Duration));
    Schema::new()
        .attr("name", Attribute::required(AttributeType::String))
        .attr("service", Attribute::required(AttributeType::String))
        .attr("session", Attribute::optional(AttributeType::String))
        .attr(
            "stored_token",
            Attribute::optional(AttributeType::String).sensitive(),
        )
        .attr("tags", Attribute::optional(AttributeType::string_set()))
        .attr("near", Attribute::optional(AttributeType::String))
        .attr("only_passing", Attribute::optional(AttributeType::Bool))
        .attr("ignore_check_ids", Attribute::optional(AttributeType::string_list()))
        .attr("connect", Attribute::optional(AttributeType::Bool))
        .attr("node_meta", Attribute::optional(AttributeType::Map))
        .attr("service_meta", Attribute::optional(AttributeType::Map))
        .attr("failover", Attribute::block(failover))
        .attr("template", Attribute::block(template))
        .attr("dns", Attribute::block(dns))
        .attr(
            "datacenter",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
        .attr(
            "namespace",
            Attribute::optional(AttributeType::String).force_new(),
        )
});

/// The `prepared_query` resource
pub struct PreparedQueryResource;

impl PreparedQueryResource {
    fn decode(data: &ResourceData) -> Result<PreparedQuery> {
        let failover = match data.get_block("failover") {
            Some(block) => {
                let nearest_n = block.get("nearest_n").and_then(Value::as_i64).unwrap_or(0);
                QueryFailover {
                    nearest_n: u32::try_from(nearest_n).map_err(|_| {
                        Error::decode_field("failover.nearest_n", format!("{nearest_n} is out of range"))
                    })?,
                    datacenters: block
                        .get("datacenters")
                        .map(value_to_string_list)
                        .unwrap_or_default(),
                    ..Default::default()
                }
            }
            None => QueryFailover::default(),
        };
        let template = data
            .get_block("template")
            .map(|block| {
                let text = |k: &str| block.get(k).and_then(Value::as_str).unwrap_or_default().to_string();
                QueryTemplate {
                    template_type: text("type"),
                    regexp: text("regexp"),
                    remove_empty_tags: block
                        .get("remove_empty_tags")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                }
            })
            .unwrap_or_default();
        let ttl = data
            .get_block("dns")
            .and_then(|b| b.get("ttl"))
            .and_then(Value::as_str);
        let ttl = validate_duration("dns.ttl", ttl)?.unwrap_or_default();

        Ok(PreparedQuery {
            id: data.id_or_empty().to_string(),
            name: required_str(data, "name")?.to_string(),
            session: data.get_string("session"),
            token: data.get_string("stored_token"),
            service: ServiceQuery {
                service: required_str(data, "service")?.to_string(),
                failover,
                only_passing: data.get_bool("only_passing"),
                ignore_check_ids: data.get_string_list("ignore_check_ids"),
                near: data.get_string("near"),
                tags: data.get_string_list("tags"),
                node_meta: data.get_map("node_meta"),
                service_meta: data.get_map("service_meta"),
                connect: data.get_bool("connect"),
                namespace: data.get_string("namespace"),
            },
            dns: QueryDns { ttl: ttl.to_string() },
            template,
        })
    }
}

#[async_trait]
impl Resource for PreparedQueryResource {
    fn type_name(&self) -> &'static str {
        "prepared_query"
    }

    fn schema(&self) -> &Schema {
        &SCHEMA
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let query = Self::decode(data)?;
        let id = ctx.api.query_create(&query, &write_options(data)).await?;
        info!(%id, name = %query.name, "created prepared query");
        data.set_id(id);
        self.read(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.id_or_empty().to_string();
        let Some(query) = ctx.api.query_read(&id, &query_options(data)).await? else {
            gone(data, self.type_name());
            return Ok(());
        };
        let token = match query.token.as_str() {
            "" | HIDDEN_TOKEN => data.get_string("stored_token"),
            token => token.to_string(),
        };
        let service = &query.service;
        let failover = json!({
            "nearest_n": service.failover.nearest_n,
            "datacenters": service.failover.datacenters,
        });
        let template = (!query.template.template_type.is_empty()).then(|| {
            json!({
                "type": query.template.template_type,
                "regexp": query.template.regexp,
                "remove_empty_tags": query.template.remove_empty_tags,
            })
        });
        let dns = (!query.dns.ttl.is_empty()).then(|| json!({"ttl": query.dns.ttl}));
        let namespace = crate::resource::observed_or_declared(&service.namespace, data, "namespace");
        let dc = datacenter(ctx, data).await?;

        let mut sw = data.writer(&SCHEMA);
        sw.set("name", &query.name)
            .set("service", &service.service)
            .set("session", &query.session)
            .set("stored_token", &token)
            .set("tags", &service.tags)
            .set("near", &service.near)
            .set("only_passing", &service.only_passing)
            .set("ignore_check_ids", &service.ignore_check_ids)
            .set("connect", &service.connect)
            .set("node_meta", &service.node_meta)
            .set("service_meta", &service.service_meta)
            .set("failover", &failover)
            .set("template", &template)
            .set("dns", &dns)
            .set("datacenter", &dc)
            .set("namespace", &namespace);
        sw.finish()
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let query = Self::decode(data)?;
        ctx.api.query_update(&query, &write_options(data)).await?;
        info!(id = %query.id, "updated prepared query");
        self.read(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        ctx.api
            .query_delete(data.id_or_empty(), &write_options(data))
            .await?;
        data.clear_id();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_entry::testing::context;
    use meshcfg_client::transport::{MockTransport, RequestBody, Response};
    use meshcfg_common::plan::diff;

    const ID: &str = "5e1e24e5-1329-f86f-18c6-3d3734edb2cd";

    fn remote(nearest_n: u32) -> Response {
        Response::json(json!([{
            "ID": ID,
            "Name": "web",
            "Token": HIDDEN_TOKEN,
            "Service": {
                "Service": "web",
                "Tags": ["v1"],
                "OnlyPassing": true,
                "Failover": {"NearestN": nearest_n, "Datacenters": ["dc2"]}
            },
            "DNS": {"TTL": "10s"}
        }]))
    }

    #[tokio::test]
    async fn server_side_nearest_n_is_resynced_on_read() {
        let mut transport = MockTransport::new();
        transport.expect_query().returning(|_, _| Ok(remote(5)));
        let ctx = context(transport);

        let declared = json!({
            "name": "web",
            "service": "web",
            "tags": ["v1"],
            "only_passing": true,
            "stored_token": "query-token",
            "failover": {"nearest_n": 3, "datacenters": ["dc2"]},
            "dns": {"ttl": "10s"}
        });
        let mut data = ResourceData::from_value(declared.clone()).with_id(ID);
        PreparedQueryResource.read(&ctx, &mut data).await.unwrap();

        assert_eq!(data.get_block("failover").unwrap()["nearest_n"], 5);
        assert_eq!(data.get_string("stored_token"), "query-token");
        let changed: Vec<String> = diff(PreparedQueryResource.schema(), declared.as_object().unwrap(), data.values())
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(changed, vec!["failover"]);
    }

    #[tokio::test]
    async fn create_posts_the_query_and_keeps_the_server_id() {
        let mut transport = MockTransport::new();
        transport
            .expect_write()
            .withf(|_, path, body, _| {
                path == "/query"
                    && matches!(body, RequestBody::Json(v)
                        if v["Service"]["Failover"]["NearestN"] == 3 && v["DNS"]["TTL"] == "10s")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(Response::json(json!({"ID": ID}))));
        transport.expect_query().returning(|_, _| Ok(remote(3)));
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({
            "name": "web",
            "service": "web",
            "failover": {"nearest_n": 3, "datacenters": ["dc2"]},
            "dns": {"ttl": "10s"}
        }));
        PreparedQueryResource.create(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), Some(ID));
    }

    #[test]
    fn malformed_dns_ttl_is_rejected() {
        let data = ResourceData::from_value(json!({
            "name": "web",
            "service": "web",
            "dns": {"ttl": "ten seconds"}
        }));
        let err = PreparedQueryResource::decode(&data).unwrap_err();
        assert!(matches!(err, Error::DurationInvalid { ref field, .. } if field == "dns.ttl"));
    }
}
