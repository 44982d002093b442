//! The `keys` resource: a set of individually declared keys
//!
//! A key with a `value` is written; a key with only a `default` is read and
//! falls back to the default while absent. Keys marked `delete` are removed
//! when dropped from the declaration and when the resource is destroyed;
//! everything else is left behind. Once every written key is missing the
//! resource reads as gone.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};

use meshcfg_common::{Attribute, AttributeType, Error, ResourceData, Result, Schema};

use crate::resource::{datacenter, gone, query_options, write_options, Context, Resource};

/// ID of every `keys` resource
pub const KEYS_ID: &str = "keys";

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    let key = Schema::new()
        .attr("path", Attribute::required(AttributeType::String))
        .attr("value", Attribute::optional(AttributeType::String))
        .attr("default", Attribute::optional(AttributeType::String))
        .attr("flags", Attribute::optional(AttributeType::Int))
        .attr("delete", Attribute::optional(AttributeType::Bool));
    Schema::new()
        .attr("key", Attribute::block_set(key))
        .attr(
            "datacenter",
            Attribute::optional(AttributeType::String).computed().force_new(),
        )
        .attr(
            "partition",
            Attribute::optional(AttributeType::String).force_new(),
        )
        .attr(
            "namespace",
            Attribute::optional(AttributeType::String).force_new(),
        )
});

/// One declared key
#[derive(Clone, Debug, PartialEq, Eq)]
struct Key {
    path: String,
    value: Option<String>,
    default: Option<String>,
    flags: u64,
    delete: bool,
}

impl Key {
    fn from_block(block: &Map<String, Value>) -> Result<Self> {
        let text = |k: &str| {
            block
                .get(k)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let path = text("path").ok_or_else(|| Error::decode_field("key.path", "must be set"))?;
        let flags = block.get("flags").and_then(Value::as_i64).unwrap_or(0);
        let flags = u64::try_from(flags)
            .map_err(|_| Error::decode_field("key.flags", format!("{flags} is negative")))?;
        Ok(Self {
            path,
            value: text("value"),
            default: text("default"),
            flags,
            delete: block.get("delete").and_then(Value::as_bool).unwrap_or(false),
        })
    }

    fn state(&self, value: Option<&str>) -> Value {
        json!({
            "path": self.path,
            "value": value,
            "default": self.default,
            "flags": self.flags,
            "delete": self.delete,
        })
    }
}

fn keys_of(value: Option<&Value>) -> Result<BTreeMap<String, Key>> {
    value
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(Value::as_object)
                .map(|b| Key::from_block(b).map(|k| (k.path.clone(), k)))
                .collect()
        })
        .unwrap_or_else(|| Ok(BTreeMap::new()))
}

/// The `keys` resource
pub struct KeysResource;

impl KeysResource {
    async fn write(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let declared = keys_of(data.get("key"))?;
        let prior = keys_of(data.prior().get("key"))?;
        let opts = write_options(data);
        for (path, key) in prior.iter().filter(|(p, _)| !declared.contains_key(*p)) {
            if key.delete {
                ctx.api.kv_delete(path, &opts).await?;
                info!(%path, "deleted key");
            }
        }
        for key in declared.values() {
            let Some(value) = key.value.as_deref() else {
                continue;
            };
            let unchanged = prior
                .get(&key.path)
                .is_some_and(|p| p.value.as_deref() == Some(value) && p.flags == key.flags);
            if unchanged {
                debug!(path = %key.path, "key unchanged");
                continue;
            }
            ctx.api
                .kv_put(&key.path, value, key.flags, None, &opts)
                .await?;
            info!(path = %key.path, "wrote key");
        }
        data.set_id(KEYS_ID);
        self.read(ctx, data).await
    }
}

#[async_trait]
impl Resource for KeysResource {
    fn type_name(&self) -> &'static str {
        "keys"
    }

    fn schema(&self) -> &Schema {
        &SCHEMA
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.write(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let declared = keys_of(data.get("key"))?;
        let opts = query_options(data);
        let mut observed = Vec::with_capacity(declared.len());
        let mut written = 0;
        let mut missing = 0;
        for key in declared.values() {
            let remote = match ctx.api.kv_get(&key.path, &opts).await? {
                Some(pair) => Some(pair.text()?),
                None => None,
            };
            if key.value.is_some() {
                written += 1;
                if remote.is_none() {
                    missing += 1;
                }
            }
            let value = match (&key.value, remote) {
                (_, Some(remote)) => Some(remote),
                (None, None) => key.default.clone(),
                (Some(_), None) => None,
            };
            observed.push(key.state(value.as_deref()));
        }
        if written > 0 && missing == written {
            gone(data, self.type_name());
            return Ok(());
        }
        let dc = datacenter(ctx, data).await?;
        let mut sw = data.writer(&SCHEMA);
        sw.set("key", &observed).set("datacenter", &dc);
        sw.finish()
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        self.write(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let declared = keys_of(data.get("key"))?;
        let opts = write_options(data);
        for key in declared.values().filter(|k| k.delete) {
            ctx.api.kv_delete(&key.path, &opts).await?;
            info!(path = %key.path, "deleted key");
        }
        data.clear_id();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::config_entry::testing::context;
    use meshcfg_client::transport::{Method, MockTransport, RequestBody, Response};
    use meshcfg_common::plan::is_converged;

    fn pair(key: &str, value: &str) -> Response {
        use base64::Engine as _;
        let encoded = base64::engine::general_purpose::STANDARD.encode(value);
        Response::json(json!([{"Key": key, "Value": encoded, "Flags": 0}]))
    }

    #[tokio::test]
    async fn values_are_written_and_defaults_only_read() {
        let puts = Arc::new(Mutex::new(Vec::new()));
        let seen = puts.clone();
        let mut transport = MockTransport::new();
        transport
            .expect_write()
            .withf(|method, _, _, _| *method == Method::Put)
            .returning(move |_, path, body, _| {
                if let RequestBody::Raw(bytes) = body {
                    seen.lock()
                        .unwrap()
                        .push((path.to_string(), String::from_utf8(bytes).unwrap()));
                }
                Ok(Response::json(json!(true)))
            });
        transport
            .expect_query()
            .withf(|path, _| path == "/kv/app/url")
            .returning(|_, _| Ok(pair("app/url", "https://a")));
        transport
            .expect_query()
            .withf(|path, _| path == "/kv/app/mode")
            .returning(|_, _| Err(Error::remote(404, "")));
        let ctx = context(transport);

        let declared = json!({
            "key": [
                {"path": "app/url", "value": "https://a"},
                {"path": "app/mode", "default": "blue"}
            ]
        });
        let mut data = ResourceData::from_value(declared.clone());
        KeysResource.create(&ctx, &mut data).await.unwrap();

        assert_eq!(
            *puts.lock().unwrap(),
            vec![("/kv/app/url".to_string(), "https://a".to_string())]
        );
        assert_eq!(data.id(), Some(KEYS_ID));
        let mode = data
            .get_blocks("key")
            .into_iter()
            .find(|k| k["path"] == "app/mode")
            .map(|k| k["value"].clone());
        assert_eq!(mode, Some(json!("blue")));
    }

    #[tokio::test]
    async fn external_change_to_a_written_key_is_drift() {
        let mut transport = MockTransport::new();
        transport
            .expect_query()
            .returning(|_, _| Ok(pair("app/url", "https://b")));
        let ctx = context(transport);

        let declared = json!({"key": [{"path": "app/url", "value": "https://a"}]});
        let mut data = ResourceData::from_value(declared.clone()).with_id(KEYS_ID);
        KeysResource.read(&ctx, &mut data).await.unwrap();
        assert!(!is_converged(
            KeysResource.schema(),
            declared.as_object().unwrap(),
            data.values()
        ));
    }

    #[tokio::test]
    async fn destroy_deletes_only_keys_marked_delete() {
        let mut transport = MockTransport::new();
        transport
            .expect_delete()
            .withf(|path, _| path == "/kv/app/tmp")
            .times(1)
            .returning(|_, _| Ok(Response::json(json!(true))));
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({
            "key": [
                {"path": "app/tmp", "value": "x", "delete": true},
                {"path": "app/keep", "value": "y"}
            ]
        }))
        .with_id(KEYS_ID);
        KeysResource.delete(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), None);
    }

    #[tokio::test]
    async fn every_written_key_missing_reads_as_gone() {
        let mut transport = MockTransport::new();
        transport
            .expect_query()
            .returning(|_, _| Err(Error::remote(404, "")));
        let ctx = context(transport);

        let mut data = ResourceData::from_value(json!({
            "key": [
                {"path": "app/url", "value": "https://a"},
                {"path": "app/mode", "default": "blue"}
            ]
        }))
        .with_id(KEYS_ID);
        KeysResource.read(&ctx, &mut data).await.unwrap();
        assert_eq!(data.id(), None);
    }
}
