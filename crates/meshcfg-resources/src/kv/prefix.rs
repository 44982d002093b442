//! The `key_prefix` resource: exclusive ownership of a key tree
//!
//! Every key under `path_prefix` belongs to the resource. Keys written by
//! someone else show up as undeclared subkeys on read, so the next plan
//! removes them. Destroy removes the keys recorded in `managed_keys` and
//! nothing else.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, instrument};

use meshcfg_common::{Attribute, AttributeType, Error, ResourceData, Result, Schema};

use crate::resource::{datacenter, gone, query_options, write_options, Context, Resource};

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    let subkey = Schema::new()
        .attr("path", Attribute::required(AttributeType::String))
        .attr("value", Attribute::required(AttributeType::String))
        .attr("flags", Attribute::optional(AttributeType::Int));
    Schema::new()
        .attr(
            "path_prefix",
            Attribute::required(AttributeType::String)
                .force_new()
                .describe("Must end with a slash"),
        )
        .attr(
            "subkeys",
            Attribute::optional(AttributeType::Map).describe("Values by path relative to the prefix"),
        )
        .attr(
            "subkey",
            Attribute::block_set(subkey).describe("Subkeys that need flags"),
        )
        .attr(
            "managed_keys",
            Attribute::computed_only(AttributeType::string_set()),
        )
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

/// Value and flags of one subkey
#[derive(Clone, Debug, PartialEq, Eq)]
struct Entry {
    value: String,
    flags: u64,
}

/// Declared subkeys by relative path, from both `subkeys` and `subkey`
fn subkeys_of(values: &serde_json::Map<String, Value>) -> Result<BTreeMap<String, Entry>> {
    let mut out = BTreeMap::new();
    if let Some(Value::Object(map)) = values.get("subkeys") {
        for (path, value) in map {
            let value = value.as_str().unwrap_or_default().to_string();
            out.insert(path.clone(), Entry { value, flags: 0 });
        }
    }
    if let Some(Value::Array(blocks)) = values.get("subkey") {
        for block in blocks.iter().filter_map(Value::as_object) {
            let path = block.get("path").and_then(Value::as_str).unwrap_or_default();
            let flags = block.get("flags").and_then(Value::as_i64).unwrap_or(0);
            let flags = u64::try_from(flags)
                .map_err(|_| Error::decode_field("subkey.flags", format!("{flags} is negative")))?;
            let value = block.get("value").and_then(Value::as_str).unwrap_or_default().to_string();
            if out.insert(path.to_string(), Entry { value, flags }).is_some() {
                return Err(Error::decode_field(
                    "subkey",
                    format!("{path:?} is declared twice"),
                ));
            }
        }
    }
    Ok(out)
}

fn prefix_of(data: &ResourceData) -> Result<String> {
    let prefix = data.get_string("path_prefix");
    if !prefix.ends_with('/') {
        return Err(Error::decode_field(
            "path_prefix",
            format!("{prefix:?} must end with '/'"),
        ));
    }
    Ok(prefix)
}

/// The `key_prefix` resource
pub struct KeyPrefixResource;

impl KeyPrefixResource {
    /// Apply the difference between the prior and declared subkeys
    async fn reconcile(
        &self,
        ctx: &Context,
        data: &mut ResourceData,
        prior: &BTreeMap<String, Entry>,
    ) -> Result<()> {
        let prefix = prefix_of(data)?;
        let declared = subkeys_of(data.values())?;
        let opts = write_options(data);
        for path in prior.keys().filter(|p| !declared.contains_key(*p)) {
            ctx.api.kv_delete(&format!("{prefix}{path}"), &opts).await?;
            info!(%prefix, %path, "deleted subkey");
        }
        for (path, entry) in &declared {
            if prior.get(path) == Some(entry) {
                continue;
            }
            ctx.api
                .kv_put(&format!("{prefix}{path}"), &entry.value, entry.flags, None, &opts)
                .await?;
            info!(%prefix, %path, "wrote subkey");
        }
        let managed: Vec<String> = declared.keys().map(|p| format!("{prefix}{p}")).collect();
        data.set_id(prefix);
        let mut sw = data.writer(&SCHEMA);
        sw.set("managed_keys", &managed);
        sw.finish()?;
        self.read(ctx, data).await
    }
}

#[async_trait]
impl Resource for KeyPrefixResource {
    fn type_name(&self) -> &'static str {
        "key_prefix"
    }

    fn schema(&self) -> &Schema {
        &SCHEMA
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let prefix = prefix_of(data)?;
        let existing = ctx.api.kv_list(&prefix, &query_options(data)).await?;
        let count = existing.iter().filter(|p| p.key != prefix).count();
        if count > 0 {
            return Err(Error::PrefixOccupied { prefix, count });
        }
        self.reconcile(ctx, data, &BTreeMap::new()).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let prefix = match data.id() {
            Some(id) => id.to_string(),
            None => prefix_of(data)?,
        };
        let pairs = ctx.api.kv_list(&prefix, &query_options(data)).await?;
        if pairs.is_empty() && !data.get_string_list("managed_keys").is_empty() {
            gone(data, self.type_name());
            return Ok(());
        }
        let with_flags: Vec<String> = data
            .get_blocks("subkey")
            .into_iter()
            .filter_map(|b| b.get("path").and_then(Value::as_str).map(str::to_string))
            .collect();

        let mut subkeys = BTreeMap::new();
        let mut blocks = Vec::new();
        for pair in &pairs {
            let Some(path) = pair.key.strip_prefix(&prefix).filter(|p| !p.is_empty()) else {
                continue;
            };
            let value = pair.text()?;
            if with_flags.iter().any(|p| p == path) {
                blocks.push(json!({"path": path, "value": value, "flags": pair.flags}));
            } else {
                subkeys.insert(path.to_string(), value);
            }
        }
        let dc = datacenter(ctx, data).await?;
        let mut sw = data.writer(&SCHEMA);
        sw.set("path_prefix", &prefix)
            .set("subkeys", &subkeys)
            .set("subkey", &blocks)
            .set("datacenter", &dc);
        sw.finish()
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let prior = subkeys_of(data.prior())?;
        self.reconcile(ctx, data, &prior).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let opts = write_options(data);
        for key in data.get_string_list("managed_keys") {
            ctx.api.kv_delete(&key, &opts).await?;
        }
        info!(prefix = data.id_or_empty(), "deleted managed keys");
        data.clear_id();
        Ok(())
    }

    /// Adopting a prefix takes ownership of every key already under it
    async fn import(&self, ctx: &Context, id: &str, data: &mut ResourceData) -> Result<()> {
        data.insert("path_prefix", Value::String(id.to_string()));
        let prefix = prefix_of(data)?;
        let managed: Vec<String> = ctx
            .api
            .kv_list(&prefix, &query_options(data))
            .await?
            .into_iter()
            .map(|p| p.key)
            .filter(|k| k != &prefix)
            .collect();
        let mut sw = data.writer(&SCHEMA);
        sw.set("managed_keys", &managed).set_id(prefix);
        sw.finish()
    }
}
