//! Key/value endpoints

use meshcfg_common::Result;

use crate::client::{decode, escape_path, is_missing, ApiClient};
use crate::transport::{Method, QueryOptions, RequestBody, WriteOptions};
use crate::types::KvPair;

impl ApiClient {
    /// Read one key
    pub async fn kv_get(&self, key: &str, opts: &QueryOptions) -> Result<Option<KvPair>> {
        let path = format!("/kv/{}", escape_path(key));
        let pairs: Option<Vec<KvPair>> = self.get_optional(&path, opts).await?;
        Ok(pairs.and_then(|p| p.into_iter().find(|pair| pair.key == key)))
    }

    /// Read every key under a prefix
    pub async fn kv_list(&self, prefix: &str, opts: &QueryOptions) -> Result<Vec<KvPair>> {
        let path = format!("/kv/{}", escape_path(prefix));
        let opts = opts.clone().param("recurse", "");
        let pairs: Option<Option<Vec<KvPair>>> = self.get_optional(&path, &opts).await?;
        Ok(pairs.flatten().unwrap_or_default())
    }

    /// Write a key; returns whether the write was applied
    ///
    /// `cas` makes the write conditional on the key's modify index (0 means
    /// "only if absent").
    pub async fn kv_put(
        &self,
        key: &str,
        value: &str,
        flags: u64,
        cas: Option<u64>,
        opts: &WriteOptions,
    ) -> Result<bool> {
        let path = format!("/kv/{}", escape_path(key));
        let mut opts = opts.clone();
        if flags != 0 {
            opts = opts.param("flags", flags.to_string());
        }
        if let Some(cas) = cas {
            opts = opts.param("cas", cas.to_string());
        }
        let response = self
            .write(
                Method::Put,
                &path,
                RequestBody::Raw(value.as_bytes().to_vec()),
                &opts,
            )
            .await?;
        decode::<Option<bool>>(&path, response.body).map(|applied| applied.unwrap_or(true))
    }

    /// Delete one key; missing keys count as deleted
    pub async fn kv_delete(&self, key: &str, opts: &WriteOptions) -> Result<()> {
        let path = format!("/kv/{}", escape_path(key));
        match self.delete(&path, opts).await {
            Ok(_) => Ok(()),
            Err(e) if is_missing(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
