//! Config entry endpoints

use meshcfg_common::Result;

use crate::client::{decode, escape_segment, ApiClient};
use crate::transport::{QueryOptions, WriteOptions};
use crate::types::ConfigEntry;

impl ApiClient {
    /// Write an entry; returns whether the remote applied it
    pub async fn config_entry_set(&self, entry: &ConfigEntry, opts: &WriteOptions) -> Result<bool> {
        let (applied, _): (Option<bool>, _) = self.put_json("/config", entry, opts).await?;
        Ok(applied.unwrap_or(true))
    }

    /// Read an entry by kind and name
    pub async fn config_entry_get(&self, kind: &str, name: &str, opts: &QueryOptions) -> Result<Option<ConfigEntry>> {
        let path = format!("/config/{}/{}", escape_segment(kind), escape_segment(name));
        let body: Option<serde_json::Value> = self.get_optional(&path, opts).await?;
        body.filter(|b| !b.is_null())
            .map(|b| decode(&path, b))
            .transpose()
    }

    /// Delete an entry; missing entries count as deleted
    pub async fn config_entry_delete(&self, kind: &str, name: &str, opts: &WriteOptions) -> Result<()> {
        let path = format!("/config/{}/{}", escape_segment(kind), escape_segment(name));
        self.delete_existing(&path, opts).await
    }
}
