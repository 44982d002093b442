//! Legacy intention endpoints, addressed by ID

use meshcfg_common::Result;

use crate::client::{escape_segment, ApiClient};
use crate::transport::{Method, QueryOptions, WriteOptions};
use crate::types::intention::IntentionCreated;
use crate::types::Intention;

impl ApiClient {
    /// Create an intention, returning its ID
    pub async fn intention_create(&self, intention: &Intention, opts: &WriteOptions) -> Result<String> {
        let (created, _): (IntentionCreated, _) = self
            .send_json(Method::Post, "/connect/intentions", intention, opts)
            .await?;
        Ok(created.id)
    }

    /// Replace an intention
    pub async fn intention_update(&self, intention: &Intention, opts: &WriteOptions) -> Result<()> {
        let path = format!("/connect/intentions/{}", escape_segment(&intention.id));
        self.put_unit(&path, intention, opts).await?;
        Ok(())
    }

    /// Read an intention by ID
    pub async fn intention_read(&self, id: &str, opts: &QueryOptions) -> Result<Option<Intention>> {
        let path = format!("/connect/intentions/{}", escape_segment(id));
        let intention: Option<Option<Intention>> = self.get_optional(&path, opts).await?;
        Ok(intention.flatten())
    }

    /// Delete an intention; missing intentions count as deleted
    pub async fn intention_delete(&self, id: &str, opts: &WriteOptions) -> Result<()> {
        self.delete_existing(&format!("/connect/intentions/{}", escape_segment(id)), opts)
            .await
    }
}
