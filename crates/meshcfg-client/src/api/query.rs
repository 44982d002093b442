//! Prepared query endpoints

use meshcfg_common::Result;

use crate::client::{escape_segment, ApiClient};
use crate::transport::{Method, QueryOptions, WriteOptions};
use crate::types::query::QueryCreated;
use crate::types::PreparedQuery;

impl ApiClient {
    /// Create a prepared query, returning its ID
    pub async fn query_create(&self, query: &PreparedQuery, opts: &WriteOptions) -> Result<String> {
        let (created, _): (QueryCreated, _) = self
            .send_json(Method::Post, "/query", query, opts)
            .await?;
        Ok(created.id)
    }

    /// Replace a prepared query
    pub async fn query_update(&self, query: &PreparedQuery, opts: &WriteOptions) -> Result<()> {
        let path = format!("/query/{}", escape_segment(&query.id));
        self.put_unit(&path, query, opts).await?;
        Ok(())
    }

    /// Read a prepared query by ID
    pub async fn query_read(&self, id: &str, opts: &QueryOptions) -> Result<Option<PreparedQuery>> {
        let path = format!("/query/{}", escape_segment(id));
        let queries: Option<Option<Vec<PreparedQuery>>> = self.get_optional(&path, opts).await?;
        Ok(queries.flatten().and_then(|q| q.into_iter().next()))
    }

    /// Delete a prepared query; missing queries count as deleted
    pub async fn query_delete(&self, id: &str, opts: &WriteOptions) -> Result<()> {
        self.delete_existing(&format!("/query/{}", escape_segment(id)), opts)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::transport::{MockTransport, RequestBody, Response};
    use serde_json::json;

    #[tokio::test]
    async fn update_puts_to_the_query_id() {
        let mut transport = MockTransport::new();
        transport
            .expect_write()
            .withf(|method, path, body, _| {
                *method == Method::Put
                    && path == "/query/q-1"
                    && matches!(body, RequestBody::Json(v) if v["Service"]["Service"] == "web")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(Response::json(serde_json::Value::Null)));
        let client = ApiClient::new(Arc::new(transport));
        let mut query = PreparedQuery {
            id: "q-1".into(),
            name: "web".into(),
            ..Default::default()
        };
        query.service.service = "web".into();
        client
            .query_update(&query, &WriteOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn read_unwraps_single_element_list() {
        let mut transport = MockTransport::new();
        transport
            .expect_query()
            .returning(|_, _| Ok(Response::json(json!([{"ID": "q-1", "Name": "web", "DNS": {"TTL": "10s"}}]))));
        let client = ApiClient::new(Arc::new(transport));
        let query = client
            .query_read("q-1", &QueryOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(query.dns.ttl, "10s");
    }
}
