//! Catalog and health endpoints

use meshcfg_common::Result;

use crate::client::{escape_segment, ApiClient};
use crate::transport::{QueryOptions, WriteOptions};
use crate::types::{CatalogDeregistration, CatalogNode, CatalogRegistration, CatalogService, HealthCheck};

impl ApiClient {
    /// Register a node, optionally with a service and checks
    pub async fn catalog_register(&self, registration: &CatalogRegistration, opts: &WriteOptions) -> Result<()> {
        self.put_unit("/catalog/register", registration, opts).await?;
        Ok(())
    }

    /// Deregister a node, service or check
    pub async fn catalog_deregister(&self, deregistration: &CatalogDeregistration, opts: &WriteOptions) -> Result<()> {
        self.put_unit("/catalog/deregister", deregistration, opts)
            .await?;
        Ok(())
    }

    /// A node with its services; `None` when the node is not registered
    pub async fn catalog_node(&self, name: &str, opts: &QueryOptions) -> Result<Option<CatalogNode>> {
        let path = format!("/catalog/node/{}", escape_segment(name));
        let node: Option<Option<CatalogNode>> = self.get_optional(&path, opts).await?;
        Ok(node.flatten().filter(|n| n.node.is_some()))
    }

    /// Instances of a service across nodes
    pub async fn catalog_service(&self, name: &str, opts: &QueryOptions) -> Result<Vec<CatalogService>> {
        let path = format!("/catalog/service/{}", escape_segment(name));
        let instances: Option<Option<Vec<CatalogService>>> = self.get_optional(&path, opts).await?;
        Ok(instances.flatten().unwrap_or_default())
    }

    /// Health checks of a service across nodes
    pub async fn health_checks(&self, service: &str, opts: &QueryOptions) -> Result<Vec<HealthCheck>> {
        let path = format!("/health/checks/{}", escape_segment(service));
        let checks: Option<Option<Vec<HealthCheck>>> = self.get_optional(&path, opts).await?;
        Ok(checks.flatten().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::transport::{MockTransport, Response};
    use serde_json::json;

    #[tokio::test]
    async fn null_node_reads_as_missing() {
        let mut transport = MockTransport::new();
        transport
            .expect_query()
            .returning(|_, _| Ok(Response::json(serde_json::Value::Null)));
        let client = ApiClient::new(Arc::new(transport));
        assert!(client
            .catalog_node("gone", &QueryOptions::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn service_instances_decode() {
        let mut transport = MockTransport::new();
        transport
            .expect_query()
            .withf(|path, _| path == "/catalog/service/web")
            .returning(|_, _| {
                Ok(Response::json(json!([
                    {"Node": "n1", "ServiceID": "web-1", "ServiceName": "web", "ServicePort": 80, "ServiceTags": null}
                ])))
            });
        let client = ApiClient::new(Arc::new(transport));
        let instances = client
            .catalog_service("web", &QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].service_port, 80);
        assert!(instances[0].service_tags.is_empty());
    }
}
