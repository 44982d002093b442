//! Namespace and admin partition endpoints
//!
//! Both only exist on enterprise editions.

use meshcfg_common::Result;

use crate::client::{enterprise_gate, escape_segment, is_missing, ApiClient};
use crate::transport::{QueryOptions, WriteOptions};
use crate::types::{Namespace, Partition};

const NAMESPACE: &str = "namespace";
const PARTITION: &str = "admin_partition";

impl ApiClient {
    /// Create a namespace
    pub async fn namespace_create(&self, ns: &Namespace, opts: &WriteOptions) -> Result<Namespace> {
        let (created, _) = self
            .put_json("/namespace", ns, opts)
            .await
            .map_err(|e| enterprise_gate(e, NAMESPACE))?;
        Ok(created)
    }

    /// Update a namespace
    pub async fn namespace_update(&self, ns: &Namespace, opts: &WriteOptions) -> Result<Namespace> {
        let path = format!("/namespace/{}", escape_segment(&ns.name));
        let (updated, _) = self
            .put_json(&path, ns, opts)
            .await
            .map_err(|e| enterprise_gate(e, NAMESPACE))?;
        Ok(updated)
    }

    /// Read a namespace; namespaces being deleted read as missing
    pub async fn namespace_read(&self, name: &str, opts: &QueryOptions) -> Result<Option<Namespace>> {
        let path = format!("/namespace/{}", escape_segment(name));
        let ns: Option<Namespace> = self.get_gated(&path, opts, NAMESPACE).await?;
        Ok(ns.filter(|n| !n.is_deleting()))
    }

    /// Delete a namespace
    pub async fn namespace_delete(&self, name: &str, opts: &WriteOptions) -> Result<()> {
        let path = format!("/namespace/{}", escape_segment(name));
        gated_delete(self, &path, opts, NAMESPACE).await
    }

    /// Create an admin partition
    pub async fn partition_create(&self, partition: &Partition, opts: &WriteOptions) -> Result<Partition> {
        let (created, _) = self
            .put_json("/partition", partition, opts)
            .await
            .map_err(|e| enterprise_gate(e, PARTITION))?;
        Ok(created)
    }

    /// Update an admin partition
    pub async fn partition_update(&self, partition: &Partition, opts: &WriteOptions) -> Result<Partition> {
        let path = format!("/partition/{}", escape_segment(&partition.name));
        let (updated, _) = self
            .put_json(&path, partition, opts)
            .await
            .map_err(|e| enterprise_gate(e, PARTITION))?;
        Ok(updated)
    }

    /// Read an admin partition; partitions being deleted read as missing
    pub async fn partition_read(&self, name: &str, opts: &QueryOptions) -> Result<Option<Partition>> {
        let path = format!("/partition/{}", escape_segment(name));
        let partition: Option<Partition> = self.get_gated(&path, opts, PARTITION).await?;
        Ok(partition.filter(|p| p.deleted_at.as_deref().map_or(true, str::is_empty)))
    }

    /// Delete an admin partition
    pub async fn partition_delete(&self, name: &str, opts: &WriteOptions) -> Result<()> {
        let path = format!("/partition/{}", escape_segment(name));
        gated_delete(self, &path, opts, PARTITION).await
    }
}

async fn gated_delete(client: &ApiClient, path: &str, opts: &WriteOptions, resource: &str) -> Result<()> {
    match client.delete(path, opts).await {
        Ok(_) => Ok(()),
        Err(e) => {
            let e = enterprise_gate(e, resource);
            if is_missing(&e) {
                Ok(())
            } else {
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::transport::{MockTransport, Response};
    use meshcfg_common::Error;
    use serde_json::json;

    #[tokio::test]
    async fn community_edition_is_reported() {
        let mut transport = MockTransport::new();
        transport
            .expect_query()
            .returning(|_, _| Err(Error::remote(404, "Invalid URL path: not a recognized HTTP API endpoint")));
        transport
            .expect_delete()
            .returning(|_, _| Err(Error::remote(404, "Invalid URL path: not a recognized HTTP API endpoint")));
        let client = ApiClient::new(Arc::new(transport));

        let err = client
            .namespace_read("team", &QueryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EnterpriseOnly { ref resource } if resource == "namespace"));
        let err = client
            .partition_delete("p1", &WriteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EnterpriseOnly { ref resource } if resource == "admin_partition"));
    }

    #[tokio::test]
    async fn deleting_namespace_reads_as_missing() {
        let mut transport = MockTransport::new();
        transport.expect_query().returning(|_, _| {
            Ok(Response::json(json!({"Name": "team", "DeletedAt": "2024-05-01T10:00:00Z"})))
        });
        let client = ApiClient::new(Arc::new(transport));
        assert!(client
            .namespace_read("team", &QueryOptions::default())
            .await
            .unwrap()
            .is_none());
    }
}
