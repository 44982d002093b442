//! ACL endpoints

use meshcfg_common::Result;

use crate::client::{escape_segment, ApiClient};
use crate::transport::{Method, QueryOptions, RequestBody, WriteOptions};
use crate::types::{
    AclAuthMethod, AclBindingRule, AclPolicy, AclReplicationStatus, AclRole, AclToken,
};

/// Index a write is visible at: the response header, or the object's own
/// modify index when the header is absent
fn write_index(header: u64, modify_index: u64) -> u64 {
    if header > 0 {
        header
    } else {
        modify_index
    }
}

impl ApiClient {
    // =========================================================================
    // Policies
    // =========================================================================

    /// Create a policy; returns it with the write index
    pub async fn acl_policy_create(&self, policy: &AclPolicy, opts: &WriteOptions) -> Result<(AclPolicy, u64)> {
        let (created, meta): (AclPolicy, _) = self.put_json("/acl/policy", policy, opts).await?;
        let index = write_index(meta.last_index, created.modify_index);
        Ok((created, index))
    }

    /// Update a policy in place
    pub async fn acl_policy_update(
        &self,
        id: &str,
        policy: &AclPolicy,
        opts: &WriteOptions,
    ) -> Result<(AclPolicy, u64)> {
        let path = format!("/acl/policy/{}", escape_segment(id));
        let (updated, meta): (AclPolicy, _) = self.put_json(&path, policy, opts).await?;
        let index = write_index(meta.last_index, updated.modify_index);
        Ok((updated, index))
    }

    /// Read a policy by ID
    pub async fn acl_policy_read(&self, id: &str, opts: &QueryOptions) -> Result<Option<AclPolicy>> {
        self.get_optional(&format!("/acl/policy/{}", escape_segment(id)), opts)
            .await
    }

    /// Read a policy by name
    pub async fn acl_policy_read_by_name(&self, name: &str, opts: &QueryOptions) -> Result<Option<AclPolicy>> {
        self.get_optional(&format!("/acl/policy/name/{}", escape_segment(name)), opts)
            .await
    }

    /// Delete a policy; missing policies count as deleted
    pub async fn acl_policy_delete(&self, id: &str, opts: &WriteOptions) -> Result<()> {
        self.delete_existing(&format!("/acl/policy/{}", escape_segment(id)), opts)
            .await
    }

    // =========================================================================
    // Roles
    // =========================================================================

    /// Create a role; returns it with the write index
    pub async fn acl_role_create(&self, role: &AclRole, opts: &WriteOptions) -> Result<(AclRole, u64)> {
        let (created, meta): (AclRole, _) = self.put_json("/acl/role", role, opts).await?;
        let index = write_index(meta.last_index, created.modify_index);
        Ok((created, index))
    }

    /// Update a role in place
    pub async fn acl_role_update(&self, id: &str, role: &AclRole, opts: &WriteOptions) -> Result<(AclRole, u64)> {
        let path = format!("/acl/role/{}", escape_segment(id));
        let (updated, meta): (AclRole, _) = self.put_json(&path, role, opts).await?;
        let index = write_index(meta.last_index, updated.modify_index);
        Ok((updated, index))
    }

    /// Read a role by ID
    pub async fn acl_role_read(&self, id: &str, opts: &QueryOptions) -> Result<Option<AclRole>> {
        self.get_optional(&format!("/acl/role/{}", escape_segment(id)), opts)
            .await
    }

    /// Read a role by name
    pub async fn acl_role_read_by_name(&self, name: &str, opts: &QueryOptions) -> Result<Option<AclRole>> {
        self.get_optional(&format!("/acl/role/name/{}", escape_segment(name)), opts)
            .await
    }

    /// Delete a role; missing roles count as deleted
    pub async fn acl_role_delete(&self, id: &str, opts: &WriteOptions) -> Result<()> {
        self.delete_existing(&format!("/acl/role/{}", escape_segment(id)), opts)
            .await
    }

    // =========================================================================
    // Tokens
    // =========================================================================

    /// Create a token; returns it with the write index
    pub async fn acl_token_create(&self, token: &AclToken, opts: &WriteOptions) -> Result<(AclToken, u64)> {
        let (created, meta): (AclToken, _) = self.put_json("/acl/token", token, opts).await?;
        let index = write_index(meta.last_index, created.modify_index);
        Ok((created, index))
    }

    /// Update a token; the accessor ID never changes
    pub async fn acl_token_update(
        &self,
        accessor_id: &str,
        token: &AclToken,
        opts: &WriteOptions,
    ) -> Result<(AclToken, u64)> {
        let path = format!("/acl/token/{}", escape_segment(accessor_id));
        let (updated, meta): (AclToken, _) = self.put_json(&path, token, opts).await?;
        let index = write_index(meta.last_index, updated.modify_index);
        Ok((updated, index))
    }

    /// Read a token by accessor ID
    pub async fn acl_token_read(&self, accessor_id: &str, opts: &QueryOptions) -> Result<Option<AclToken>> {
        self.get_optional(&format!("/acl/token/{}", escape_segment(accessor_id)), opts)
            .await
    }

    /// Read the token identified by `secret`
    pub async fn acl_token_read_self(&self, secret: &str, opts: &QueryOptions) -> Result<Option<AclToken>> {
        let opts = opts.clone().with_token(secret);
        self.get_optional("/acl/token/self", &opts).await
    }

    /// Delete a token; missing tokens count as deleted
    pub async fn acl_token_delete(&self, accessor_id: &str, opts: &WriteOptions) -> Result<()> {
        self.delete_existing(&format!("/acl/token/{}", escape_segment(accessor_id)), opts)
            .await
    }

    /// Bootstrap the ACL system, returning the initial management token
    pub async fn acl_bootstrap(&self, opts: &WriteOptions) -> Result<AclToken> {
        let response = self
            .write(Method::Put, "/acl/bootstrap", RequestBody::Empty, opts)
            .await?;
        crate::client::decode("/acl/bootstrap", response.body)
    }

    /// ACL replication status of the queried datacenter
    pub async fn acl_replication_status(&self, opts: &QueryOptions) -> Result<AclReplicationStatus> {
        let (status, _) = self.get_json("/acl/replication", opts).await?;
        Ok(status)
    }

    // =========================================================================
    // Auth methods and binding rules
    // =========================================================================

    /// Create an auth method
    pub async fn acl_auth_method_create(&self, method: &AclAuthMethod, opts: &WriteOptions) -> Result<AclAuthMethod> {
        let (created, _) = self.put_json("/acl/auth-method", method, opts).await?;
        Ok(created)
    }

    /// Update an auth method
    pub async fn acl_auth_method_update(&self, method: &AclAuthMethod, opts: &WriteOptions) -> Result<AclAuthMethod> {
        let path = format!("/acl/auth-method/{}", escape_segment(&method.name));
        let (updated, _) = self.put_json(&path, method, opts).await?;
        Ok(updated)
    }

    /// Read an auth method by name
    pub async fn acl_auth_method_read(&self, name: &str, opts: &QueryOptions) -> Result<Option<AclAuthMethod>> {
        self.get_optional(&format!("/acl/auth-method/{}", escape_segment(name)), opts)
            .await
    }

    /// Delete an auth method
    pub async fn acl_auth_method_delete(&self, name: &str, opts: &WriteOptions) -> Result<()> {
        self.delete_existing(&format!("/acl/auth-method/{}", escape_segment(name)), opts)
            .await
    }

    /// Create a binding rule
    pub async fn acl_binding_rule_create(&self, rule: &AclBindingRule, opts: &WriteOptions) -> Result<AclBindingRule> {
        let (created, _) = self.put_json("/acl/binding-rule", rule, opts).await?;
        Ok(created)
    }

    /// Update a binding rule
    pub async fn acl_binding_rule_update(
        &self,
        id: &str,
        rule: &AclBindingRule,
        opts: &WriteOptions,
    ) -> Result<AclBindingRule> {
        let path = format!("/acl/binding-rule/{}", escape_segment(id));
        let (updated, _) = self.put_json(&path, rule, opts).await?;
        Ok(updated)
    }

    /// Read a binding rule by ID
    pub async fn acl_binding_rule_read(&self, id: &str, opts: &QueryOptions) -> Result<Option<AclBindingRule>> {
        self.get_optional(&format!("/acl/binding-rule/{}", escape_segment(id)), opts)
            .await
    }

    /// Delete a binding rule
    pub async fn acl_binding_rule_delete(&self, id: &str, opts: &WriteOptions) -> Result<()> {
        self.delete_existing(&format!("/acl/binding-rule/{}", escape_segment(id)), opts)
            .await
    }
}
