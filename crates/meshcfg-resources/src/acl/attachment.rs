//! Attachments: a single policy or role linked to a role, token or
//! namespace that is managed elsewhere
//!
//! Each attachment edits one link in its parent's list and leaves every
//! other link alone. The ID is `<parent>:<child>`. All attributes force a
//! replacement, so update has nothing to do.

use std::fmt;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use meshcfg_client::types::{AclLink, AclRole, AclToken, Namespace};
use meshcfg_client::{QueryOptions, WriteOptions};
use meshcfg_common::identity::{attachment_id, parse_attachment_id};
use meshcfg_common::{Attribute, AttributeType, Error, ResourceData, Result, Schema};

use super::links;
use crate::replication::ReplicationTarget;
use crate::resource::{gone, Context, Resource};

/// Object a link is added to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parent {
    /// ACL role, by ID
    Role,
    /// ACL token, by accessor ID
    Token,
    /// Namespace default links, by namespace name
    Namespace,
}

impl fmt::Display for Parent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Role => "ACL role",
            Self::Token => "ACL token",
            Self::Namespace => "namespace",
        })
    }
}

/// What the link points at
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Child {
    /// ACL policy
    Policy,
    /// ACL role
    Role,
}

enum ParentObject {
    Role(AclRole),
    Token(AclToken),
    Namespace(Namespace),
}

impl ParentObject {
    fn links(&self, child: Child) -> &[AclLink] {
        match (self, child) {
            (Self::Role(role), _) => role.policies.as_slice(),
            (Self::Token(token), Child::Policy) => token.policies.as_slice(),
            (Self::Token(token), Child::Role) => token.roles.as_slice(),
            (Self::Namespace(ns), Child::Policy) => ns
                .acls
                .as_ref()
                .map_or(&[][..], |a| a.policy_defaults.as_slice()),
            (Self::Namespace(ns), Child::Role) => ns
                .acls
                .as_ref()
                .map_or(&[][..], |a| a.role_defaults.as_slice()),
        }
    }

    fn links_mut(&mut self, child: Child) -> &mut Vec<AclLink> {
        match (self, child) {
            (Self::Role(role), _) => &mut role.policies,
            (Self::Token(token), Child::Policy) => &mut token.policies,
            (Self::Token(token), Child::Role) => &mut token.roles,
            (Self::Namespace(ns), Child::Policy) => &mut ns.acls.get_or_insert_with(Default::default).policy_defaults,
            (Self::Namespace(ns), Child::Role) => &mut ns.acls.get_or_insert_with(Default::default).role_defaults,
        }
    }

    fn is_linked(&self, child: Child, reference: &str) -> bool {
        self.links(child).iter().any(|l| l.matches(reference))
    }
}

/// One attachment resource type
pub struct Attachment {
    type_name: &'static str,
    parent: Parent,
    child: Child,
    parent_attr: &'static str,
    child_attr: &'static str,
    schema: Schema,
}

impl Attachment {
    /// Attachment of `child` links to `parent` objects
    pub fn new(
        type_name: &'static str,
        parent: Parent,
        parent_attr: &'static str,
        child: Child,
        child_attr: &'static str,
    ) -> Self {
        let schema = Schema::new()
            .attr(parent_attr, Attribute::required(AttributeType::String).force_new())
            .attr(child_attr, Attribute::required(AttributeType::String).force_new());
        Self {
            type_name,
            parent,
            child,
            parent_attr,
            child_attr,
            schema,
        }
    }

    /// Parent and child references from the attributes, or from the ID
    /// right after an import
    fn references(&self, data: &ResourceData) -> Result<(String, String)> {
        match (data.get_str(self.parent_attr), data.get_str(self.child_attr)) {
            (Some(parent), Some(child)) if !parent.is_empty() && !child.is_empty() => {
                Ok((parent.to_string(), child.to_string()))
            }
            _ => match data.id() {
                Some(id) => parse_attachment_id(id),
                None => Err(Error::decode(format!(
                    "{} and {} must be set",
                    self.parent_attr, self.child_attr
                ))),
            },
        }
    }

    async fn fetch(&self, ctx: &Context, parent: &str) -> Result<Option<ParentObject>> {
        let opts = QueryOptions::default();
        Ok(match self.parent {
            Parent::Role => ctx.api.acl_role_read(parent, &opts).await?.map(ParentObject::Role),
            Parent::Token => ctx.api.acl_token_read(parent, &opts).await?.map(ParentObject::Token),
            Parent::Namespace => ctx
                .api
                .namespace_read(parent, &opts)
                .await?
                .map(ParentObject::Namespace),
        })
    }

    async fn save(&self, ctx: &Context, object: &ParentObject) -> Result<()> {
        let opts = WriteOptions::default();
        match object {
            ParentObject::Role(role) => {
                let (_, index) = ctx.api.acl_role_update(&role.id, role, &opts).await?;
                ctx.replication()
                    .wait(&ctx.api, ReplicationTarget::Role, index)
                    .await
            }
            ParentObject::Token(token) => {
                let (_, index) = ctx
                    .api
                    .acl_token_update(&token.accessor_id, token, &opts)
                    .await?;
                if token.local {
                    return Ok(());
                }
                ctx.replication()
                    .wait(&ctx.api, ReplicationTarget::Token, index)
                    .await
            }
            ParentObject::Namespace(ns) => {
                ctx.api.namespace_update(ns, &opts).await?;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Resource for Attachment {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    #[instrument(skip_all, fields(resource_type = self.type_name))]
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let (parent, child) = self.references(data)?;
        let mut object = self
            .fetch(ctx, &parent)
            .await?
            .ok_or_else(|| Error::remote(404, format!("{} {parent:?} not found", self.parent)))?;
        if object.is_linked(self.child, &child) {
            debug!(%parent, %child, "already attached");
        } else {
            object.links_mut(self.child).extend(links(vec![child.clone()]));
            self.save(ctx, &object).await?;
            info!(%parent, %child, "attached");
        }
        data.set_id(attachment_id(&parent, &child));
        self.read(ctx, data).await
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let (parent, child) = self.references(data)?;
        let attached = self
            .fetch(ctx, &parent)
            .await?
            .is_some_and(|object| object.is_linked(self.child, &child));
        if !attached {
            gone(data, self.type_name);
            return Ok(());
        }
        let mut sw = data.writer(&self.schema);
        sw.set(self.parent_attr, &parent)
            .set(self.child_attr, &child);
        sw.finish()
    }

    async fn update(&self, _ctx: &Context, _data: &mut ResourceData) -> Result<()> {
        Ok(())
    }

    #[instrument(skip_all, fields(id = data.id_or_empty()))]
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let (parent, child) = self.references(data)?;
        if let Some(mut object) = self.fetch(ctx, &parent).await? {
            if object.is_linked(self.child, &child) {
                object.links_mut(self.child).retain(|l| !l.matches(&child));
                self.save(ctx, &object).await?;
                info!(%parent, %child, "detached");
            }
        }
        data.clear_id();
        Ok(())
    }

    async fn import(&self, _ctx: &Context, id: &str, data: &mut ResourceData) -> Result<()> {
        let (parent, child) = parse_attachment_id(id)?;
        let mut sw = data.writer(&self.schema);
        sw.set(self.parent_attr, &parent)
            .set(self.child_attr, &child)
            .set_id(attachment_id(&parent, &child));
        sw.finish()
    }
}

/// Every attachment resource type
pub fn resources() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(Attachment::new(
            "acl_role_policy_attachment",
            Parent::Role,
            "role_id",
            Child::Policy,
            "policy",
        )),
        Box::new(Attachment::new(
            "acl_token_policy_attachment",
            Parent::Token,
            "token_id",
            Child::Policy,
            "policy",
        )),
        Box::new(Attachment::new(
            "acl_token_role_attachment",
            Parent::Token,
            "token_id",
            Child::Role,
            "role",
        )),
        Box::new(Attachment::new(
            "namespace_policy_attachment",
            Parent::Namespace,
            "namespace",
            Child::Policy,
            "policy",
        )),
        Box::new(Attachment::new(
            "namespace_role_attachment",
            Parent::Namespace,
            "namespace",
            Child::Role,
            "role",
        )),
    ]
}
