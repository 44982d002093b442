//! Waiting for ACL replication
//!
//! In multi-datacenter clusters ACL writes land in the primary datacenter
//! and are replicated to secondaries. A read right after a write may hit a
//! secondary that has not caught up, so ACL handlers poll the replication
//! status until the relevant replicated index reaches the write index.

use std::fmt;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use meshcfg_client::types::AclReplicationStatus;
use meshcfg_client::{ApiClient, QueryOptions};
use meshcfg_common::backoff::Backoff;
use meshcfg_common::{Error, Result};

/// Replication type under which token-level replication happens
pub const TOKEN_REPLICATION: &str = "tokens";

/// Kind of ACL object a write produced
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplicationTarget {
    /// ACL token; tracked by `ReplicatedTokenIndex`
    Token,
    /// ACL policy; tracked by `ReplicatedIndex`
    Policy,
    /// ACL role; tracked by `ReplicatedRoleIndex`
    Role,
}

impl ReplicationTarget {
    /// Replicated index relevant to this target
    pub fn replicated_index(&self, status: &AclReplicationStatus) -> u64 {
        match self {
            Self::Token => status.replicated_token_index,
            Self::Policy => status.replicated_index,
            Self::Role => status.replicated_role_index,
        }
    }
}

impl fmt::Display for ReplicationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Token => "token",
            Self::Policy => "policy",
            Self::Role => "role",
        })
    }
}

/// Whether a status observation means the write at `index` is visible
pub fn is_replicated(status: &AclReplicationStatus, target: ReplicationTarget, index: u64) -> bool {
    !status.enabled
        || status.replication_type != TOKEN_REPLICATION
        || target.replicated_index(status) >= index
}

/// Bounded poller of the replication status endpoint
#[derive(Clone, Copy, Debug, Default)]
pub struct ReplicationWaiter {
    backoff: Backoff,
}

impl ReplicationWaiter {
    /// Waiter following the given schedule
    pub fn new(backoff: Backoff) -> Self {
        Self { backoff }
    }

    /// Poll until the write at `index` has replicated
    ///
    /// Transport errors end the wait immediately. Running out of attempts
    /// yields [`Error::ReplicationTimeout`]. The sleeps race the client's
    /// cancellation token.
    pub async fn wait(&self, api: &ApiClient, target: ReplicationTarget, index: u64) -> Result<()> {
        let opts = QueryOptions::default();
        for attempt in 0..self.backoff.max_attempts {
            let status = api.acl_replication_status(&opts).await?;
            if is_replicated(&status, target, index) {
                debug!(%target, index, attempt, "ACL write replicated");
                return Ok(());
            }
            debug!(
                %target,
                index,
                replicated = target.replicated_index(&status),
                attempt,
                "waiting for ACL replication"
            );
            if attempt + 1 < self.backoff.max_attempts {
                sleep(api.cancellation(), self.backoff.delay(attempt)).await?;
            }
        }
        Err(Error::ReplicationTimeout {
            target: target.to_string(),
            index,
            attempts: self.backoff.max_attempts,
        })
    }
}

async fn sleep(cancel: &CancellationToken, delay: std::time::Duration) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
