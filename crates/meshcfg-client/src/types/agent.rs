//! Agent wire objects

use serde::{Deserialize, Serialize};

/// Part of `GET /agent/self` the engine uses
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AgentSelf {
    /// Agent configuration
    pub config: AgentConfig,
}

/// Agent configuration summary
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AgentConfig {
    /// Datacenter of the agent
    pub datacenter: String,
    /// Node name of the agent
    pub node_name: String,
    /// Agent version
    pub version: String,
    /// Whether the agent is a server
    pub server: bool,
}

/// Body of `PUT /agent/token/<slot>`
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AgentTokenUpdate {
    /// Token secret
    pub token: String,
}

impl std::fmt::Debug for AgentTokenUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentTokenUpdate")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Agent token slots
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentTokenSlot {
    /// Default token for requests without one
    Default,
    /// Token the agent uses for its own operations
    Agent,
    /// Recovery token for agent-local operations
    AgentRecovery,
    /// Token used for ACL replication
    Replication,
    /// Token used by DNS lookups
    Dns,
    /// Token used to register services from configuration files
    ConfigFileServiceRegistration,
}

impl AgentTokenSlot {
    /// Slot name used in the endpoint path
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Agent => "agent",
            Self::AgentRecovery => "agent_recovery",
            Self::Replication => "replication",
            Self::Dns => "dns",
            Self::ConfigFileServiceRegistration => "config_file_service_registration",
        }
    }

    /// Parse a slot name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Self::Default),
            "agent" => Some(Self::Agent),
            "agent_recovery" | "agent_master" => Some(Self::AgentRecovery),
            "replication" => Some(Self::Replication),
            "dns" => Some(Self::Dns),
            "config_file_service_registration" => Some(Self::ConfigFileServiceRegistration),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_names_round_trip() {
        for slot in [
            AgentTokenSlot::Default,
            AgentTokenSlot::Agent,
            AgentTokenSlot::AgentRecovery,
            AgentTokenSlot::Replication,
            AgentTokenSlot::Dns,
            AgentTokenSlot::ConfigFileServiceRegistration,
        ] {
            assert_eq!(AgentTokenSlot::parse(slot.as_str()), Some(slot));
        }
        assert_eq!(AgentTokenSlot::parse("agent_master"), Some(AgentTokenSlot::AgentRecovery));
        assert_eq!(AgentTokenSlot::parse("master"), None);
    }
}
