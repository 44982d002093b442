//! Cluster peering wire objects

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::acl::null_as_default;

/// Lifecycle state of a peering
///
/// Unknown states reported by newer servers are kept verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PeeringState {
    /// Not yet established
    #[default]
    Initial,
    /// Waiting for the dialer
    Pending,
    /// Dialing the peer
    Establishing,
    /// Replicating
    Active,
    /// Replication failing
    Failing,
    /// Being deleted
    Deleting,
    /// Terminated by the peer
    Terminated,
    /// A state this client does not know
    Unknown(String),
}

impl From<String> for PeeringState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "" | "INITIAL" => Self::Initial,
            "PENDING" => Self::Pending,
            "ESTABLISHING" => Self::Establishing,
            "ACTIVE" => Self::Active,
            "FAILING" => Self::Failing,
            "DELETING" => Self::Deleting,
            "TERMINATED" => Self::Terminated,
            _ => Self::Unknown(s),
        }
    }
}

impl From<PeeringState> for String {
    fn from(state: PeeringState) -> Self {
        state.to_string()
    }
}

impl fmt::Display for PeeringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initial => "INITIAL",
            Self::Pending => "PENDING",
            Self::Establishing => "ESTABLISHING",
            Self::Active => "ACTIVE",
            Self::Failing => "FAILING",
            Self::Deleting => "DELETING",
            Self::Terminated => "TERMINATED",
            Self::Unknown(s) => s.as_str(),
        };
        f.write_str(s)
    }
}

/// Peering as returned by `GET /peering/<name>`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Peering {
    /// Peering ID
    #[serde(rename = "ID")]
    pub id: String,
    /// Local name of the peer
    pub name: String,
    /// Admin partition
    pub partition: String,
    /// Meta
    #[serde(deserialize_with = "null_as_default")]
    pub meta: BTreeMap<String, String>,
    /// Lifecycle state
    pub state: PeeringState,
    /// ID the peer uses for this cluster
    #[serde(rename = "PeerID")]
    pub peer_id: String,
    /// CA certificates of the peer
    #[serde(rename = "PeerCAPems", alias = "PeerCaPems", deserialize_with = "null_as_default")]
    pub peer_ca_pems: Vec<String>,
    /// TLS server name of the peer
    pub peer_server_name: String,
    /// Addresses of the peer's servers
    #[serde(deserialize_with = "null_as_default")]
    pub peer_server_addresses: Vec<String>,
    /// Set while the peering is being deleted
    pub deleted_at: Option<String>,
    /// Raft index of creation
    pub create_index: u64,
    /// Raft index of the last modification
    pub modify_index: u64,
}

/// Body of `POST /peering/token`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PeeringGenerateTokenRequest {
    /// Local name of the peer
    pub peer_name: String,
    /// Admin partition
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    /// Meta
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
    /// Addresses the peer should dial instead of the servers
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub server_external_addresses: Vec<String>,
}

/// Response of `POST /peering/token`
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PeeringGenerateTokenResponse {
    /// Opaque token handed to the peer
    pub peering_token: String,
}

impl fmt::Debug for PeeringGenerateTokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeeringGenerateTokenResponse")
            .field("peering_token", &"<redacted>")
            .finish()
    }
}

/// Body of `POST /peering/establish`
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PeeringEstablishRequest {
    /// Local name of the peer
    pub peer_name: String,
    /// Token issued by the peer
    pub peering_token: String,
    /// Admin partition
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    /// Meta
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

impl fmt::Debug for PeeringEstablishRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeeringEstablishRequest")
            .field("peer_name", &self.peer_name)
            .field("peering_token", &"<redacted>")
            .field("partition", &self.partition)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn states_parse_and_print() {
        for state in ["INITIAL", "PENDING", "ESTABLISHING", "ACTIVE", "FAILING", "DELETING", "TERMINATED"] {
            assert_eq!(PeeringState::from(state.to_string()).to_string(), state);
        }
        assert_eq!(PeeringState::from(String::new()), PeeringState::Initial);
        assert_eq!(
            PeeringState::from("DRAINING".to_string()),
            PeeringState::Unknown("DRAINING".into())
        );
    }

    #[test]
    fn peering_decodes_state_and_pems() {
        let p: Peering = serde_json::from_value(json!({
            "ID": "1", "Name": "east", "State": "ACTIVE",
            "PeerCAPems": ["pem"], "PeerServerAddresses": null
        }))
        .unwrap();
        assert_eq!(p.state, PeeringState::Active);
        assert_eq!(p.peer_ca_pems, vec!["pem"]);
        assert!(p.peer_server_addresses.is_empty());
    }

    #[test]
    fn tokens_are_redacted_in_debug() {
        let req = PeeringEstablishRequest {
            peer_name: "east".into(),
            peering_token: "eyJzZWNyZXQ".into(),
            ..Default::default()
        };
        assert!(!format!("{req:?}").contains("eyJzZWNyZXQ"));
    }
}
