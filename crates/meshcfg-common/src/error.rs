//! Error types for meshcfg
//!
//! Errors are structured with fields so the lifecycle host can report the
//! resource, the remote status code and a snippet of the remote body. Each
//! variant maps to one failure category of the engine.

use std::fmt;

use thiserror::Error;

/// Maximum number of bytes of a remote response body kept in error messages
pub const BODY_SNIPPET_LIMIT: usize = 512;

/// Normalized classification of a non-2xx response from the remote cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    /// 404
    NotFound,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 409
    Conflict,
    /// 5xx
    ServerError,
    /// Any other non-2xx status
    Other,
}

impl RemoteErrorKind {
    /// Classify an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => Self::NotFound,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            409 => Self::Conflict,
            500..=599 => Self::ServerError,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not found",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Conflict => "conflict",
            Self::ServerError => "server error",
            Self::Other => "unexpected response",
        };
        f.write_str(s)
    }
}

/// Main error type for meshcfg operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Engine configuration rejected at startup
    #[error("invalid configuration: {message}")]
    ConfigInvalid {
        /// Description of what's invalid
        message: String,
    },

    /// A raw import ID could not be parsed
    #[error("malformed identity {id:?}: {message}")]
    IdentityMalformed {
        /// The raw ID as given by the host
        id: String,
        /// Description of what's wrong, including the accepted forms
        message: String,
    },

    /// Declared state cannot produce a valid wire object
    #[error("decode error{}: {message}", field_suffix(.field))]
    Decode {
        /// The attribute that failed to decode (if known)
        field: Option<String>,
        /// Description of what failed
        message: String,
    },

    /// Non-2xx HTTP response from the remote cluster
    #[error("remote {kind} (HTTP {status}): {body}")]
    Remote {
        /// Normalized classification of the status
        kind: RemoteErrorKind,
        /// HTTP status code
        status: u16,
        /// Snippet of the response body
        body: String,
    },

    /// A write succeeded but the immediate re-read returned NotFound
    #[error("{kind} {name:?} was written but could not be read back; the cluster may have rejected it")]
    EntryLost {
        /// Config entry kind
        kind: String,
        /// Config entry name
        name: String,
    },

    /// ACL replication did not catch up within the attempt budget
    #[error("ACL replication did not reach index {index} for {target} after {attempts} attempts")]
    ReplicationTimeout {
        /// What was being replicated (token, policy, role)
        target: String,
        /// The write index being waited on
        index: u64,
        /// Number of replication status polls issued
        attempts: u32,
    },

    /// The cluster edition does not support this feature
    #[error("{resource} requires an enterprise edition of the cluster")]
    EnterpriseOnly {
        /// Resource type that hit the limitation
        resource: String,
    },

    /// A duration-string attribute could not be parsed
    #[error("invalid duration {value:?} for {field}: {message}")]
    DurationInvalid {
        /// Attribute name
        field: String,
        /// The rejected value
        value: String,
        /// Parser message
        message: String,
    },

    /// Transport failure independent of the remote
    #[error("network error: {message}")]
    Network {
        /// Description of what failed
        message: String,
    },

    /// Writing to the host's state failed
    #[error("failed to set {field}: {message}")]
    State {
        /// Attribute being written
        field: String,
        /// Description of what failed
        message: String,
    },

    /// Serialization/deserialization error on the wire
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// The host cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// A key prefix already holds keys the engine does not own
    #[error("{count} keys already exist under {prefix:?}; remove them before managing this prefix")]
    PrefixOccupied {
        /// The prefix being adopted
        prefix: String,
        /// Number of keys already present
        count: usize,
    },

    /// The dispatcher has no handler for this resource type
    #[error("unknown resource type {0:?}")]
    UnknownResource(String),

    /// Error annotated with the resource it occurred on
    #[error("{resource_type} {name:?}: {source}")]
    Resource {
        /// Resource type name (e.g. "acl_policy")
        resource_type: String,
        /// Resource name or ID
        name: String,
        /// The underlying error
        #[source]
        source: Box<Error>,
    },
}

fn field_suffix(field: &Option<String>) -> String {
    match field {
        Some(f) => format!(" in {f}"),
        None => String::new(),
    }
}

impl Error {
    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: msg.into(),
        }
    }

    /// Create an identity error for the given raw ID
    pub fn identity(id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::IdentityMalformed {
            id: id.into(),
            message: msg.into(),
        }
    }

    /// Create a decode error without field context
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            field: None,
            message: msg.into(),
        }
    }

    /// Create a decode error for a specific attribute
    pub fn decode_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Decode {
            field: Some(field.into()),
            message: msg.into(),
        }
    }

    /// Create a remote error from a status code and response body
    ///
    /// The body is truncated to [`BODY_SNIPPET_LIMIT`] bytes.
    pub fn remote(status: u16, body: impl AsRef<str>) -> Self {
        Self::Remote {
            kind: RemoteErrorKind::from_status(status),
            status,
            body: snippet(body.as_ref()),
        }
    }

    /// Create a network error with the given message
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network {
            message: msg.into(),
        }
    }

    /// Create a state-writer error for the given attribute
    pub fn state(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::State {
            field: field.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create an enterprise-only error for the given resource type
    pub fn enterprise_only(resource: impl Into<String>) -> Self {
        Self::EnterpriseOnly {
            resource: resource.into(),
        }
    }

    /// Wrap this error with the resource it occurred on
    ///
    /// Already-wrapped errors are returned unchanged so context is only
    /// attached once.
    pub fn in_resource(self, resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        match self {
            Self::Resource { .. } => self,
            other => Self::Resource {
                resource_type: resource_type.into(),
                name: name.into(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through resource context
    pub fn root(&self) -> &Error {
        match self {
            Self::Resource { source, .. } => source.root(),
            other => other,
        }
    }

    /// Classification of a remote error, if this is one
    pub fn remote_kind(&self) -> Option<RemoteErrorKind> {
        match self.root() {
            Self::Remote { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// HTTP status code of a remote error, if this is one
    pub fn status(&self) -> Option<u16> {
        match self.root() {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Response body snippet of a remote error, if this is one
    pub fn body(&self) -> Option<&str> {
        match self.root() {
            Self::Remote { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Whether the remote reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        self.remote_kind() == Some(RemoteErrorKind::NotFound)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}

/// Truncate a response body to a loggable snippet on a char boundary
pub fn snippet(body: &str) -> String {
    let body = body.trim();
    if body.len() <= BODY_SNIPPET_LIMIT {
        return body.to_string();
    }
    let mut end = BODY_SNIPPET_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
