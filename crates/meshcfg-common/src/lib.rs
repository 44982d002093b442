//! Common types for meshcfg: errors, schemas, state access, identities and
//! key formatting

#![deny(missing_docs)]

pub mod backoff;
pub mod duration;
pub mod error;
pub mod identity;
pub mod keys;
pub mod plan;
pub mod schema;
pub mod state;
pub mod telemetry;

pub use error::{Error, RemoteErrorKind};
pub use identity::Identity;
pub use schema::{Attribute, AttributeType, Nesting, Schema};
pub use state::{ResourceData, StateWriter};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Meta key marking catalog services as registered by the engine
pub const EXTERNAL_SOURCE_META_KEY: &str = "external-source";

/// Default value of the external-source marker
pub const DEFAULT_EXTERNAL_SOURCE: &str = "terraform";
