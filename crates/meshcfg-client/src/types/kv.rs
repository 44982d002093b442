//! Key/value wire objects

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use meshcfg_common::{Error, Result};

/// One key as returned by `GET /kv/<key>`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct KvPair {
    /// Full key path
    pub key: String,
    /// Opaque client flags
    pub flags: u64,
    /// Base64-encoded value; `None` for keys without a value
    pub value: Option<String>,
    /// Raft index of creation
    pub create_index: u64,
    /// Raft index of the last modification
    pub modify_index: u64,
    /// Lock index
    pub lock_index: u64,
    /// Session holding the lock
    #[serde(skip_serializing_if = "String::is_empty")]
    pub session: String,
}

impl KvPair {
    /// The decoded value as UTF-8 text
    pub fn text(&self) -> Result<String> {
        let Some(encoded) = self.value.as_deref() else {
            return Ok(String::new());
        };
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| Error::serialization(format!("value of {} is not base64: {e}", self.key)))?;
        String::from_utf8(bytes)
            .map_err(|e| Error::serialization(format!("value of {} is not UTF-8: {e}", self.key)))
    }
}
