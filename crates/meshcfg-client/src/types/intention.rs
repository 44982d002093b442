//! Legacy intention wire objects

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::acl::null_as_default;

/// Service-to-service intention addressed by ID
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Intention {
    /// Intention ID, assigned by the remote
    #[serde(rename = "ID", skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Source namespace
    #[serde(rename = "SourceNS", alias = "SourceNs", skip_serializing_if = "String::is_empty")]
    pub source_ns: String,
    /// Source service
    pub source_name: String,
    /// Destination namespace
    #[serde(rename = "DestinationNS", alias = "DestinationNs", skip_serializing_if = "String::is_empty")]
    pub destination_ns: String,
    /// Destination service
    pub destination_name: String,
    /// Source type, always `consul`
    pub source_type: String,
    /// `allow` or `deny`
    pub action: String,
    /// Free-form description
    pub description: String,
    /// Meta
    #[serde(deserialize_with = "null_as_default")]
    pub meta: BTreeMap<String, String>,
    /// Evaluation precedence, computed by the remote
    #[serde(skip_serializing)]
    pub precedence: i64,
}

/// Response of `POST /connect/intentions`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct IntentionCreated {
    /// ID of the new intention
    #[serde(rename = "ID")]
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn intention_namespaces_use_wire_names() {
        let i = Intention {
            source_name: "web".into(),
            destination_name: "db".into(),
            destination_ns: "data".into(),
            action: "allow".into(),
            precedence: 9,
            ..Default::default()
        };
        let v = serde_json::to_value(&i).unwrap();
        assert_eq!(v["DestinationNS"], "data");
        assert!(v.get("SourceNS").is_none());
        assert!(v.get("Precedence").is_none());

        let back: Intention = serde_json::from_value(json!({"SourceNs": "a", "Precedence": 9})).unwrap();
        assert_eq!(back.source_ns, "a");
        assert_eq!(back.precedence, 9);
    }
}
