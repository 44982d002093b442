//! Composite identity parsing for import
//!
//! Import IDs name a remote resource by up to four slash-separated parts:
//! partition, namespace, kind and name. Attachments use a two-part
//! `<parent>:<child>` form instead.

use std::fmt;

use crate::error::Error;

/// Accepted import ID forms, listed in error messages
pub const ACCEPTED_FORMS: &str =
    "<name>, <kind>/<name>, <partition>/<namespace>/<name> or <partition>/<namespace>/<kind>/<name>";

/// Structured identity of a remote resource
///
/// Empty partition and namespace mean "default" on the remote.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    /// Admin partition
    pub partition: String,
    /// Namespace within the partition
    pub namespace: String,
    /// Config entry kind, empty when the form does not carry one
    pub kind: String,
    /// Resource name
    pub name: String,
}

impl Identity {
    /// Identity with only a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse a raw import ID
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let parts: Vec<&str> = raw.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(malformed(raw));
        }
        let owned = |s: &str| s.to_string();
        match parts.as_slice() {
            [name] => Ok(Self::named(*name)),
            [kind, name] => Ok(Self {
                kind: owned(kind),
                name: owned(name),
                ..Default::default()
            }),
            [partition, namespace, name] => Ok(Self {
                partition: owned(partition),
                namespace: owned(namespace),
                kind: String::new(),
                name: owned(name),
            }),
            [partition, namespace, kind, name] => Ok(Self {
                partition: owned(partition),
                namespace: owned(namespace),
                kind: owned(kind),
                name: owned(name),
            }),
            _ => Err(malformed(raw)),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.partition.is_empty() || !self.namespace.is_empty() {
            write!(f, "{}/{}/", self.partition, self.namespace)?;
        }
        if !self.kind.is_empty() {
            write!(f, "{}/", self.kind)?;
        }
        f.write_str(&self.name)
    }
}

fn malformed(raw: &str) -> Error {
    Error::identity(raw, format!("expected one of {ACCEPTED_FORMS}"))
}

/// Build the synthetic ID of an attachment
pub fn attachment_id(parent: &str, child: &str) -> String {
    format!("{parent}:{child}")
}

/// Parse an attachment ID into `(parent, child)`
///
/// The separator is `:`, or `/` when the ID contains no colon. Exactly two
/// non-empty parts are accepted.
pub fn parse_attachment_id(raw: &str) -> Result<(String, String), Error> {
    let sep = if raw.contains(':') { ':' } else { '/' };
    let mut parts = raw.split(sep);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(parent), Some(child), None) if !parent.is_empty() && !child.is_empty() => {
            Ok((parent.to_string(), child.to_string()))
        }
        _ => Err(Error::identity(
            raw,
            "expected <parent>:<child> with both parts non-empty",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_name() {
        assert_eq!(Identity::parse("x").unwrap(), Identity::named("x"));
    }

    #[test]
    fn parses_kind_and_name() {
        let id = Identity::parse("service-defaults/foo").unwrap();
        assert_eq!(id.kind, "service-defaults");
        assert_eq!(id.name, "foo");
        assert!(id.partition.is_empty() && id.namespace.is_empty());
    }

    #[test]
    fn parses_scoped_name() {
        let id = Identity::parse("p/n/foo").unwrap();
        assert_eq!(
            id,
            Identity {
                partition: "p".into(),
                namespace: "n".into(),
                kind: String::new(),
                name: "foo".into(),
            }
        );
    }

    #[test]
    fn parses_fully_qualified() {
        let id = Identity::parse("p1/n1/service-resolver/web").unwrap();
        assert_eq!(id.partition, "p1");
        assert_eq!(id.namespace, "n1");
        assert_eq!(id.kind, "service-resolver");
        assert_eq!(id.name, "web");
        assert_eq!(id.to_string(), "p1/n1/service-resolver/web");
    }

    #[test]
    fn rejects_everything_else() {
        for raw in ["", "/", "a/", "/a", "a//b", "a/b/c/d/e", "p/n//name"] {
            match Identity::parse(raw) {
                Err(Error::IdentityMalformed { id, message }) => {
                    assert_eq!(id, raw);
                    assert!(message.contains("<partition>/<namespace>/<kind>/<name>"));
                }
                other => panic!("{raw:?} should be malformed, got {other:?}"),
            }
        }
    }

    #[test]
    fn parse_is_total() {
        let alphabet = ["a", "/", "b"];
        let mut inputs = vec![String::new()];
        for _ in 0..5 {
            let next: Vec<String> = inputs
                .iter()
                .flat_map(|s| alphabet.iter().map(move |c| format!("{s}{c}")))
                .collect();
            inputs.extend(next);
        }
        for raw in inputs {
            match Identity::parse(&raw) {
                Ok(id) => assert!(!id.name.is_empty()),
                Err(Error::IdentityMalformed { .. }) => {}
                Err(other) => panic!("unexpected error for {raw:?}: {other:?}"),
            }
        }
    }

    #[test]
    fn attachment_ids_round_trip() {
        let id = attachment_id("role-123", "readers");
        assert_eq!(
            parse_attachment_id(&id).unwrap(),
            ("role-123".to_string(), "readers".to_string())
        );
        assert_eq!(
            parse_attachment_id("tok/pol").unwrap(),
            ("tok".to_string(), "pol".to_string())
        );
    }

    #[test]
    fn attachment_ids_reject_bad_shapes() {
        for raw in ["", "a", "a:", ":b", "a:b:c", "a/b/c"] {
            assert!(
                matches!(parse_attachment_id(raw), Err(Error::IdentityMalformed { .. })),
                "{raw:?}"
            );
        }
    }
}
