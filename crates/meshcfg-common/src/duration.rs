//! Duration-string validation
//!
//! Duration attributes are passed to the remote verbatim (`10s`, `200ms`,
//! `1h30m`); the engine only checks that they parse.

use std::time::Duration;

use crate::error::Error;

/// Parse a humanized duration string for the named attribute
pub fn parse_duration(field: &str, value: &str) -> Result<Duration, Error> {
    humantime::parse_duration(value.trim()).map_err(|e| Error::DurationInvalid {
        field: field.to_string(),
        value: value.to_string(),
        message: e.to_string(),
    })
}

/// Validate an optional duration string, passing it through unchanged
pub fn validate_duration<'a>(field: &str, value: Option<&'a str>) -> Result<Option<&'a str>, Error> {
    match value {
        Some(v) if !v.is_empty() => parse_duration(field, v).map(|_| Some(v)),
        _ => Ok(None),
    }
}
