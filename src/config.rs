//! Engine configuration
//!
//! The host hands the engine one configuration object: the connection
//! settings of [`ClientConfig`] plus engine-wide behaviour. Unset fields fall
//! back to the environment and then to defaults.

use std::time::Duration;

use serde::Deserialize;

use meshcfg_client::ClientConfig;
use meshcfg_common::backoff::Backoff;
use meshcfg_common::telemetry::{LogFormat, LoggingConfig, DEFAULT_FILTER};
use meshcfg_common::{Error, Result, DEFAULT_EXTERNAL_SOURCE};
use meshcfg_resources::Settings;

/// Configuration of an [`Engine`](crate::Engine)
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Connection to the remote cluster
    #[serde(flatten)]
    pub client: ClientConfig,
    /// Marker written to `meta["external-source"]` of catalog services
    pub external_source: Option<String>,
    /// Attempts of each ACL replication wait
    pub replication_attempts: Option<u32>,
    /// First delay of each ACL replication wait, e.g. `1ms`
    pub replication_base_delay: Option<String>,
    /// Logging installed by [`Engine::configure`](crate::Engine::configure);
    /// unset leaves logging to the host
    pub logging: Option<LoggingSettings>,
}

/// Logging section of [`EngineConfig`]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `json` (default) or `text`
    pub format: String,
    /// Filter directives used when `RUST_LOG` is unset
    pub filter: Option<String>,
}

impl LoggingSettings {
    /// Telemetry configuration for these settings
    pub fn to_logging_config(&self) -> Result<LoggingConfig> {
        let format = match self.format.as_str() {
            "" | "json" => LogFormat::Json,
            "text" => LogFormat::Text,
            other => {
                return Err(Error::config(format!(
                    "unknown log format {other:?}, expected json or text"
                )))
            }
        };
        Ok(LoggingConfig {
            format,
            default_filter: self.filter.clone().unwrap_or_else(|| DEFAULT_FILTER.to_string()),
        })
    }
}

impl EngineConfig {
    /// Parse the host's configuration block
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::config(e.to_string()))
    }

    /// Check engine-wide settings
    ///
    /// Connection settings are checked when the transport is built.
    pub fn validate(&self) -> Result<()> {
        if self.external_source.as_deref() == Some("") {
            return Err(Error::config("external_source must not be empty"));
        }
        if self.replication_attempts == Some(0) {
            return Err(Error::config("replication_attempts must be at least 1"));
        }
        self.replication_base_delay()?;
        if let Some(logging) = &self.logging {
            logging.to_logging_config()?;
        }
        Ok(())
    }

    /// Handler settings derived from this configuration
    pub fn settings(&self) -> Result<Settings> {
        let defaults = Backoff::default();
        Ok(Settings {
            external_source: self
                .external_source
                .clone()
                .unwrap_or_else(|| DEFAULT_EXTERNAL_SOURCE.to_string()),
            replication: Backoff {
                max_attempts: self.replication_attempts.unwrap_or(defaults.max_attempts),
                base: self.replication_base_delay()?.unwrap_or(defaults.base),
            },
        })
    }

    fn replication_base_delay(&self) -> Result<Option<Duration>> {
        self.replication_base_delay
            .as_deref()
            .map(|raw| meshcfg_common::duration::parse_duration("replication_base_delay", raw))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn connection_fields_sit_next_to_engine_fields() {
        let config = EngineConfig::from_value(json!({
            "address": "127.0.0.1:8500",
            "datacenter": "dc2",
            "external_source": "meshcfg",
            "replication_attempts": 5,
            "logging": {"format": "text"}
        }))
        .unwrap();
        assert_eq!(config.client.address, "127.0.0.1:8500");
        assert_eq!(config.client.datacenter.as_deref(), Some("dc2"));
        let settings = config.settings().unwrap();
        assert_eq!(settings.external_source, "meshcfg");
        assert_eq!(settings.replication.max_attempts, 5);
        assert_eq!(settings.replication.base, Backoff::default().base);
    }

    #[test]
    fn defaults_match_the_handlers() {
        let settings = EngineConfig::default().settings().unwrap();
        assert_eq!(settings.external_source, DEFAULT_EXTERNAL_SOURCE);
        assert_eq!(settings.replication, Backoff::default());
    }

    #[test]
    fn invalid_engine_settings_are_rejected() {
        let cases = [
            json!({"external_source": ""}),
            json!({"replication_attempts": 0}),
            json!({"replication_base_delay": "soon"}),
            json!({"logging": {"format": "xml"}}),
        ];
        for case in cases {
            let config = EngineConfig::from_value(case.clone()).unwrap();
            assert!(config.validate().is_err(), "{case} should be rejected");
        }
    }
}
