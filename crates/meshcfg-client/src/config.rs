//! Client configuration
//!
//! `ClientConfig` is deserialized from the host's provider configuration
//! block, completed from the environment and validated before a transport is
//! built.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use meshcfg_common::Error;

/// Default agent address
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:8500";

/// Environment variables consulted by [`ClientConfig::with_env_defaults`]
pub mod env {
    /// Address, optionally with scheme
    pub const HTTP_ADDR: &str = "CONSUL_HTTP_ADDR";
    /// Default ACL token
    pub const HTTP_TOKEN: &str = "CONSUL_HTTP_TOKEN";
    /// `true` selects https
    pub const HTTP_SSL: &str = "CONSUL_HTTP_SSL";
    /// `false` disables TLS verification
    pub const HTTP_SSL_VERIFY: &str = "CONSUL_HTTP_SSL_VERIFY";
    /// CA bundle file
    pub const CACERT: &str = "CONSUL_CACERT";
    /// Client certificate file
    pub const CLIENT_CERT: &str = "CONSUL_CLIENT_CERT";
    /// Client key file
    pub const CLIENT_KEY: &str = "CONSUL_CLIENT_KEY";
    /// HTTP basic auth as `user[:pass]`
    pub const HTTP_AUTH: &str = "CONSUL_HTTP_AUTH";
}

/// URL scheme used to reach the agent
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scheme {
    /// Plain HTTP
    #[default]
    Http,
    /// HTTP over TLS
    Https,
}

impl Scheme {
    /// Parse `http` or `https`
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "" | "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(Error::config(format!(
                "scheme must be http or https, got {other:?}"
            ))),
        }
    }

    /// Scheme as used in URLs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

/// HTTP basic auth credentials
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    /// User name
    pub username: String,
    /// Password, if any
    pub password: Option<String>,
}

impl BasicAuth {
    /// Parse `user[:pass]`
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let (user, pass) = match raw.split_once(':') {
            Some((u, p)) => (u, Some(p.to_string())),
            None => (raw, None),
        };
        if user.is_empty() {
            return Err(Error::config("http_auth must be of the form user[:pass]"));
        }
        Ok(Self {
            username: user.to_string(),
            password: pass,
        })
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Configuration of the connection to the remote cluster
#[derive(Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// `host:port` of the agent, optionally prefixed with a scheme
    pub address: String,
    /// `http` or `https`
    pub scheme: String,
    /// Path to a PEM CA bundle
    pub ca_file: Option<String>,
    /// PEM CA bundle given inline
    pub ca_pem: Option<String>,
    /// Path to the PEM client certificate
    pub cert_file: Option<String>,
    /// Path to the PEM client key
    pub key_file: Option<String>,
    /// Skip TLS verification; only valid with https
    pub insecure_https: bool,
    /// HTTP basic auth as `user[:pass]`
    pub http_auth: Option<String>,
    /// Default datacenter
    pub datacenter: Option<String>,
    /// Default ACL token
    pub token: Option<String>,
    /// Default namespace
    pub namespace: Option<String>,
    /// Default admin partition
    pub partition: Option<String>,
    /// Extra headers sent on every request
    pub headers: BTreeMap<String, String>,
    /// Request timeout in seconds; 0 disables it
    pub timeout_seconds: u64,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("ClientConfig")
            .field("address", &self.address)
            .field("scheme", &self.scheme)
            .field("ca_file", &self.ca_file)
            .field("ca_pem", &self.ca_pem.as_ref().map(|_| "<pem>"))
            .field("cert_file", &self.cert_file)
            .field("key_file", &self.key_file)
            .field("insecure_https", &self.insecure_https)
            .field("http_auth", &redact(&self.http_auth))
            .field("datacenter", &self.datacenter)
            .field("token", &redact(&self.token))
            .field("namespace", &self.namespace)
            .field("partition", &self.partition)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Configuration after validation, ready to build a transport
#[derive(Clone, Debug)]
pub struct ResolvedConfig {
    /// Base URL without trailing slash, e.g. `https://127.0.0.1:8501`
    pub base_url: String,
    /// Scheme of the base URL
    pub scheme: Scheme,
    /// CA bundle PEM bytes
    pub ca_pem: Option<Vec<u8>>,
    /// Client certificate and key PEM, concatenated
    pub identity_pem: Option<Vec<u8>>,
    /// Skip TLS verification
    pub insecure_https: bool,
    /// Basic auth credentials
    pub basic_auth: Option<BasicAuth>,
    /// Default datacenter
    pub datacenter: Option<String>,
    /// Default ACL token
    pub token: Option<String>,
    /// Default namespace
    pub namespace: Option<String>,
    /// Default admin partition
    pub partition: Option<String>,
    /// Extra headers
    pub headers: BTreeMap<String, String>,
    /// Request timeout
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    /// Parse the host's configuration block
    pub fn from_value(value: serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(value).map_err(|e| Error::config(e.to_string()))
    }

    /// Fill unset fields from the environment
    pub fn with_env_defaults(self) -> Self {
        self.with_env_lookup(|key| std::env::var(key).ok())
    }

    /// Fill unset fields from the given lookup function
    pub fn with_env_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if self.address.is_empty() {
            if let Some(addr) = get(env::HTTP_ADDR) {
                self.address = addr;
            }
        }
        if self.scheme.is_empty() && get(env::HTTP_SSL).is_some_and(|v| parse_bool(&v)) {
            self.scheme = "https".to_string();
        }
        if !self.insecure_https && get(env::HTTP_SSL_VERIFY).is_some_and(|v| !parse_bool(&v)) {
            self.insecure_https = true;
        }
        self.token = self.token.or_else(|| get(env::HTTP_TOKEN));
        self.ca_file = self.ca_file.or_else(|| get(env::CACERT));
        self.cert_file = self.cert_file.or_else(|| get(env::CLIENT_CERT));
        self.key_file = self.key_file.or_else(|| get(env::CLIENT_KEY));
        self.http_auth = self.http_auth.or_else(|| get(env::HTTP_AUTH));
        self
    }

    /// Validate the configuration and load TLS material
    pub fn resolve(&self) -> Result<ResolvedConfig, Error> {
        let (scheme, host) = self.split_address()?;

        if self.insecure_https && scheme != Scheme::Https {
            return Err(Error::config(
                "insecure_https requires the https scheme",
            ));
        }
        if self.cert_file.is_some() != self.key_file.is_some() {
            return Err(Error::config(
                "cert_file and key_file must be set together",
            ));
        }

        let ca_pem = match (&self.ca_pem, &self.ca_file) {
            (Some(pem), _) => Some(pem.clone().into_bytes()),
            (None, Some(path)) => Some(read_pem(path)?),
            (None, None) => None,
        };
        let identity_pem = match (&self.cert_file, &self.key_file) {
            (Some(cert), Some(key)) => {
                let mut pem = read_pem(cert)?;
                pem.push(b'\n');
                pem.extend(read_pem(key)?);
                Some(pem)
            }
            _ => None,
        };
        let basic_auth = self
            .http_auth
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(BasicAuth::parse)
            .transpose()?;

        Ok(ResolvedConfig {
            base_url: format!("{}://{}", scheme.as_str(), host.trim_end_matches('/')),
            scheme,
            ca_pem,
            identity_pem,
            insecure_https: self.insecure_https,
            basic_auth,
            datacenter: non_empty(&self.datacenter),
            token: non_empty(&self.token),
            namespace: non_empty(&self.namespace),
            partition: non_empty(&self.partition),
            headers: self.headers.clone(),
            timeout: (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds)),
        })
    }

    /// Scheme and host, honoring a scheme embedded in the address
    fn split_address(&self) -> Result<(Scheme, String), Error> {
        let address = if self.address.is_empty() {
            DEFAULT_ADDRESS
        } else {
            self.address.as_str()
        };
        let declared = Scheme::parse(&self.scheme)?;
        match address.split_once("://") {
            Some((embedded, host)) => {
                let embedded = Scheme::parse(embedded)?;
                if !self.scheme.is_empty() && embedded != declared {
                    return Err(Error::config(format!(
                        "address scheme {} conflicts with scheme {}",
                        embedded.as_str(),
                        declared.as_str()
                    )));
                }
                Ok((embedded, host.to_string()))
            }
            None => Ok((declared, address.to_string())),
        }
    }
}

fn non_empty(v: &Option<String>) -> Option<String> {
    v.as_ref().filter(|s| !s.is_empty()).cloned()
}

fn parse_bool(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn read_pem(path: &str) -> Result<Vec<u8>, Error> {
    std::fs::read(path).map_err(|e| Error::config(format!("failed to read {path}: {e}")))
}
