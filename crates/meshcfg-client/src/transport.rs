//! HTTP transport for the remote cluster API
//!
//! [`Transport`] is the seam between the engine and the network. The
//! production implementation is [`HttpTransport`] over reqwest; tests use the
//! generated `MockTransport`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::{debug, trace};

#[cfg(any(test, feature = "mock"))]
use mockall::automock;

use meshcfg_common::{Error, Result};

use crate::config::{ClientConfig, ResolvedConfig};

/// Header carrying the ACL token
pub const TOKEN_HEADER: &str = "X-Consul-Token";
/// Response header carrying the raft index
pub const INDEX_HEADER: &str = "X-Consul-Index";
/// Response header reporting whether the cluster has a leader
pub const KNOWN_LEADER_HEADER: &str = "X-Consul-KnownLeader";
/// Response header with milliseconds since the last leader contact
pub const LAST_CONTACT_HEADER: &str = "X-Consul-LastContact";

/// Read consistency mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Consistency {
    /// Leader-served, possibly stale during elections
    #[default]
    Default,
    /// Any server may answer
    Stale,
    /// Leader verifies its leadership before answering
    Consistent,
}

/// Per-call options for reads
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryOptions {
    /// Datacenter; the agent's own when unset
    pub datacenter: Option<String>,
    /// ACL token overriding the default when non-empty
    pub token: Option<String>,
    /// Admin partition
    pub partition: Option<String>,
    /// Namespace
    pub namespace: Option<String>,
    /// Consistency mode
    pub consistency: Consistency,
    /// Blocking query index
    pub wait_index: Option<u64>,
    /// Blocking query maximum wait
    pub wait_time: Option<Duration>,
    /// Additional query parameters
    pub params: Vec<(String, String)>,
}

impl QueryOptions {
    /// Options scoped to a partition and namespace; empty values are dropped
    pub fn scoped(partition: &str, namespace: &str) -> Self {
        Self {
            partition: non_empty(partition),
            namespace: non_empty(namespace),
            ..Default::default()
        }
    }

    /// Set the datacenter when non-empty
    pub fn in_datacenter(mut self, datacenter: &str) -> Self {
        self.datacenter = non_empty(datacenter);
        self
    }

    /// Set the token when non-empty
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = non_empty(token);
        self
    }

    /// Add a query parameter
    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    /// Query parameters for this request, in emission order
    pub fn query_params(&self) -> Vec<(String, String)> {
        let mut out = scope_params(&self.datacenter, &self.partition, &self.namespace);
        match self.consistency {
            Consistency::Default => {}
            Consistency::Stale => out.push(("stale".into(), String::new())),
            Consistency::Consistent => out.push(("consistent".into(), String::new())),
        }
        if let Some(index) = self.wait_index {
            out.push(("index".into(), index.to_string()));
        }
        if let Some(wait) = self.wait_time {
            out.push(("wait".into(), format!("{}ms", wait.as_millis())));
        }
        out.extend(self.params.iter().cloned());
        out
    }
}

/// Per-call options for writes and deletes
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteOptions {
    /// Datacenter; the agent's own when unset
    pub datacenter: Option<String>,
    /// ACL token overriding the default when non-empty
    pub token: Option<String>,
    /// Admin partition
    pub partition: Option<String>,
    /// Namespace
    pub namespace: Option<String>,
    /// Additional query parameters
    pub params: Vec<(String, String)>,
}

impl WriteOptions {
    /// Options scoped to a partition and namespace; empty values are dropped
    pub fn scoped(partition: &str, namespace: &str) -> Self {
        Self {
            partition: non_empty(partition),
            namespace: non_empty(namespace),
            ..Default::default()
        }
    }

    /// Set the datacenter when non-empty
    pub fn in_datacenter(mut self, datacenter: &str) -> Self {
        self.datacenter = non_empty(datacenter);
        self
    }

    /// Set the token when non-empty
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = non_empty(token);
        self
    }

    /// Add a query parameter
    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    /// Query parameters for this request, in emission order
    pub fn query_params(&self) -> Vec<(String, String)> {
        let mut out = scope_params(&self.datacenter, &self.partition, &self.namespace);
        out.extend(self.params.iter().cloned());
        out
    }
}

fn scope_params(
    datacenter: &Option<String>,
    partition: &Option<String>,
    namespace: &Option<String>,
) -> Vec<(String, String)> {
    [("dc", datacenter), ("partition", partition), ("ns", namespace)]
        .into_iter()
        .filter_map(|(k, v)| {
            v.as_ref()
                .filter(|v| !v.is_empty())
                .map(|v| (k.to_string(), v.clone()))
        })
        .collect()
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// HTTP method of a write
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    /// PUT
    Put,
    /// POST
    Post,
}

/// Body of a write
#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
    /// No body
    Empty,
    /// JSON document
    Json(Value),
    /// Raw bytes, sent as-is
    Raw(Vec<u8>),
}

/// Metadata parsed from response headers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    /// Raft index of the response
    pub last_index: u64,
    /// Whether the cluster has a known leader
    pub known_leader: bool,
    /// Milliseconds since the serving node last heard from the leader
    pub last_contact_ms: u64,
}

impl ResponseMeta {
    /// Meta carrying only an index
    pub fn at_index(last_index: u64) -> Self {
        Self {
            last_index,
            known_leader: true,
            last_contact_ms: 0,
        }
    }
}

/// A successful response
///
/// Bodies that are not JSON are returned as a JSON string; empty bodies are
/// `null`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Response {
    /// Decoded body
    pub body: Value,
    /// Header metadata
    pub meta: ResponseMeta,
}

impl Response {
    /// Response with the given body and a zero index
    pub fn json(body: Value) -> Self {
        Self {
            body,
            meta: ResponseMeta::default(),
        }
    }

    /// Response with the given body and index
    pub fn with_index(body: Value, index: u64) -> Self {
        Self {
            body,
            meta: ResponseMeta::at_index(index),
        }
    }
}

/// Access to the remote HTTP API
///
/// Paths are relative to the API root (`/acl/policy`, `/kv/app/x`); V2
/// resource paths start with `/api/` and are sent verbatim. Non-2xx
/// responses are returned as [`Error::Remote`], connection failures as
/// [`Error::Network`].
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET
    async fn query(&self, path: &str, opts: &QueryOptions) -> Result<Response>;

    /// Issue a PUT or POST with the given body
    async fn write(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        opts: &WriteOptions,
    ) -> Result<Response>;

    /// Issue a DELETE
    async fn delete(&self, path: &str, opts: &WriteOptions) -> Result<Response>;
}

/// Transport backed by a pooled reqwest client
pub struct HttpTransport {
    client: reqwest::Client,
    config: ResolvedConfig,
}

impl HttpTransport {
    /// Validate the configuration and build the HTTP client
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let resolved = config.resolve()?;
        Self::from_resolved(resolved)
    }

    /// Build the HTTP client from an already-resolved configuration
    pub fn from_resolved(config: ResolvedConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .default_headers(default_headers(&config)?);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if config.insecure_https {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(pem) = &config.ca_pem {
            let certs = reqwest::Certificate::from_pem_bundle(pem)
                .map_err(|e| Error::config(format!("invalid CA bundle: {e}")))?;
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }
        if let Some(pem) = &config.identity_pem {
            let identity = reqwest::Identity::from_pem(pem)
                .map_err(|e| Error::config(format!("invalid client certificate: {e}")))?;
            builder = builder.identity(identity);
        }

        let client = builder
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;
        debug!(base_url = %config.base_url, "built HTTP transport");
        Ok(Self { client, config })
    }

    /// The resolved configuration
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("/api/") {
            format!("{}{}", self.config.base_url, path)
        } else {
            format!("{}/v1{}", self.config.base_url, path)
        }
    }

    /// Fill in configured defaults for unset scope options
    fn defaults(
        &self,
        datacenter: &Option<String>,
        partition: &Option<String>,
        namespace: &Option<String>,
    ) -> (Option<String>, Option<String>, Option<String>) {
        (
            datacenter.clone().or_else(|| self.config.datacenter.clone()),
            partition.clone().or_else(|| self.config.partition.clone()),
            namespace.clone().or_else(|| self.config.namespace.clone()),
        )
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        params: Vec<(String, String)>,
        token: Option<&str>,
        body: RequestBody,
    ) -> Result<Response> {
        let url = self.url(path);
        trace!(%method, %url, "sending request");

        let mut request = self.client.request(method.clone(), &url).query(&params);
        let token = token
            .filter(|t| !t.is_empty())
            .or(self.config.token.as_deref());
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token);
        }
        if let Some(auth) = &self.config.basic_auth {
            request = request.basic_auth(&auth.username, auth.password.as_ref());
        }
        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(&value),
            RequestBody::Raw(bytes) => request.body(bytes),
        };

        let response = request
            .send()
            .await
            .map_err(|e| Error::network(format!("{method} {path}: {e}")))?;
        let status = response.status();
        let meta = parse_meta(response.headers());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::network(format!("{method} {path}: reading body: {e}")))?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            debug!(%method, path, status = status.as_u16(), "remote returned an error");
            return Err(Error::remote(status.as_u16(), body));
        }
        Ok(Response {
            body: decode_body(&bytes),
            meta,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn query(&self, path: &str, opts: &QueryOptions) -> Result<Response> {
        let (datacenter, partition, namespace) =
            self.defaults(&opts.datacenter, &opts.partition, &opts.namespace);
        let opts = QueryOptions {
            datacenter,
            partition,
            namespace,
            ..opts.clone()
        };
        self.send(
            reqwest::Method::GET,
            path,
            opts.query_params(),
            opts.token.as_deref(),
            RequestBody::Empty,
        )
        .await
    }

    async fn write(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        opts: &WriteOptions,
    ) -> Result<Response> {
        let (datacenter, partition, namespace) =
            self.defaults(&opts.datacenter, &opts.partition, &opts.namespace);
        let opts = WriteOptions {
            datacenter,
            partition,
            namespace,
            ..opts.clone()
        };
        let method = match method {
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
        };
        self.send(method, path, opts.query_params(), opts.token.as_deref(), body)
            .await
    }

    async fn delete(&self, path: &str, opts: &WriteOptions) -> Result<Response> {
        let (datacenter, partition, namespace) =
            self.defaults(&opts.datacenter, &opts.partition, &opts.namespace);
        let opts = WriteOptions {
            datacenter,
            partition,
            namespace,
            ..opts.clone()
        };
        self.send(
            reqwest::Method::DELETE,
            path,
            opts.query_params(),
            opts.token.as_deref(),
            RequestBody::Empty,
        )
        .await
    }
}

fn default_headers(config: &ResolvedConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::config(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::config(format!("invalid value for header {name}: {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Parse index, leader and contact metadata from response headers
pub fn parse_meta(headers: &HeaderMap) -> ResponseMeta {
    let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    ResponseMeta {
        last_index: get(INDEX_HEADER).and_then(|v| v.parse().ok()).unwrap_or(0),
        known_leader: get(KNOWN_LEADER_HEADER) == Some("true"),
        last_contact_ms: get(LAST_CONTACT_HEADER)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
    }
}

/// Decode a response body: JSON when possible, otherwise a string
pub fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_params_follow_options() {
        let opts = QueryOptions {
            datacenter: Some("dc2".into()),
            partition: Some("p1".into()),
            namespace: Some("".into()),
            consistency: Consistency::Stale,
            wait_index: Some(42),
            wait_time: Some(Duration::from_secs(5)),
            ..Default::default()
        }
        .param("recurse", "");

        let params = opts.query_params();
        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["dc", "partition", "stale", "index", "wait", "recurse"]);
        assert!(params.contains(&("wait".into(), "5000ms".into())));
        assert!(params.contains(&("index".into(), "42".into())));
    }

    #[test]
    fn scoped_options_drop_empty_values() {
        let opts = WriteOptions::scoped("", "team-a").in_datacenter("");
        assert_eq!(opts.partition, None);
        assert_eq!(opts.namespace.as_deref(), Some("team-a"));
        assert_eq!(opts.query_params(), vec![("ns".to_string(), "team-a".to_string())]);

        let q = QueryOptions::scoped("p", "").with_token("");
        assert_eq!(q.token, None);
        assert_eq!(q.consistency, Consistency::Default);
    }

    #[test]
    fn response_meta_parses_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(INDEX_HEADER, HeaderValue::from_static("1234"));
        headers.insert(KNOWN_LEADER_HEADER, HeaderValue::from_static("true"));
        headers.insert(LAST_CONTACT_HEADER, HeaderValue::from_static("7"));
        assert_eq!(
            parse_meta(&headers),
            ResponseMeta {
                last_index: 1234,
                known_leader: true,
                last_contact_ms: 7
            }
        );
        assert_eq!(parse_meta(&HeaderMap::new()), ResponseMeta::default());
    }

    #[test]
    fn bodies_decode_as_json_or_text() {
        assert_eq!(decode_body(b""), Value::Null);
        assert_eq!(decode_body(b"  \n"), Value::Null);
        assert_eq!(decode_body(b"true"), json!(true));
        assert_eq!(decode_body(br#"{"ID":"x"}"#), json!({"ID": "x"}));
        assert_eq!(decode_body(b"02MV4UU43BK5HGYYTOJZ"), json!("02MV4UU43BK5HGYYTOJZ"));
    }

    #[test]
    fn urls_prefix_v1_except_v2_resources() {
        let transport = HttpTransport::new(&ClientConfig::default()).unwrap();
        assert_eq!(
            transport.url("/acl/policy"),
            "http://127.0.0.1:8500/v1/acl/policy"
        );
        assert_eq!(
            transport.url("/api/multicluster/v2/ExportedServices/web"),
            "http://127.0.0.1:8500/api/multicluster/v2/ExportedServices/web"
        );
    }

    #[test]
    fn invalid_headers_are_config_errors() {
        let config = ClientConfig {
            headers: [("bad header".to_string(), "v".to_string())].into(),
            ..Default::default()
        };
        assert!(matches!(
            HttpTransport::new(&config),
            Err(Error::ConfigInvalid { .. })
        ));
    }
}
