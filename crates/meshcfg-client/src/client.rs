//! Typed API client
//!
//! [`ApiClient`] wraps a [`Transport`] with cancellation, JSON
//! (de)serialization and the error conventions the handlers rely on:
//! missing objects read as `None`, and endpoints that only exist on
//! enterprise editions fail with [`Error::EnterpriseOnly`].

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use meshcfg_common::{Error, Result};

use crate::transport::{
    Method, QueryOptions, RequestBody, Response, ResponseMeta, Transport, WriteOptions,
};

/// Body marker of a 404 from an endpoint the edition does not serve
pub const UNRECOGNIZED_ENDPOINT: &str = "not a recognized HTTP API endpoint";

/// Body marker of a 403 returned for a missing ACL object
pub const ACL_NOT_FOUND: &str = "ACL not found";

/// Shared client for the remote API
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
    datacenter: Option<String>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("datacenter", &self.datacenter)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl ApiClient {
    /// Client over the given transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            cancel: CancellationToken::new(),
            datacenter: None,
        }
    }

    /// Use the given token to cancel in-flight requests
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Datacenter returned by [`datacenter`](Self::datacenter) without asking
    /// the agent
    pub fn with_datacenter(mut self, datacenter: impl Into<String>) -> Self {
        let dc = datacenter.into();
        self.datacenter = (!dc.is_empty()).then_some(dc);
        self
    }

    /// The cancellation token requests race against
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Datacenter set with [`with_datacenter`](Self::with_datacenter)
    pub fn configured_datacenter(&self) -> Option<&str> {
        self.datacenter.as_deref()
    }

    /// The underlying transport
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Run a future unless the client is cancelled first
    pub async fn cancellable<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            result = fut => result,
        }
    }

    // =========================================================================
    // Raw operations
    // =========================================================================

    /// GET returning the raw response
    pub async fn query(&self, path: &str, opts: &QueryOptions) -> Result<Response> {
        self.cancellable(self.transport.query(path, opts)).await
    }

    /// PUT or POST returning the raw response
    pub async fn write(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        opts: &WriteOptions,
    ) -> Result<Response> {
        self.cancellable(self.transport.write(method, path, body, opts))
            .await
    }

    /// DELETE returning the raw response
    pub async fn delete(&self, path: &str, opts: &WriteOptions) -> Result<Response> {
        self.cancellable(self.transport.delete(path, opts)).await
    }

    // =========================================================================
    // Typed helpers
    // =========================================================================

    /// GET and decode the body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        opts: &QueryOptions,
    ) -> Result<(T, ResponseMeta)> {
        let response = self.query(path, opts).await?;
        Ok((decode(path, response.body)?, response.meta))
    }

    /// GET and decode the body; missing objects are `None`
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        opts: &QueryOptions,
    ) -> Result<Option<T>> {
        match self.get_json(path, opts).await {
            Ok((value, _)) => Ok(Some(value)),
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// GET on an edition-gated endpoint; missing objects are `None`
    ///
    /// A 404 from an endpoint the edition does not serve becomes
    /// [`Error::EnterpriseOnly`] for `resource` instead of reading as missing.
    pub async fn get_gated<T: DeserializeOwned>(
        &self,
        path: &str,
        opts: &QueryOptions,
        resource: &str,
    ) -> Result<Option<T>> {
        match self.get_json(path, opts).await {
            Ok((value, _)) => Ok(Some(value)),
            Err(e) if is_enterprise_only(&e) => Err(Error::enterprise_only(resource)),
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write a JSON body and decode the response
    pub async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        opts: &WriteOptions,
    ) -> Result<(T, ResponseMeta)>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let response = self
            .write(method, path, RequestBody::Json(body), opts)
            .await?;
        Ok((decode(path, response.body)?, response.meta))
    }

    /// PUT a JSON body and decode the response
    pub async fn put_json<B, T>(&self, path: &str, body: &B, opts: &WriteOptions) -> Result<(T, ResponseMeta)>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::Put, path, body, opts).await
    }

    /// PUT a JSON body, ignoring the response body
    pub async fn put_unit<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        opts: &WriteOptions,
    ) -> Result<ResponseMeta> {
        let body = serde_json::to_value(body)?;
        let response = self
            .write(Method::Put, path, RequestBody::Json(body), opts)
            .await?;
        Ok(response.meta)
    }

    /// DELETE; a missing object counts as deleted
    pub async fn delete_existing(&self, path: &str, opts: &WriteOptions) -> Result<()> {
        match self.delete(path, opts).await {
            Ok(_) => Ok(()),
            Err(e) if is_missing(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Decode a response body, mapping failures to serialization errors
pub fn decode<T: DeserializeOwned>(path: &str, body: Value) -> Result<T> {
    serde_json::from_value(body)
        .map_err(|e| Error::serialization(format!("decoding response of {path}: {e}")))
}

/// Whether an error means the object does not exist
///
/// The ACL endpoints answer 403 "ACL not found" for some missing objects.
pub fn is_missing(err: &Error) -> bool {
    if err.is_not_found() {
        return true;
    }
    err.status() == Some(403) && err.body().is_some_and(|b| b.contains(ACL_NOT_FOUND))
}

/// Whether an error means the edition does not serve this feature
pub fn is_enterprise_only(err: &Error) -> bool {
    match (err.status(), err.body()) {
        (Some(404), Some(body)) if body.contains(UNRECOGNIZED_ENDPOINT) => true,
        (Some(400 | 404), Some(body)) => body.contains("Enterprise") || body.contains("enterprise"),
        _ => false,
    }
}

/// Replace edition errors with [`Error::EnterpriseOnly`] for the resource
pub fn enterprise_gate(err: Error, resource: &str) -> Error {
    if is_enterprise_only(&err) {
        Error::enterprise_only(resource)
    } else {
        err
    }
}

/// Percent-encode one path segment
///
/// Names in this API are mostly plain, but KV keys and service names may
/// contain characters that would otherwise change the URL.
pub fn escape_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for b in segment.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// Percent-encode a slash-separated path, keeping the slashes
pub fn escape_path(path: &str) -> String {
    path.split('/').map(escape_segment).collect::<Vec<_>>().join("/")
}
