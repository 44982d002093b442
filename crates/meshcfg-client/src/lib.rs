//! HTTP transport and typed endpoint helpers for the service mesh API
//!
//! [`HttpTransport`] speaks HTTP to an agent; [`ApiClient`] layers typed
//! requests and the shared error conventions on top of any [`Transport`],
//! so handlers can be tested against a mocked transport.

#![deny(missing_docs)]

pub mod api;
pub mod client;
pub mod config;
pub mod transport;
pub mod types;

pub use client::{enterprise_gate, is_enterprise_only, is_missing, ApiClient};
pub use config::{ClientConfig, ResolvedConfig, Scheme};
pub use transport::{
    Consistency, HttpTransport, Method, QueryOptions, RequestBody, Response, ResponseMeta,
    Transport, WriteOptions,
};

#[cfg(any(test, feature = "mock"))]
pub use transport::MockTransport;
