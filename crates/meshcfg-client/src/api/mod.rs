//! Endpoint helpers, one module per API area
//!
//! Each module adds methods to [`ApiClient`](crate::ApiClient); nothing
//! here holds state of its own.

mod acl;
mod agent;
mod catalog;
mod config;
mod intention;
mod kv;
mod operator;
mod peering;
mod query;
mod scope;
mod v2;
