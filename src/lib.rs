//! meshcfg - declarative configuration engine for service mesh clusters
//!
//! The engine reconciles declared state for ACLs, config entries, catalog
//! registrations, key/value trees, peerings and operator settings against a
//! remote cluster over its HTTP API. It is a library: a lifecycle host owns
//! state persistence and planning, and calls into [`Engine`] with a resource
//! type name and a [`ResourceData`].
//!
//! # Modules
//!
//! - [`config`] - engine configuration
//! - [`registry`] - resource type lookup
//! - [`engine`] - lifecycle entry points
//!
//! Handlers live in [`meshcfg_resources`], the HTTP client in
//! [`meshcfg_client`] and shared types in [`meshcfg_common`].

#![deny(missing_docs)]

pub mod config;
pub mod engine;
pub mod registry;

pub use config::{EngineConfig, LoggingSettings};
pub use engine::Engine;
pub use meshcfg_common::{Error, ResourceData, Result, Schema};
pub use registry::ResourceRegistry;
