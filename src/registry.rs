//! Lookup table from resource type name to handler

use std::collections::BTreeMap;

use meshcfg_common::{Error, Result, Schema};
use meshcfg_resources::Resource;

/// Every handler the engine dispatches to, keyed by type name
pub struct ResourceRegistry {
    handlers: BTreeMap<&'static str, Box<dyn Resource>>,
}

impl ResourceRegistry {
    /// Registry holding every built-in handler
    pub fn new() -> Self {
        Self::from_handlers(meshcfg_resources::all())
    }

    /// Registry holding the given handlers
    ///
    /// A later handler with the same type name replaces an earlier one.
    pub fn from_handlers(handlers: impl IntoIterator<Item = Box<dyn Resource>>) -> Self {
        Self {
            handlers: handlers
                .into_iter()
                .map(|h| (h.type_name(), h))
                .collect(),
        }
    }

    /// Handler for a resource type
    pub fn get(&self, resource_type: &str) -> Result<&dyn Resource> {
        self.handlers
            .get(resource_type)
            .map(|h| h.as_ref())
            .ok_or_else(|| Error::UnknownResource(resource_type.to_string()))
    }

    /// Every registered type name, sorted
    pub fn types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    /// Schema of a resource type
    pub fn schema(&self, resource_type: &str) -> Result<&Schema> {
        self.get(resource_type).map(|h| h.schema())
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
