//! Shared fixtures

use std::sync::Arc;

use meshcfg::Engine;
use meshcfg_client::{ApiClient, MockTransport};
use meshcfg_resources::Context;

/// Engine over a mocked transport, with the datacenter preset so no agent
/// lookup happens
pub fn engine(transport: MockTransport) -> Engine {
    let api = ApiClient::new(Arc::new(transport)).with_datacenter("dc1");
    Engine::new(Context::new(api))
}
