//! Building an engine from host configuration

use serde_json::json;

use meshcfg::{Engine, EngineConfig};
use meshcfg_common::Error;

#[test]
fn configure_builds_an_engine_with_every_handler() {
    let config = EngineConfig::from_value(json!({
        "address": "http://127.0.0.1:8500",
        "datacenter": "dc1",
        "external_source": "meshcfg"
    }))
    .unwrap();
    let engine = Engine::configure(config).unwrap();
    assert_eq!(engine.context().settings.external_source, "meshcfg");
    assert!(engine.registry().types().any(|t| t == "acl_policy"));
    assert!(engine.registry().types().any(|t| t == "peering_token"));
}

#[test]
fn configure_rejects_insecure_https_over_http() {
    let config = EngineConfig::from_value(json!({
        "address": "http://127.0.0.1:8500",
        "insecure_https": true
    }))
    .unwrap();
    let err = Engine::configure(config).err().unwrap();
    assert!(matches!(err, Error::ConfigInvalid { .. }));
}
