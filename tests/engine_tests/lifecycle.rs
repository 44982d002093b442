//! Lifecycle calls dispatched through the engine
//!
//! Each test follows one resource through the calls a lifecycle host makes.

use base64::Engine as _;
use serde_json::json;

use meshcfg::ResourceData;
use meshcfg_client::{Method, MockTransport, RequestBody, Response};
use meshcfg_common::Error;

use super::helpers::engine;

// =============================================================================
// Refresh
// =============================================================================

/// A config entry deleted behind the engine's back refreshes to an empty ID
/// so the host plans to create it again
#[tokio::test]
async fn story_config_entry_deleted_out_of_band() {
    let mut transport = MockTransport::new();
    transport
        .expect_query()
        .withf(|path, _| path == "/config/service-defaults/web")
        .times(1)
        .returning(|_, _| Err(Error::remote(404, "Config entry not found for \"service-defaults\" / \"web\"")));
    let engine = engine(transport);

    let mut data = ResourceData::from_value(json!({
        "kind": "service-defaults",
        "name": "web",
        "protocol": "http"
    }))
    .with_id("web");
    engine
        .read("config_entry_service_defaults", &mut data)
        .await
        .unwrap();
    assert_eq!(data.id(), None);
}

/// Declaration that lets each resource type address its remote object on
/// read
fn addressable(resource_type: &str) -> (serde_json::Value, &'static str) {
    let attachment = "a0e8a0b5-6d57-4b5e-8f1e-bd4f9f1fa3a1:global-management";
    match resource_type {
        "config_entry" => (json!({"kind": "service-defaults", "name": "web"}), "web"),
        "config_entry_v2_exported_services" => (json!({"kind": "ExportedServices", "name": "web"}), "web"),
        "keys" => (json!({"key": [{"path": "app/a", "value": "1"}]}), "keys"),
        "key_prefix" => (json!({"path_prefix": "app/", "managed_keys": ["app/a"]}), "app/"),
        "service" => (json!({"name": "web", "node": "n1"}), "web"),
        "acl_role_policy_attachment"
        | "acl_token_policy_attachment"
        | "acl_token_role_attachment"
        | "namespace_policy_attachment"
        | "namespace_role_attachment" => (json!({}), attachment),
        _ => (json!({"name": "web"}), "2b8c2a84-6e3e-4d3b-bb5e-6b0f6d7c9a11"),
    }
}

/// Every resource type treats a missing remote object as gone
#[tokio::test]
async fn story_every_type_reads_missing_as_gone() {
    let mut transport = MockTransport::new();
    transport
        .expect_query()
        .returning(|path, _| Err(Error::remote(404, format!("{path} not found"))));
    let engine = engine(transport);

    let types: Vec<&str> = engine.registry().types().collect();
    for resource_type in types {
        let (declared, id) = addressable(resource_type);
        let mut data = ResourceData::from_value(declared).with_id(id);
        let result = engine.read(resource_type, &mut data).await;
        assert!(result.is_ok(), "{resource_type}: {result:?}");
        assert_eq!(data.id(), None, "{resource_type} kept its ID");
    }
}

// =============================================================================
// Import and plan
// =============================================================================

/// Importing an existing entry and planning the matching declaration yields
/// no changes; changing one attribute yields exactly that change
#[tokio::test]
async fn story_import_then_plan() {
    let mut transport = MockTransport::new();
    transport
        .expect_query()
        .withf(|path, _| path == "/config/service-defaults/web")
        .returning(|_, _| {
            Ok(Response::json(json!({
                "Kind": "service-defaults",
                "Name": "web",
                "Protocol": "http",
                "ModifyIndex": 12
            })))
        });
    let engine = engine(transport);

    let mut state = ResourceData::default();
    engine
        .import("config_entry_service_defaults", "web", &mut state)
        .await
        .unwrap();
    assert_eq!(state.id(), Some("web"));

    let declared = json!({"kind": "service-defaults", "name": "web", "protocol": "http"});
    let unchanged = ResourceData::from_value(declared).with_prior(state.values().clone());
    assert!(engine
        .plan("config_entry_service_defaults", &unchanged)
        .unwrap()
        .is_empty());

    let declared = json!({"kind": "service-defaults", "name": "web", "protocol": "grpc"});
    let changed = ResourceData::from_value(declared).with_prior(state.values().clone());
    let changes: Vec<String> = engine
        .plan("config_entry_service_defaults", &changed)
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(changes, vec!["protocol"]);
}

// =============================================================================
// Key/value
// =============================================================================

/// A declared key is written through the engine and read back
#[tokio::test]
async fn story_keys_round_trip_through_the_engine() {
    let mut transport = MockTransport::new();
    transport
        .expect_write()
        .withf(|method, path, body, _| {
            *method == Method::Put
                && path == "/kv/app/config"
                && *body == RequestBody::Raw(b"{\"debug\":true}".to_vec())
        })
        .times(1)
        .returning(|_, _, _, _| Ok(Response::json(json!(true))));
    transport
        .expect_query()
        .withf(|path, _| path == "/kv/app/config")
        .returning(|_, _| {
            let encoded = base64::engine::general_purpose::STANDARD.encode("{\"debug\":true}");
            Ok(Response::json(json!([{"Key": "app/config", "Value": encoded, "Flags": 0}])))
        });
    let engine = engine(transport);

    let mut data = ResourceData::from_value(json!({
        "key": [{"path": "app/config", "value": "{\"debug\":true}"}]
    }));
    engine.create("keys", &mut data).await.unwrap();
    assert_eq!(data.id(), Some("keys"));
    assert_eq!(data.get_string("datacenter"), "dc1");
}

/// Destroying a resource clears its ID
#[tokio::test]
async fn story_network_area_destroy() {
    let mut transport = MockTransport::new();
    transport
        .expect_delete()
        .withf(|path, _| path == "/operator/area/8f246b77-f3e1-ff88-5b48-8ec93abf3e05")
        .times(1)
        .returning(|_, _| Ok(Response::json(json!(null))));
    let engine = engine(transport);

    let mut data = ResourceData::from_value(json!({"peer_datacenter": "dc2"}))
        .with_id("8f246b77-f3e1-ff88-5b48-8ec93abf3e05");
    engine.delete("network_area", &mut data).await.unwrap();
    assert_eq!(data.id(), None);
}
