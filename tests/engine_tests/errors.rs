//! Errors surfaced by the engine
//!
//! Errors leave the engine wrapped with the resource they occurred on, and
//! declarations the schema cannot hold never reach the remote.

use serde_json::json;

use meshcfg::ResourceData;
use meshcfg_client::{MockTransport, Response};
use meshcfg_common::{Error, RemoteErrorKind};

use super::helpers::engine;

#[tokio::test]
async fn unknown_resource_type_is_rejected() {
    let engine = engine(MockTransport::new());
    let mut data = ResourceData::default();
    let err = engine.read("acl_polcy", &mut data).await.unwrap_err();
    assert!(matches!(err, Error::UnknownResource(ref t) if t == "acl_polcy"));
}

#[tokio::test]
async fn missing_required_attribute_fails_before_any_call() {
    // no expectations: any remote call panics
    let engine = engine(MockTransport::new());
    let mut data = ResourceData::from_value(json!({"name": "ops"}));
    let err = engine.create("acl_policy", &mut data).await.unwrap_err();
    match err {
        Error::Resource {
            ref resource_type,
            ref name,
            ..
        } => {
            assert_eq!(resource_type, "acl_policy");
            assert_eq!(name, "ops");
        }
        ref other => panic!("expected resource context, got {other:?}"),
    }
    assert!(matches!(err.root(), Error::Decode { .. }));
}

#[tokio::test]
async fn mistyped_attribute_is_a_decode_error() {
    let engine = engine(MockTransport::new());
    let mut data = ResourceData::from_value(json!({"name": "ops", "rules": 7}));
    let err = engine.create("acl_policy", &mut data).await.unwrap_err();
    assert!(matches!(err.root(), Error::Decode { .. }));
}

#[tokio::test]
async fn remote_failures_keep_status_and_body() {
    let mut transport = MockTransport::new();
    transport
        .expect_query()
        .returning(|_, _| Err(Error::remote(500, "rpc error: leader unavailable")));
    let engine = engine(transport);

    let mut data = ResourceData::from_value(json!({"name": "ops", "rules": ""}))
        .with_id("5e1e24e5-1329-f86f-18c6-3d3734edb2cd");
    let err = engine.read("acl_policy", &mut data).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.remote_kind(), Some(RemoteErrorKind::ServerError));
    assert_eq!(err.body(), Some("rpc error: leader unavailable"));
    assert!(err.to_string().contains("acl_policy"));
    assert_eq!(data.id(), Some("5e1e24e5-1329-f86f-18c6-3d3734edb2cd"));
}

#[tokio::test]
async fn occupied_prefix_is_reported_with_its_key_count() {
    let mut transport = MockTransport::new();
    transport.expect_query().returning(|_, _| {
        Ok(Response::json(json!([
            {"Key": "app/a", "Value": null, "Flags": 0},
            {"Key": "app/b", "Value": null, "Flags": 0}
        ])))
    });
    let engine = engine(transport);

    let mut data = ResourceData::from_value(json!({"path_prefix": "app/", "subkeys": {"a": "1"}}));
    let err = engine.create("key_prefix", &mut data).await.unwrap_err();
    assert!(matches!(err.root(), Error::PrefixOccupied { count: 2, .. }));
}

#[tokio::test]
async fn cancelled_engine_stops_issuing_requests() {
    let mut transport = MockTransport::new();
    transport
        .expect_query()
        .returning(|_, _| Ok(Response::json(json!(null))));
    let engine = engine(transport);
    engine.cancel();

    let mut data = ResourceData::from_value(json!({"name": "ops", "rules": ""}))
        .with_id("5e1e24e5-1329-f86f-18c6-3d3734edb2cd");
    let err = engine.read("acl_policy", &mut data).await.unwrap_err();
    assert!(matches!(err.root(), Error::Cancelled));
}
