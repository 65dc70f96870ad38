use std::sync::Arc;

use edupy_inspect::{Identity, MockValueProvider, ProviderError, Scope, VariableValue};
use serde_json::json;

use super::support::{collect, scene, settings};

fn scoped_scene() -> serde_json::Value {
    json!({
        "threads": [{
            "name": "MainThread",
            "state": "SUSPENDED",
            "frames": [{
                "id": "f1",
                "name": "compute",
                "locals": {
                    "x": { "type": "int", "value": "5", "identity": "140" },
                    "z": { "type": "str", "value": "'zed'", "identity": "141" }
                },
                "globals": {
                    "LIMIT": { "type": "int", "value": "10", "identity": "142" },
                    "x": { "type": "int", "value": "99", "identity": "143" }
                }
            }]
        }]
    })
}

#[tokio::test]
async fn scope_prefers_local_then_global() {
    let mut provider = MockValueProvider::new(scene(scoped_scene()));
    let unavailable = ProviderError::Unavailable("debugger detached".into());
    provider.fail_expression("locals().get('z', None) is not None", unavailable.clone());
    provider.fail_expression("globals().get('z', None) is not None", unavailable);

    let snapshot = collect(Arc::new(provider), "MainThread", settings()).await;

    // `x` is bound locally and globally; the local binding wins and shadows the global.
    let x = snapshot.variables.by_name("x").unwrap();
    assert_eq!(x.scope, Scope::Local);
    assert_eq!(x.value, VariableValue::Literal("5".into()));
    assert_eq!(snapshot.variables.by_name("LIMIT").unwrap().scope, Scope::Global);
    assert_eq!(snapshot.variables.by_name("z").unwrap().scope, Scope::Unknown);
    assert_eq!(snapshot.variables.len(), 3);
}

#[tokio::test]
async fn shadowed_id_falls_back_to_builtins() {
    let provider = Arc::new(MockValueProvider::new(scene(json!({
        "threads": [{
            "name": "MainThread",
            "state": "SUSPENDED",
            "frames": [{
                "id": "f1",
                "name": "<module>",
                "shadows_id": true,
                "locals": { "item": { "ref": "77" } }
            }]
        }],
        "objects": { "77": { "type": "Item" } }
    }))));

    let snapshot = collect(provider.clone(), "MainThread", settings()).await;

    let item = snapshot.variables.by_name("item").unwrap();
    assert_eq!(item.identity, Identity::from("77"));
    assert_eq!(item.value, VariableValue::Object(Identity::from("77")));
    assert!(provider
        .evaluations()
        .contains(&"__builtins__.id(item)".to_owned()));
}

#[tokio::test]
async fn failed_identity_keeps_the_variable_visible() {
    let mut provider = MockValueProvider::new(scene(scoped_scene()));
    provider.fail_expression(
        "id(LIMIT)",
        ProviderError::Evaluation {
            expression: "id(LIMIT)".into(),
            message: "boom".into(),
        },
    );

    let snapshot = collect(Arc::new(provider), "MainThread", settings()).await;

    let limit = snapshot.variables.by_name("LIMIT").unwrap();
    assert_eq!(limit.value, VariableValue::Literal("10".into()));
    assert_ne!(limit.identity, Identity::from("142"));
    assert_eq!(snapshot.variables.len(), 3);
}

#[tokio::test]
async fn primitive_types_are_never_probed_as_objects() {
    let provider = Arc::new(MockValueProvider::new(scene(scoped_scene())));
    let snapshot = collect(provider.clone(), "MainThread", settings()).await;

    assert!(snapshot.graph.is_empty());
    assert!(!provider
        .evaluations()
        .iter()
        .any(|expression| expression.starts_with("isinstance(")));
}
