use std::sync::Arc;
use std::time::Duration;

use edupy_inspect::{Identity, MockValueProvider};
use serde_json::json;

use super::support::{collect, scene, settings};

fn two_frames() -> serde_json::Value {
    json!({
        "threads": [{
            "name": "MainThread",
            "state": "SUSPENDED",
            "frames": [
                { "id": "f1", "name": "<module>", "locals": { "a": { "ref": "1" } } },
                { "id": "f2", "name": "stuck", "locals": { "b": { "ref": "2" } } }
            ]
        }],
        "objects": {
            "1": { "type": "Node", "attributes": { "value": { "type": "int", "value": "1" } } },
            "2": { "type": "Node", "attributes": { "value": { "type": "int", "value": "2" } } }
        }
    })
}

#[tokio::test]
async fn stuck_frame_yields_partial_snapshot() {
    let mut provider = MockValueProvider::new(scene(two_frames()));
    provider.hang_frame("f2");

    let mut settings = settings();
    settings.frame_timeout = Duration::from_millis(300);

    let snapshot = tokio::time::timeout(
        Duration::from_secs(5),
        collect(Arc::new(provider), "MainThread", settings),
    )
    .await
    .expect("barrier must not wait forever");

    assert!(snapshot.partial);
    assert!(snapshot.variables.by_name("a").is_some());
    assert!(snapshot.variables.by_name("b").is_none());
    assert!(snapshot.graph.contains(&Identity::from("1")));
}

#[tokio::test]
async fn wedged_evaluation_times_out_without_stalling_the_pass() {
    let mut provider = MockValueProvider::new(scene(two_frames()));
    provider.hang_expression("dir(a)");

    let mut settings = settings();
    settings.eval_timeout = Duration::from_millis(50);

    let snapshot = collect(Arc::new(provider), "MainThread", settings).await;

    assert!(!snapshot.partial);
    let a = snapshot.graph.get(&Identity::from("1")).expect("node reserved");
    assert!(a.attributes.is_empty());
    let b = snapshot.graph.get(&Identity::from("2")).unwrap();
    assert_eq!(b.attributes.len(), 1);
}

#[tokio::test]
async fn empty_frame_list_is_a_complete_empty_snapshot() {
    let provider = Arc::new(MockValueProvider::new(scene(json!({}))));
    let snapshot = edupy_inspect::Inspector::new(provider, settings())
        .collect(&[])
        .await;
    assert!(!snapshot.partial);
    assert!(snapshot.variables.is_empty());
    assert!(snapshot.graph.is_empty());
}
