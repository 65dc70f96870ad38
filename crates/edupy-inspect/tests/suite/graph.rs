use std::sync::Arc;

use edupy_inspect::{AttributeValue, Identity, MockValueProvider, VariableValue, Visibility};
use serde_json::json;

use super::support::{attribute, collect, scene, settings};

fn linked_nodes() -> serde_json::Value {
    json!({
        "threads": [{
            "name": "MainThread",
            "state": "SUSPENDED",
            "frames": [
                { "id": "f1", "name": "<module>", "locals": { "a": { "ref": "1" } } },
                { "id": "f2", "name": "make", "locals": { "b": { "ref": "2" } } }
            ]
        }],
        "objects": {
            "1": { "type": "Node", "attributes": { "next": { "ref": "2" } } },
            "2": { "type": "Node", "attributes": { "next": { "type": "NoneType", "value": "None" } } }
        }
    })
}

#[tokio::test]
async fn two_frames_produce_a_linked_pair() {
    let provider = Arc::new(MockValueProvider::new(scene(linked_nodes())));
    let snapshot = collect(provider, "MainThread", settings()).await;

    assert!(!snapshot.partial);
    assert_eq!(snapshot.graph.len(), 2);

    let a = snapshot.graph.get(&Identity::from("1")).expect("node a");
    let b = snapshot.graph.get(&Identity::from("2")).expect("node b");
    assert_ne!(a.identity, b.identity);

    assert_eq!(a.attributes.len(), 1);
    assert_eq!(
        attribute(a, "next").value,
        AttributeValue::Reference(Identity::from("2"))
    );
    assert_eq!(b.attributes.len(), 1);
    assert_eq!(
        attribute(b, "next").value,
        AttributeValue::Literal("None".to_owned())
    );

    assert!(b.labels.contains(&"b:Node".to_owned()), "{:?}", b.labels);
    assert!(b.labels.contains(&"next:Node".to_owned()), "{:?}", b.labels);

    let var_a = snapshot.variables.by_name("a").expect("variable a");
    assert_eq!(var_a.value, VariableValue::Object(Identity::from("1")));
}

#[tokio::test]
async fn every_identity_is_expanded_once() {
    let provider = Arc::new(MockValueProvider::new(scene(json!({
        "threads": [{
            "name": "MainThread",
            "state": "SUSPENDED",
            "frames": [
                {
                    "id": "f1",
                    "name": "<module>",
                    "locals": {
                        "shared": { "ref": "9" },
                        "alias": { "ref": "9" },
                        "left": { "ref": "1" },
                        "right": { "ref": "2" }
                    }
                },
                { "id": "f2", "name": "helper", "locals": { "again": { "ref": "9" } } }
            ]
        }],
        "objects": {
            "1": { "type": "Holder", "attributes": { "item": { "ref": "9" }, "twin": { "ref": "9" } } },
            "2": { "type": "Holder", "attributes": { "item": { "ref": "9" } } },
            "9": { "type": "Item", "attributes": { "n": { "type": "int", "value": "5" } } }
        }
    }))));

    let snapshot = collect(provider.clone(), "MainThread", settings()).await;

    assert_eq!(snapshot.graph.len(), 3);
    for id in ["1", "2", "9"] {
        assert_eq!(provider.dir_calls(&Identity::from(id)), 1, "identity {id}");
    }

    let holder = snapshot.graph.get(&Identity::from("1")).unwrap();
    assert_eq!(holder.references().count(), 2);

    let shared = snapshot.variables.get(&Identity::from("9")).unwrap();
    for name in ["shared", "alias", "again"] {
        assert!(shared.names.contains(&name.to_owned()), "{:?}", shared.names);
    }
}

#[tokio::test]
async fn two_cycle_terminates_with_mutual_references() {
    let provider = Arc::new(MockValueProvider::new(scene(json!({
        "threads": [{
            "name": "MainThread",
            "state": "SUSPENDED",
            "frames": [{ "id": "f1", "name": "<module>", "locals": { "a": { "ref": "10" } } }]
        }],
        "objects": {
            "10": { "type": "Peer", "attributes": { "other": { "ref": "20" } } },
            "20": { "type": "Peer", "attributes": { "other": { "ref": "10" } } }
        }
    }))));

    let snapshot = collect(provider.clone(), "MainThread", settings()).await;

    let a = snapshot.graph.get(&Identity::from("10")).unwrap();
    let b = snapshot.graph.get(&Identity::from("20")).unwrap();
    assert_eq!(attribute(a, "other").value.reference(), Some(&b.identity));
    assert_eq!(attribute(b, "other").value.reference(), Some(&a.identity));
    assert_eq!(provider.dir_calls(&Identity::from("10")), 1);
    assert_eq!(provider.dir_calls(&Identity::from("20")), 1);
}

#[tokio::test]
async fn members_are_classified_by_convention_and_class_dict() {
    let provider = Arc::new(MockValueProvider::new(scene(json!({
        "threads": [{
            "name": "MainThread",
            "state": "SUSPENDED",
            "frames": [{ "id": "f1", "name": "<module>", "locals": { "acct": { "ref": "3" } } }]
        }],
        "objects": {
            "3": {
                "type": "Account",
                "attributes": {
                    "_Account__pin": { "type": "int", "value": "1234" },
                    "_owner": { "type": "str", "value": "ada" },
                    "balance": { "type": "int", "value": "10" },
                    "_abc_impl": { "type": "_abc_data", "value": "<_abc._abc_data object at 0x9>" }
                },
                "class_attributes": { "rate": { "type": "float", "value": "0.5" } },
                "methods": ["deposit"]
            }
        }
    }))));

    let snapshot = collect(provider, "MainThread", settings()).await;
    let node = snapshot.graph.get(&Identity::from("3")).unwrap();

    assert_eq!(attribute(node, "__pin").visibility, Visibility::Private);
    assert_eq!(attribute(node, "_owner").visibility, Visibility::Protected);
    assert_eq!(attribute(node, "rate").visibility, Visibility::Static);
    assert_eq!(attribute(node, "balance").visibility, Visibility::Public);

    let names: Vec<&str> = node.attributes.iter().map(|a| a.name.as_str()).collect();
    assert!(!names.contains(&"deposit"), "{names:?}");
    assert!(!names.contains(&"_abc_impl"), "{names:?}");
    assert!(!names.iter().any(|n| n.ends_with("__")), "{names:?}");
}

#[tokio::test]
async fn long_literals_are_cut_to_the_preview_length() {
    let provider = Arc::new(MockValueProvider::new(scene(json!({
        "threads": [{
            "name": "MainThread",
            "state": "SUSPENDED",
            "frames": [{ "id": "f1", "name": "<module>", "locals": { "doc": { "ref": "4" } } }]
        }],
        "objects": {
            "4": {
                "type": "Doc",
                "attributes": { "text": { "type": "str", "value": "abcdefghijklmnopqrstuvwxyz" } }
            }
        }
    }))));

    let snapshot = collect(provider, "MainThread", settings()).await;
    let node = snapshot.graph.get(&Identity::from("4")).unwrap();
    let AttributeValue::Literal(text) = &attribute(node, "text").value else {
        panic!("text should be literal");
    };
    assert_eq!(text, "abcdefghijklmnopqrst [...]");
    assert!(text.chars().count() <= 20 + " [...]".len());
}

#[tokio::test]
async fn node_cap_renders_overflow_as_literals() {
    let provider = Arc::new(MockValueProvider::new(scene(linked_nodes())));
    let mut settings = settings();
    settings.max_nodes = Some(1);

    let frames = vec![edupy_inspect::FrameInfo {
        id: "f1".into(),
        name: "<module>".into(),
        thread: "MainThread".into(),
    }];
    let snapshot = edupy_inspect::Inspector::new(provider, settings)
        .collect(&frames)
        .await;

    assert_eq!(snapshot.graph.len(), 1);
    let a = snapshot.graph.get(&Identity::from("1")).unwrap();
    assert!(matches!(attribute(a, "next").value, AttributeValue::Literal(_)));
}

#[tokio::test]
async fn failed_member_fetch_becomes_a_placeholder() {
    let mut provider = MockValueProvider::new(scene(linked_nodes()));
    provider.fail_expression(
        "a.next",
        edupy_inspect::ProviderError::Evaluation {
            expression: "a.next".into(),
            message: "AttributeError".into(),
        },
    );

    let snapshot = collect(Arc::new(provider), "MainThread", settings()).await;
    let a = snapshot.graph.get(&Identity::from("1")).unwrap();
    assert_eq!(
        attribute(a, "next").value,
        AttributeValue::Literal(edupy_inspect::UNKNOWN_VALUE.to_owned())
    );
    // `b` is still reached through its own frame.
    assert!(snapshot.graph.contains(&Identity::from("2")));
}
