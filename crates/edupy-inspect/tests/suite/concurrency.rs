use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use edupy_inspect::{
    FrameInfo, Identity, Inspector, MockValueProvider, RemoteValue, Result, ThreadInfo,
    ValueProvider,
};
use serde_json::{json, Map, Value};

use super::support::{scene, settings};

/// Yields to the runtime before every remote read so frame tasks interleave across workers.
struct Sluggish(Arc<MockValueProvider>);

#[async_trait]
impl ValueProvider for Sluggish {
    async fn threads(&self) -> Result<Vec<ThreadInfo>> {
        self.0.threads().await
    }

    async fn frames(&self, thread: &str) -> Result<Vec<FrameInfo>> {
        self.0.frames(thread).await
    }

    async fn frame_values(&self, frame: &FrameInfo) -> Result<Vec<RemoteValue>> {
        tokio::time::sleep(Duration::from_millis(1)).await;
        self.0.frame_values(frame).await
    }

    async fn evaluate(&self, frame: &FrameInfo, expression: &str) -> Result<RemoteValue> {
        tokio::time::sleep(Duration::from_millis(1)).await;
        self.0.evaluate(frame, expression).await
    }
}

fn eight_frames_sharing_a_cycle() -> Value {
    let frames: Vec<Value> = (0..8)
        .map(|index| {
            let mut locals = Map::new();
            locals.insert(format!("head{index}"), json!({ "ref": "1" }));
            json!({ "id": format!("f{index}"), "name": format!("visit{index}"), "locals": locals })
        })
        .collect();
    json!({
        "threads": [{ "name": "MainThread", "state": "SUSPENDED", "frames": frames }],
        "objects": {
            "1": { "type": "Node", "attributes": { "next": { "ref": "2" } } },
            "2": { "type": "Node", "attributes": { "next": { "ref": "3" } } },
            "3": { "type": "Node", "attributes": { "next": { "ref": "1" } } }
        }
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interleaved_frames_expand_each_object_once() {
    let mock = Arc::new(MockValueProvider::new(scene(eight_frames_sharing_a_cycle())));
    let frames = mock.frames("MainThread").await.expect("frames");
    assert_eq!(frames.len(), 8);

    let inspector = Inspector::new(Arc::new(Sluggish(mock.clone())), settings());
    let snapshot = inspector.collect(&frames).await;

    assert!(!snapshot.partial);
    assert_eq!(snapshot.graph.len(), 3);
    for id in ["1", "2", "3"] {
        assert_eq!(mock.dir_calls(&Identity::from(id)), 1, "object {id}");
    }
    for index in 0..8 {
        let name = format!("head{index}");
        assert!(snapshot.variables.by_name(&name).is_some(), "{name}");
    }
}
