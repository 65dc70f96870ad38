use std::sync::Arc;
use std::time::Duration;

use edupy_inspect::{
    AttributeRecord, FrameInfo, Inspector, InspectSettings, MockValueProvider, ObjectNode, Scene,
    Snapshot, ValueProvider,
};

pub fn scene(value: serde_json::Value) -> Scene {
    serde_json::from_value(value).expect("scene json")
}

pub fn settings() -> InspectSettings {
    InspectSettings {
        eval_timeout: Duration::from_millis(200),
        frame_timeout: Duration::from_secs(2),
        ..InspectSettings::default()
    }
}

/// Collects every frame of `thread` through `provider`.
pub async fn collect(
    provider: Arc<MockValueProvider>,
    thread: &str,
    settings: InspectSettings,
) -> Snapshot {
    let frames: Vec<FrameInfo> = provider.frames(thread).await.expect("frames");
    Inspector::new(provider, settings).collect(&frames).await
}

pub fn attribute<'a>(node: &'a ObjectNode, name: &str) -> &'a AttributeRecord {
    node.attributes
        .iter()
        .find(|attribute| attribute.name == name)
        .unwrap_or_else(|| panic!("no attribute {name} in {node:?}"))
}
