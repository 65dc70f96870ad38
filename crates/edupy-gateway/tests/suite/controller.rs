use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use edupy_diagram::{FailingRenderer, StaticClassSummaries, StaticRenderer};
use edupy_gateway::protocol::{Action, ControlRequest, ServerMessage, ValueKind};
use edupy_gateway::{
    ControlHandler, DebugSessionController, Gateway, Outbox, PassOutcome, RecordingConsole,
    RecordingExecution,
};
use edupy_inspect::{Inspector, InspectSettings, MockValueProvider};
use serde_json::json;

fn scene() -> serde_json::Value {
    json!({
        "threads": [
            {
                "name": "MainThread",
                "state": "SUSPENDED",
                "frames": [
                    { "id": "f1", "name": "<module>", "locals": { "a": { "ref": "1" } } },
                    {
                        "id": "f2",
                        "name": "make",
                        "locals": {
                            "b": { "ref": "2" },
                            "n": { "type": "int", "value": "3" }
                        }
                    }
                ]
            },
            { "name": "Worker", "state": "RUNNING" }
        ],
        "objects": {
            "1": { "type": "Node", "attributes": { "next": { "ref": "2" } } },
            "2": { "type": "Node", "attributes": { "next": { "type": "NoneType", "value": "None" } } }
        }
    })
}

fn inspector() -> Inspector {
    let provider = MockValueProvider::new(serde_json::from_value(scene()).unwrap());
    Inspector::new(
        Arc::new(provider),
        InspectSettings {
            eval_timeout: Duration::from_millis(200),
            frame_timeout: Duration::from_secs(2),
            ..InspectSettings::default()
        },
    )
}

fn drain(outbox: &mut Outbox) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    while let Ok(text) = outbox.try_recv() {
        messages.push(serde_json::from_str(&text).unwrap());
    }
    messages
}

fn decode(svg_base64: &str) -> String {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(svg_base64)
        .unwrap();
    String::from_utf8(bytes).unwrap()
}

fn channels(messages: &[ServerMessage]) -> Vec<&'static str> {
    messages.iter().map(|m| m.channel().as_str()).collect()
}

#[tokio::test]
async fn pass_publishes_every_channel_in_order() {
    let gateway = Arc::new(Gateway::new(64));
    let (_session, mut outbox) = gateway.connect();
    let controller = DebugSessionController::new(gateway.clone(), inspector(), Arc::new(StaticRenderer));

    let outcome = controller.run_pass(None).await.unwrap();
    assert_eq!(
        outcome,
        PassOutcome::Collected {
            thread: "MainThread".into(),
            frames: 2,
            variables: 3,
            objects: 2,
            partial: false,
        }
    );

    let messages = drain(&mut outbox);
    assert_eq!(
        channels(&messages),
        ["threads", "callstack", "object_cards", "object_diagram", "variables"]
    );

    let ServerMessage::Threads(threads) = &messages[0] else { unreachable!() };
    assert_eq!(threads.threads.len(), 2);
    assert_eq!(threads.threads[1].state, "RUNNING");

    let ServerMessage::Callstack(callstack) = &messages[1] else { unreachable!() };
    assert_eq!(callstack.frames, ["<module>", "make"]);

    let ServerMessage::ObjectCards(cards) = &messages[2] else { unreachable!() };
    let mut ids: Vec<&str> = cards.cards.iter().map(|c| c.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, ["1", "2"]);
    let card_a = cards.cards.iter().find(|c| c.id == "1").unwrap();
    assert!(decode(&card_a.svg_base64).contains("next = 2 [[[localhost:8026/2]]]"));

    let ServerMessage::ObjectDiagram(diagram) = &messages[3] else { unreachable!() };
    assert!(decode(&diagram.svg_base64).contains("o1 --> o2"));

    let ServerMessage::Variables(variables) = &messages[4] else { unreachable!() };
    let a = variables.variables.iter().find(|v| v.names == ["a"]).unwrap();
    assert_eq!(a.id, "1");
    assert_eq!(a.py_type, "Node");
    assert_eq!(a.scope, "local");
    assert_eq!(a.value.kind, ValueKind::Composite);
    assert_eq!(a.value.repr, "next: 2");
    let n = variables.variables.iter().find(|v| v.names == ["n"]).unwrap();
    assert_eq!(n.value.kind, ValueKind::Primitive);
    assert_eq!(n.value.repr, "3");
}

#[tokio::test]
async fn class_diagram_is_published_when_summaries_are_configured() {
    let gateway = Arc::new(Gateway::new(64));
    let (_session, mut outbox) = gateway.connect();
    let classes = StaticClassSummaries::from_json_str(
        r#"[{ "name": "Node", "attributes": [{ "name": "next", "type": "Node" }] }]"#,
    )
    .unwrap();
    let controller = DebugSessionController::new(gateway.clone(), inspector(), Arc::new(StaticRenderer))
        .with_classes(Arc::new(classes));

    controller.run_pass(None).await.unwrap();
    let messages = drain(&mut outbox);
    let Some(ServerMessage::ClassDiagram(diagram)) = messages.last() else {
        panic!("expected a class diagram last, got {:?}", channels(&messages));
    };
    assert!(decode(&diagram.svg_base64).contains("class Node {"));
}

#[tokio::test]
async fn render_failure_skips_only_that_publish() {
    let gateway = Arc::new(Gateway::new(64));
    let (_session, mut outbox) = gateway.connect();
    // Cards are rendered one node at a time; only the combined diagram has an edge.
    let controller = DebugSessionController::new(
        gateway.clone(),
        inspector(),
        Arc::new(FailingRenderer::matching("-->")),
    );

    controller.run_pass(None).await.unwrap();
    let messages = drain(&mut outbox);
    assert_eq!(
        channels(&messages),
        ["threads", "callstack", "object_cards", "variables"]
    );
}

#[tokio::test]
async fn failing_cards_do_not_block_variables() {
    let gateway = Arc::new(Gateway::new(64));
    let (_session, mut outbox) = gateway.connect();
    let controller = DebugSessionController::new(
        gateway.clone(),
        inspector(),
        Arc::new(FailingRenderer::always()),
    );

    controller.run_pass(None).await.unwrap();
    let messages = drain(&mut outbox);
    assert_eq!(channels(&messages), ["threads", "callstack", "variables"]);
}

#[tokio::test]
async fn selecting_a_running_thread_publishes_empty_state() {
    let gateway = Arc::new(Gateway::new(64));
    let (_session, mut outbox) = gateway.connect();
    let controller = DebugSessionController::new(gateway.clone(), inspector(), Arc::new(StaticRenderer));

    controller
        .handle(ControlRequest::ThreadSelected(Some("Worker".into())))
        .await;
    assert_eq!(controller.selected_thread().as_deref(), Some("Worker"));

    let messages = drain(&mut outbox);
    assert_eq!(channels(&messages), ["threads", "variables", "callstack"]);
    let ServerMessage::Variables(variables) = &messages[1] else { unreachable!() };
    assert!(variables.variables.is_empty());
    let ServerMessage::Callstack(callstack) = &messages[2] else { unreachable!() };
    assert!(callstack.frames.is_empty());

    // A frame change keeps the selection.
    let outcome = controller.on_frame_changed().await.unwrap();
    assert_eq!(
        outcome,
        PassOutcome::Idle {
            thread: Some("Worker".into())
        }
    );
}

#[tokio::test]
async fn selecting_a_suspended_thread_runs_a_pass() {
    let gateway = Arc::new(Gateway::new(64));
    let (_session, mut outbox) = gateway.connect();
    let controller = DebugSessionController::new(gateway.clone(), inspector(), Arc::new(StaticRenderer));

    controller
        .handle(ControlRequest::ThreadSelected(Some("MainThread".into())))
        .await;
    let messages = drain(&mut outbox);
    assert!(channels(&messages).contains(&"object_diagram"));
}

#[tokio::test]
async fn actions_and_console_input_reach_their_collaborators() {
    let gateway = Arc::new(Gateway::new(64));
    let execution = Arc::new(RecordingExecution::new());
    let console = Arc::new(RecordingConsole::new());
    let controller = DebugSessionController::new(gateway.clone(), inspector(), Arc::new(StaticRenderer))
        .with_execution(execution.clone())
        .with_console(console.clone());

    controller.handle(ControlRequest::Action(Action::StepInto)).await;
    controller.handle(ControlRequest::Action(Action::Resume)).await;
    controller
        .handle(ControlRequest::ConsoleInput("42".into()))
        .await;

    assert_eq!(execution.actions(), [Action::StepInto, Action::Resume]);
    assert_eq!(console.lines(), ["42"]);
    assert_eq!(gateway.queued(), 0);
}

#[tokio::test]
async fn results_published_offline_are_replayable() {
    let gateway = Arc::new(Gateway::new(64));
    let controller = DebugSessionController::new(gateway.clone(), inspector(), Arc::new(StaticRenderer));
    controller.on_frame_changed().await.unwrap();

    let (session, mut outbox) = gateway.connect();
    let flushed = drain(&mut outbox);
    assert_eq!(flushed.len(), 5);

    gateway.handle_inbound(session, r#"{"type":"get","payload":{"resource":"variables"}}"#);
    let replayed = drain(&mut outbox);
    assert_eq!(replayed, [flushed[4].clone()]);
}
