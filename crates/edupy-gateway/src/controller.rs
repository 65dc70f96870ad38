use std::sync::Arc;

use async_trait::async_trait;
use edupy_diagram::{
    class_diagram, object_cards, object_diagram, ClassSummarizer, DiagramRenderer, DiagramSettings,
};
use edupy_inspect::classify::truncate_preview;
use edupy_inspect::{
    AttributeValue, FrameInfo, Inspector, ObjectGraph, ProviderError, ThreadInfo, VariableTable,
    VariableValue,
};
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::gateway::Gateway;
use crate::protocol::{
    Action, CallstackPayload, CardDto, ControlRequest, DiagramPayload, ObjectCardsPayload,
    ServerMessage, ThreadDto, ThreadsPayload, ValueDto, ValueKind, VariableDto, VariablesPayload,
};

/// Resumes, pauses and steps the debugged program.
#[async_trait]
pub trait ExecutionController: Send + Sync {
    async fn execute(&self, action: Action) -> Result<(), ProviderError>;
}

/// Writes lines to the debugged program's stdin.
#[async_trait]
pub trait ConsoleWriter: Send + Sync {
    async fn write_line(&self, text: &str) -> std::io::Result<()>;
}

/// Consumer of the requests viewers send.
#[async_trait]
pub trait ControlHandler: Send + Sync {
    async fn handle(&self, request: ControlRequest);
}

/// [`ConsoleWriter`] over any async byte sink.
pub struct StreamConsole<W> {
    inner: tokio::sync::Mutex<W>,
}

impl<W> StreamConsole<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: tokio::sync::Mutex::new(inner),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ConsoleWriter for StreamConsole<W> {
    async fn write_line(&self, text: &str) -> std::io::Result<()> {
        let mut inner = self.inner.lock().await;
        inner.write_all(text.as_bytes()).await?;
        inner.write_all(b"\n").await?;
        inner.flush().await
    }
}

/// Records every action instead of forwarding it; used when no live debugger is attached.
#[derive(Default)]
pub struct RecordingExecution {
    actions: Mutex<Vec<Action>>,
}

impl RecordingExecution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().clone()
    }
}

#[async_trait]
impl ExecutionController for RecordingExecution {
    async fn execute(&self, action: Action) -> Result<(), ProviderError> {
        tracing::info!(target: "edupy.gateway", action = action.as_str(), "execution action");
        self.actions.lock().push(action);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingConsole {
    lines: Mutex<Vec<String>>,
}

impl RecordingConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

#[async_trait]
impl ConsoleWriter for RecordingConsole {
    async fn write_line(&self, text: &str) -> std::io::Result<()> {
        self.lines.lock().push(text.to_owned());
        Ok(())
    }
}

/// What one collection pass ended up doing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PassOutcome {
    /// A suspended thread was inspected.
    Collected {
        thread: String,
        frames: usize,
        variables: usize,
        objects: usize,
        partial: bool,
    },
    /// No suspended thread to inspect; empty variables and callstack were published.
    Idle { thread: Option<String> },
}

/// Drives collection passes for one debug session and publishes their results.
pub struct DebugSessionController {
    gateway: Arc<Gateway>,
    inspector: Inspector,
    renderer: Arc<dyn DiagramRenderer>,
    diagram: DiagramSettings,
    classes: Option<Arc<dyn ClassSummarizer>>,
    execution: Arc<dyn ExecutionController>,
    console: Arc<dyn ConsoleWriter>,
    selected: Mutex<Option<String>>,
    pass_lock: tokio::sync::Mutex<()>,
}

impl DebugSessionController {
    pub fn new(
        gateway: Arc<Gateway>,
        inspector: Inspector,
        renderer: Arc<dyn DiagramRenderer>,
    ) -> Self {
        Self {
            gateway,
            inspector,
            renderer,
            diagram: DiagramSettings::default(),
            classes: None,
            execution: Arc::new(RecordingExecution::new()),
            console: Arc::new(RecordingConsole::new()),
            selected: Mutex::new(None),
            pass_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_diagram_settings(mut self, diagram: DiagramSettings) -> Self {
        self.diagram = diagram;
        self
    }

    pub fn with_classes(mut self, classes: Arc<dyn ClassSummarizer>) -> Self {
        self.classes = Some(classes);
        self
    }

    pub fn with_execution(mut self, execution: Arc<dyn ExecutionController>) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_console(mut self, console: Arc<dyn ConsoleWriter>) -> Self {
        self.console = console;
        self
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    pub fn selected_thread(&self) -> Option<String> {
        self.selected.lock().clone()
    }

    /// The debugger reported a new current frame; refresh everything for the current selection.
    pub async fn on_frame_changed(&self) -> Result<PassOutcome> {
        let selected = self.selected_thread();
        self.run_pass(selected.as_deref()).await
    }

    pub async fn run_pass(&self, selected: Option<&str>) -> Result<PassOutcome> {
        let _pass = self.pass_lock.lock().await;
        let provider = self.inspector.provider().clone();

        let threads = provider.threads().await?;
        self.gateway
            .publish(&ServerMessage::Threads(threads_payload(&threads)))?;

        let thread = match selected {
            Some(name) => threads.iter().find(|t| t.name == name),
            None => threads.iter().find(|t| t.is_suspended()),
        };
        let thread = match thread {
            Some(thread) if thread.is_suspended() => thread,
            _ => {
                tracing::debug!(target: "edupy.gateway", thread = ?selected, "no suspended thread to inspect");
                self.publish_empty()?;
                return Ok(PassOutcome::Idle {
                    thread: selected.map(str::to_owned),
                });
            }
        };

        let frames = provider.frames(&thread.name).await?;
        self.gateway
            .publish(&ServerMessage::Callstack(callstack_payload(&frames)))?;

        let snapshot = self.inspector.collect(&frames).await;

        self.publish_object_cards(&snapshot.graph).await?;
        let markup = object_diagram(&snapshot.graph, &self.diagram);
        match self.renderer.render(&markup).await {
            Ok(svg_base64) => self
                .gateway
                .publish(&ServerMessage::ObjectDiagram(DiagramPayload { svg_base64 }))?,
            Err(err) => {
                tracing::error!(target: "edupy.gateway", error = %err, "failed to render object diagram");
            }
        }

        let settings = self.inspector.settings();
        self.gateway.publish(&ServerMessage::Variables(variables_payload(
            &snapshot.variables,
            &snapshot.graph,
            settings.preview_len,
            &settings.ellipsis,
        )))?;

        if let Some(classes) = &self.classes {
            let markup = class_diagram(&classes.summaries(), &self.diagram);
            match self.renderer.render(&markup).await {
                Ok(svg_base64) => self
                    .gateway
                    .publish(&ServerMessage::ClassDiagram(DiagramPayload { svg_base64 }))?,
                Err(err) => {
                    tracing::error!(target: "edupy.gateway", error = %err, "failed to render class diagram");
                }
            }
        }

        tracing::info!(
            target: "edupy.gateway",
            thread = %thread.name,
            frames = frames.len(),
            variables = snapshot.variables.len(),
            objects = snapshot.graph.len(),
            partial = snapshot.partial,
            "collection pass published"
        );
        Ok(PassOutcome::Collected {
            thread: thread.name.clone(),
            frames: frames.len(),
            variables: snapshot.variables.len(),
            objects: snapshot.graph.len(),
            partial: snapshot.partial,
        })
    }

    async fn publish_object_cards(&self, graph: &ObjectGraph) -> Result<()> {
        let cards = object_cards(graph, &self.diagram);
        let rendered = join_all(cards.iter().map(|(identity, markup)| async move {
            self.renderer
                .render(markup)
                .await
                .map(|svg_base64| CardDto {
                    id: identity.to_string(),
                    svg_base64,
                })
        }))
        .await;

        let mut dtos = Vec::with_capacity(rendered.len());
        for card in rendered {
            match card {
                Ok(card) => dtos.push(card),
                Err(err) => {
                    tracing::error!(target: "edupy.gateway", error = %err, "failed to render object card");
                    return Ok(());
                }
            }
        }
        self.gateway
            .publish(&ServerMessage::ObjectCards(ObjectCardsPayload { cards: dtos }))
    }

    fn publish_empty(&self) -> Result<()> {
        self.gateway
            .publish(&ServerMessage::Variables(VariablesPayload::default()))?;
        self.gateway
            .publish(&ServerMessage::Callstack(CallstackPayload::default()))
    }
}

#[async_trait]
impl ControlHandler for DebugSessionController {
    async fn handle(&self, request: ControlRequest) {
        match request {
            ControlRequest::Action(action) => {
                if let Err(err) = self.execution.execute(action).await {
                    tracing::error!(target: "edupy.gateway", action = action.as_str(), error = %err, "execution action failed");
                }
            }
            ControlRequest::ConsoleInput(text) => {
                if let Err(err) = self.console.write_line(&text).await {
                    tracing::error!(target: "edupy.gateway", error = %err, "failed to write console input");
                }
            }
            ControlRequest::ThreadSelected(name) => {
                *self.selected.lock() = name.clone();
                if let Err(err) = self.run_pass(name.as_deref()).await {
                    tracing::error!(target: "edupy.gateway", thread = ?name, error = %err, "collection pass failed");
                }
            }
        }
    }
}

fn threads_payload(threads: &[ThreadInfo]) -> ThreadsPayload {
    ThreadsPayload {
        threads: threads
            .iter()
            .map(|thread| ThreadDto {
                name: thread.name.clone(),
                state: thread.state.as_str().to_owned(),
            })
            .collect(),
    }
}

fn callstack_payload(frames: &[FrameInfo]) -> CallstackPayload {
    CallstackPayload {
        frames: frames.iter().map(|frame| frame.name.clone()).collect(),
    }
}

fn variables_payload(
    variables: &VariableTable,
    graph: &ObjectGraph,
    preview_len: usize,
    ellipsis: &str,
) -> VariablesPayload {
    let variables = variables
        .records()
        .map(|record| {
            let value = match &record.value {
                VariableValue::Literal(text) => ValueDto {
                    kind: ValueKind::Primitive,
                    repr: truncate_preview(text, preview_len, ellipsis),
                },
                VariableValue::Object(identity) => match graph.get(identity) {
                    Some(node) => ValueDto {
                        kind: ValueKind::Composite,
                        repr: node
                            .attributes
                            .iter()
                            .map(|attribute| {
                                let value = match &attribute.value {
                                    AttributeValue::Literal(text) => {
                                        truncate_preview(text, preview_len, ellipsis)
                                    }
                                    // Identities are keys; a cut one names a different object.
                                    AttributeValue::Reference(target) => target.to_string(),
                                };
                                format!("{}: {value}", attribute.name)
                            })
                            .collect::<Vec<_>>()
                            .join("\n"),
                    },
                    None => ValueDto {
                        kind: ValueKind::Ref,
                        repr: identity.to_string(),
                    },
                },
            };
            VariableDto {
                id: record.identity.to_string(),
                names: record.names.clone(),
                py_type: record.type_name.clone(),
                scope: record.scope.as_str().to_owned(),
                value,
            }
        })
        .collect();
    VariablesPayload { variables }
}
