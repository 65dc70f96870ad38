//! JSON wire format between the gateway and its viewers.
//!
//! Every message is an envelope `{"type": ..., "payload": ...}`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named logical stream of one message type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    ClassDiagram,
    ObjectCards,
    ObjectDiagram,
    Variables,
    Callstack,
    Threads,
    Console,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::ClassDiagram => "class_diagram",
            Channel::ObjectCards => "object_cards",
            Channel::ObjectDiagram => "object_diagram",
            Channel::Variables => "variables",
            Channel::Callstack => "callstack",
            Channel::Threads => "threads",
            Channel::Console => "console",
        }
    }

    /// Resolves a `get` resource name. The short `cd`/`oc`/`od` forms are accepted too.
    pub fn from_resource(resource: &str) -> Option<Self> {
        match resource.trim() {
            "class_diagram" | "cd" => Some(Channel::ClassDiagram),
            "object_cards" | "oc" => Some(Channel::ObjectCards),
            "object_diagram" | "od" => Some(Channel::ObjectDiagram),
            "variables" => Some(Channel::Variables),
            "callstack" => Some(Channel::Callstack),
            "threads" => Some(Channel::Threads),
            "console" => Some(Channel::Console),
            _ => None,
        }
    }

    /// Console output is a stream, not state; it has no last value to replay.
    pub fn is_cached(self) -> bool {
        self != Channel::Console
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramPayload {
    pub svg_base64: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDto {
    pub id: String,
    pub svg_base64: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectCardsPayload {
    pub cards: Vec<CardDto>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Primitive,
    Ref,
    Composite,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueDto {
    pub kind: ValueKind,
    pub repr: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDto {
    pub id: String,
    pub names: Vec<String>,
    pub py_type: String,
    pub scope: String,
    pub value: ValueDto,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariablesPayload {
    pub variables: Vec<VariableDto>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallstackPayload {
    pub frames: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadDto {
    pub name: String,
    pub state: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadsPayload {
    pub threads: Vec<ThreadDto>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolePayload {
    pub text: String,
}

/// Server-to-viewer message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    ClassDiagram(DiagramPayload),
    ObjectCards(ObjectCardsPayload),
    ObjectDiagram(DiagramPayload),
    Variables(VariablesPayload),
    Callstack(CallstackPayload),
    Threads(ThreadsPayload),
    Console(ConsolePayload),
}

impl ServerMessage {
    pub fn channel(&self) -> Channel {
        match self {
            ServerMessage::ClassDiagram(_) => Channel::ClassDiagram,
            ServerMessage::ObjectCards(_) => Channel::ObjectCards,
            ServerMessage::ObjectDiagram(_) => Channel::ObjectDiagram,
            ServerMessage::Variables(_) => Channel::Variables,
            ServerMessage::Callstack(_) => Channel::Callstack,
            ServerMessage::Threads(_) => Channel::Threads,
            ServerMessage::Console(_) => Channel::Console,
        }
    }
}

/// Viewer-to-server envelope before its payload is interpreted.
#[derive(Clone, Debug, Deserialize)]
pub struct InboundEnvelope {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ActionPayload {
    pub command: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ConsoleInputPayload {
    pub text: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ThreadSelectedPayload {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GetPayload {
    pub resource: String,
}

/// Execution-control commands a viewer can issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Resume,
    Pause,
    StepOver,
    StepInto,
    StepOut,
}

impl Action {
    pub fn parse(command: &str) -> Option<Self> {
        match command.trim() {
            "resume" => Some(Action::Resume),
            "pause" => Some(Action::Pause),
            "step-over" => Some(Action::StepOver),
            "step-into" => Some(Action::StepInto),
            "step-out" => Some(Action::StepOut),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Resume => "resume",
            Action::Pause => "pause",
            Action::StepOver => "step-over",
            Action::StepInto => "step-into",
            Action::StepOut => "step-out",
        }
    }
}

/// Inbound message the gateway hands to the session controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlRequest {
    Action(Action),
    ConsoleInput(String),
    /// `None` clears the selection.
    ThreadSelected(Option<String>),
}
