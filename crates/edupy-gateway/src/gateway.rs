use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::protocol::{
    Action, ActionPayload, Channel, ConsoleInputPayload, ConsolePayload, ControlRequest, GetPayload,
    InboundEnvelope, ServerMessage, ThreadSelectedPayload,
};

pub type SessionId = u64;

/// Outbound half of one viewer connection. Each item is a serialized envelope.
pub type Outbox = mpsc::UnboundedReceiver<String>;

#[derive(Default)]
struct GatewayState {
    sessions: HashMap<SessionId, mpsc::UnboundedSender<String>>,
    /// Messages published while no viewer was connected, oldest first.
    queue: VecDeque<String>,
    cache: HashMap<Channel, String>,
}

/// Fans published messages out to every connected viewer.
///
/// Keeps the last serialized message per cached channel for `get` replays and
/// holds messages published while offline until the next viewer connects.
/// Session registration, broadcast and queue flushing all happen under one
/// lock, so a connecting viewer can never miss or reorder a message.
pub struct Gateway {
    state: Mutex<GatewayState>,
    next_session: AtomicU64,
    queue_capacity: usize,
}

impl Gateway {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            state: Mutex::new(GatewayState::default()),
            next_session: AtomicU64::new(1),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Registers a viewer and flushes everything queued while offline to it.
    pub fn connect(&self) -> (SessionId, Outbox) {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        let mut state = self.state.lock();
        let flushed = state.queue.len();
        for text in state.queue.drain(..) {
            // The receiver is still in scope, so this cannot fail.
            let _ = tx.send(text);
        }
        state.sessions.insert(id, tx);
        let sessions = state.sessions.len();
        drop(state);

        tracing::info!(target: "edupy.gateway", session = id, flushed, sessions, "viewer connected");
        (id, rx)
    }

    pub fn disconnect(&self, session: SessionId) {
        let mut state = self.state.lock();
        if state.sessions.remove(&session).is_none() {
            return;
        }
        let sessions = state.sessions.len();
        drop(state);

        if sessions == 0 {
            tracing::info!(target: "edupy.gateway", session, "last viewer disconnected; queueing until the next one connects");
        } else {
            tracing::info!(target: "edupy.gateway", session, sessions, "viewer disconnected");
        }
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }

    pub fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Last serialized message published on `channel`, if any.
    pub fn cached(&self, channel: Channel) -> Option<String> {
        self.state.lock().cache.get(&channel).cloned()
    }

    pub fn publish(&self, message: &ServerMessage) -> Result<()> {
        let channel = message.channel();
        let text = serde_json::to_string(message)?;

        let mut state = self.state.lock();
        if channel.is_cached() {
            state.cache.insert(channel, text.clone());
        }

        if state.sessions.is_empty() {
            if state.queue.len() >= self.queue_capacity {
                state.queue.pop_front();
                tracing::warn!(
                    target: "edupy.gateway",
                    %channel,
                    capacity = self.queue_capacity,
                    "offline queue full; dropped the oldest message"
                );
            }
            state.queue.push_back(text);
            return Ok(());
        }

        for (session, tx) in &state.sessions {
            if tx.send(text.clone()).is_err() {
                tracing::warn!(target: "edupy.gateway", session = *session, %channel, "failed to deliver message to viewer");
            }
        }
        Ok(())
    }

    pub fn publish_console(&self, text: impl Into<String>) -> Result<()> {
        self.publish(&ServerMessage::Console(ConsolePayload { text: text.into() }))
    }

    /// Interprets one inbound text frame from `session`.
    ///
    /// `get` is answered here from the cache, to the requesting viewer only.
    /// Everything the controller has to act on is returned. Malformed or
    /// unknown input is logged and dropped.
    pub fn handle_inbound(&self, session: SessionId, text: &str) -> Option<ControlRequest> {
        let envelope: InboundEnvelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(target: "edupy.gateway", session, error = %err, "dropping malformed message");
                return None;
            }
        };

        match envelope.message_type.as_str() {
            "action" => {
                let payload: ActionPayload = parse_payload(session, "action", envelope.payload)?;
                match Action::parse(&payload.command) {
                    Some(action) => Some(ControlRequest::Action(action)),
                    None => {
                        tracing::warn!(target: "edupy.gateway", session, command = %payload.command, "unknown action");
                        None
                    }
                }
            }
            "console_input" => {
                let payload: ConsoleInputPayload =
                    parse_payload(session, "console_input", envelope.payload)?;
                Some(ControlRequest::ConsoleInput(payload.text))
            }
            "thread_selected" => {
                let payload: ThreadSelectedPayload = if envelope.payload.is_null() {
                    ThreadSelectedPayload::default()
                } else {
                    parse_payload(session, "thread_selected", envelope.payload)?
                };
                let name = payload.name.filter(|name| !name.trim().is_empty());
                Some(ControlRequest::ThreadSelected(name))
            }
            "get" => {
                let payload: GetPayload = parse_payload(session, "get", envelope.payload)?;
                self.replay(session, &payload.resource);
                None
            }
            other => {
                tracing::warn!(target: "edupy.gateway", session, message_type = other, "dropping message of unknown type");
                None
            }
        }
    }

    fn replay(&self, session: SessionId, resource: &str) {
        let Some(channel) = Channel::from_resource(resource) else {
            tracing::warn!(target: "edupy.gateway", session, resource, "get for unknown resource");
            return;
        };

        let state = self.state.lock();
        let Some(text) = state.cache.get(&channel) else {
            tracing::debug!(target: "edupy.gateway", session, %channel, "nothing cached yet");
            return;
        };
        match state.sessions.get(&session) {
            Some(tx) => {
                if tx.send(text.clone()).is_err() {
                    tracing::warn!(target: "edupy.gateway", session, %channel, "failed to replay cached message");
                }
            }
            None => {
                tracing::debug!(target: "edupy.gateway", session, %channel, "get from a session that already left");
            }
        }
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(
    session: SessionId,
    message_type: &str,
    payload: serde_json::Value,
) -> Option<T> {
    match serde_json::from_value(payload) {
        Ok(payload) => Some(payload),
        Err(err) => {
            tracing::warn!(target: "edupy.gateway", session, message_type, error = %err, "dropping message with malformed payload");
            None
        }
    }
}
