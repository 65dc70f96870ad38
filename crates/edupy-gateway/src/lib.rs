//! Publish/subscribe gateway between the debugger bridge and its browser viewers.
//!
//! [`Gateway`] owns viewer sessions, the per-channel cache and the offline
//! queue. [`DebugSessionController`] runs collection passes and publishes
//! their results through it. [`server`] exposes the gateway over WebSockets.

mod controller;
mod error;
mod gateway;
pub mod protocol;
mod relay;
pub mod server;

pub use controller::{
    ConsoleWriter, ControlHandler, DebugSessionController, ExecutionController, PassOutcome,
    RecordingConsole, RecordingExecution, StreamConsole,
};
pub use error::{GatewayError, Result};
pub use gateway::{Gateway, Outbox, SessionId};
pub use relay::relay_output;
