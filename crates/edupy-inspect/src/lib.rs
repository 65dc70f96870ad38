//! Live object-graph extraction for the edupy debugger bridge.
//!
//! A [`ValueProvider`] exposes the suspended Python runtime. An [`Inspector`]
//! walks the frames of one thread concurrently, resolves each binding's
//! identity and scope into a [`VariableTable`], and expands user-defined
//! instances into an identity-keyed [`ObjectGraph`]. Every identity is
//! expanded at most once, which is what makes cyclic heaps terminate.

pub mod classify;
mod collector;
pub mod expr;
mod graph;
mod mock;
mod model;
mod pass;
mod provider;

pub use graph::UNKNOWN_VALUE;
pub use mock::{MockValueProvider, Scene, SceneError, SceneFrame, SceneObject, SceneThread, SceneValue};
pub use model::{
    AttributeRecord, AttributeValue, FrameInfo, Identity, ObjectGraph, ObjectNode, RemoteValue,
    Scope, Snapshot, ThreadInfo, ThreadState, VariableRecord, VariableTable, VariableValue,
    Visibility,
};
pub use pass::{InspectSettings, Inspector};
pub use provider::{ProviderError, Result, ValueProvider};
