use async_trait::async_trait;
use thiserror::Error;

use crate::model::{FrameInfo, RemoteValue, ThreadInfo};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("evaluation of `{expression}` failed: {message}")]
    Evaluation { expression: String, message: String },
    #[error("evaluation of `{expression}` timed out")]
    Timeout { expression: String },
    #[error("unknown frame {0}")]
    UnknownFrame(String),
    #[error("unknown thread {0}")]
    UnknownThread(String),
    #[error("value provider unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T, E = ProviderError> = std::result::Result<T, E>;

/// Read-only view of the inspected runtime.
///
/// Implementations answer enumeration requests and evaluate side-effect-free
/// expressions in the context of a frame. Calls for different frames may be
/// issued concurrently.
#[async_trait]
pub trait ValueProvider: Send + Sync {
    async fn threads(&self) -> Result<Vec<ThreadInfo>>;

    /// Frames of `thread`, innermost last.
    async fn frames(&self, thread: &str) -> Result<Vec<FrameInfo>>;

    /// Every named value visible in `frame`.
    async fn frame_values(&self, frame: &FrameInfo) -> Result<Vec<RemoteValue>>;

    async fn evaluate(&self, frame: &FrameInfo, expression: &str) -> Result<RemoteValue>;
}
