use std::sync::Arc;
use std::time::Duration;

use edupy_config::AnalysisConfig;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::model::{FrameInfo, Identity, ObjectGraph, ObjectNode, RemoteValue, Snapshot, VariableTable};
use crate::provider::{ProviderError, Result, ValueProvider};

/// Tunables for one collection pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InspectSettings {
    pub preview_len: usize,
    pub ellipsis: String,
    pub eval_timeout: Duration,
    pub frame_timeout: Duration,
    pub max_nodes: Option<usize>,
}

impl Default for InspectSettings {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

impl From<&AnalysisConfig> for InspectSettings {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            preview_len: config.preview_len,
            ellipsis: config.ellipsis.clone(),
            eval_timeout: config.eval_timeout(),
            frame_timeout: config.frame_timeout(),
            max_nodes: config.max_nodes,
        }
    }
}

/// Runs the Variable Collector and the Object Graph Builder over a set of frames.
#[derive(Clone)]
pub struct Inspector {
    provider: Arc<dyn ValueProvider>,
    settings: Arc<InspectSettings>,
}

impl Inspector {
    pub fn new(provider: Arc<dyn ValueProvider>, settings: InspectSettings) -> Self {
        Self {
            provider,
            settings: Arc::new(settings),
        }
    }

    pub fn provider(&self) -> &Arc<dyn ValueProvider> {
        &self.provider
    }

    pub fn settings(&self) -> &InspectSettings {
        &self.settings
    }

    /// Collects every frame concurrently and joins them behind a bounded barrier.
    ///
    /// Frames still running at the deadline are aborted and the snapshot is
    /// flagged partial; whatever they recorded so far is kept.
    pub async fn collect(&self, frames: &[FrameInfo]) -> Snapshot {
        let ctx = Arc::new(PassContext {
            provider: self.provider.clone(),
            settings: self.settings.clone(),
            variables: Mutex::new(VariableTable::new()),
            nodes: Mutex::new(IndexMap::new()),
        });

        let mut tasks = JoinSet::new();
        for frame in frames {
            let ctx = ctx.clone();
            let frame = frame.clone();
            tasks.spawn(async move { ctx.collect_frame(&frame).await });
        }

        let deadline = Instant::now() + self.settings.frame_timeout;
        let mut partial = false;
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok(()))) => {}
                Ok(Some(Err(err))) => {
                    tracing::error!(target: "edupy.inspect", error = %err, "frame collection task failed");
                    partial = true;
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        target: "edupy.inspect",
                        pending = tasks.len(),
                        timeout_ms = self.settings.frame_timeout.as_millis() as u64,
                        "frames did not finish before the deadline; snapshot is partial"
                    );
                    partial = true;
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    break;
                }
            }
        }

        let variables = std::mem::take(&mut *ctx.variables.lock());
        let nodes = std::mem::take(&mut *ctx.nodes.lock());
        tracing::debug!(
            target: "edupy.inspect",
            frames = frames.len(),
            variables = variables.len(),
            objects = nodes.len(),
            partial,
            "collection pass finished"
        );

        Snapshot {
            variables,
            graph: ObjectGraph::from_nodes(nodes),
            partial,
        }
    }
}

/// State shared by the frame tasks of one pass.
pub(crate) struct PassContext {
    pub(crate) provider: Arc<dyn ValueProvider>,
    pub(crate) settings: Arc<InspectSettings>,
    pub(crate) variables: Mutex<VariableTable>,
    pub(crate) nodes: Mutex<IndexMap<Identity, ObjectNode>>,
}

impl PassContext {
    pub(crate) async fn evaluate(&self, frame: &FrameInfo, expression: &str) -> Result<RemoteValue> {
        match tokio::time::timeout(
            self.settings.eval_timeout,
            self.provider.evaluate(frame, expression),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                expression: expression.to_owned(),
            }),
        }
    }

    /// Evaluation whose failure is recovered by the caller with a placeholder.
    pub(crate) async fn evaluate_or_warn(
        &self,
        frame: &FrameInfo,
        expression: &str,
    ) -> Option<RemoteValue> {
        match self.evaluate(frame, expression).await {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(
                    target: "edupy.inspect",
                    frame = %frame.id,
                    expression,
                    error = %err,
                    "remote evaluation failed"
                );
                None
            }
        }
    }

    /// Evaluates a Python predicate; failures count as `False`.
    pub(crate) async fn predicate(&self, frame: &FrameInfo, expression: &str) -> bool {
        self.evaluate_or_warn(frame, expression)
            .await
            .is_some_and(|value| value.is_true())
    }
}
