use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use edupy_config::RendererConfig;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to spawn renderer `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("renderer i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("renderer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("renderer timed out after {0:?}")]
    Timeout(Duration),
    #[error("renderer produced no output")]
    EmptyOutput,
}

/// Turns diagram markup into a base64-encoded image.
#[async_trait]
pub trait DiagramRenderer: Send + Sync {
    async fn render(&self, markup: &str) -> Result<String, RenderError>;
}

/// Pipes markup through an external command, `plantuml -tsvg -pipe` by default.
#[derive(Clone, Debug)]
pub struct PlantUmlCommand {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl PlantUmlCommand {
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &RendererConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone(), config.timeout())
    }
}

#[async_trait]
impl DiagramRenderer for PlantUmlCommand {
    async fn render(&self, markup: &str) -> Result<String, RenderError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| RenderError::Spawn {
            command: self.command.clone(),
            source,
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("renderer stdin unavailable"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("renderer stdout unavailable"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("renderer stderr unavailable"))?;

        let input = markup.as_bytes().to_vec();
        let stdin_task = tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        });
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).await.map(|_| buf)
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await.map(|_| buf)
        });

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => {
                stdout_task.abort();
                stderr_task.abort();
                return Err(RenderError::Io(err));
            }
            Err(_elapsed) => {
                let _ = child.start_kill();
                let _ = tokio::time::timeout(Duration::from_secs(2), child.wait()).await;
                stdin_task.abort();
                stdout_task.abort();
                stderr_task.abort();
                return Err(RenderError::Timeout(self.timeout));
            }
        };

        if let Ok(Err(err)) = stdin_task.await {
            tracing::debug!(target: "edupy.diagram", error = %err, "renderer closed stdin early");
        }
        let stdout = stdout_task.await.map_err(io::Error::other).and_then(|read| read);
        let stderr = match stderr_task.await.map_err(io::Error::other).and_then(|read| read) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!(target: "edupy.diagram", error = %err, "renderer stderr unreadable");
                Vec::new()
            }
        };

        finish(status, stdout, stderr)
    }
}

/// Judges a finished renderer run. A non-zero exit wins over a broken stdout pipe.
fn finish(
    status: ExitStatus,
    stdout: io::Result<Vec<u8>>,
    stderr: Vec<u8>,
) -> Result<String, RenderError> {
    if !status.success() {
        return Err(RenderError::Failed {
            status: status.to_string(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_owned(),
        });
    }
    let stdout = stdout?;
    if stdout.is_empty() {
        return Err(RenderError::EmptyOutput);
    }

    tracing::trace!(target: "edupy.diagram", bytes = stdout.len(), "rendered diagram");
    Ok(base64::engine::general_purpose::STANDARD.encode(stdout))
}

/// Returns the base64 of the markup itself, so callers can decode and inspect what was rendered.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticRenderer;

#[async_trait]
impl DiagramRenderer for StaticRenderer {
    async fn render(&self, markup: &str) -> Result<String, RenderError> {
        Ok(base64::engine::general_purpose::STANDARD.encode(markup))
    }
}

/// Fails every render whose markup contains `needle`; an empty needle fails everything.
#[derive(Clone, Debug, Default)]
pub struct FailingRenderer {
    needle: String,
}

impl FailingRenderer {
    pub fn always() -> Self {
        Self::default()
    }

    pub fn matching(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
        }
    }
}

#[async_trait]
impl DiagramRenderer for FailingRenderer {
    async fn render(&self, markup: &str) -> Result<String, RenderError> {
        if markup.contains(self.needle.as_str()) {
            Err(RenderError::Failed {
                status: "exit status: 1".to_owned(),
                stderr: "forced failure".to_owned(),
            })
        } else {
            StaticRenderer.render(markup).await
        }
    }
}
