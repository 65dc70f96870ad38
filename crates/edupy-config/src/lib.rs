//! Configuration for the edupy debugger bridge.
//!
//! Every section is optional in the TOML file; missing keys fall back to the
//! defaults documented on each field. Unknown keys are rejected so typos in a
//! config file surface as load errors instead of being silently ignored.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod logging;
mod validation;

pub use logging::{init_tracing, LogBuffer, LoggingConfig};

/// Environment variable consulted when no `--config` flag is given.
pub const EDUPY_CONFIG_ENV_VAR: &str = "EDUPY_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Toml(value.message().to_owned())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdupyConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub diagram: DiagramConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the WebSocket gateway binds to.
    #[serde(default = "ServerConfig::default_listen")]
    pub listen: SocketAddr,

    /// Route that upgrades to the viewer WebSocket.
    #[serde(default = "ServerConfig::default_ws_path")]
    pub ws_path: String,

    /// Optional directory with the viewer front-end, served at `/`.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,

    /// Messages kept for delivery while no viewer is connected; the oldest are
    /// dropped first once the limit is reached.
    #[serde(default = "ServerConfig::default_offline_queue_len")]
    pub offline_queue_len: usize,
}

impl ServerConfig {
    fn default_listen() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 8025))
    }

    fn default_ws_path() -> String {
        "/websockets/debug".to_owned()
    }

    fn default_offline_queue_len() -> usize {
        256
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: Self::default_listen(),
            ws_path: Self::default_ws_path(),
            static_dir: None,
            offline_queue_len: Self::default_offline_queue_len(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Maximum number of characters kept from a literal attribute rendering.
    #[serde(default = "AnalysisConfig::default_preview_len")]
    pub preview_len: usize,

    /// Marker appended to renderings that were cut at `preview_len`.
    #[serde(default = "AnalysisConfig::default_ellipsis")]
    pub ellipsis: String,

    /// Upper bound on waiting for all frames of one collection pass.
    ///
    /// Frames that have not finished by then are dropped from the snapshot,
    /// which is then marked partial.
    #[serde(default = "AnalysisConfig::default_frame_timeout_ms")]
    pub frame_timeout_ms: u64,

    /// Upper bound on a single remote evaluation.
    #[serde(default = "AnalysisConfig::default_eval_timeout_ms")]
    pub eval_timeout_ms: u64,

    /// Optional cap on the number of expanded objects per pass.
    ///
    /// Unset means the whole reachable structure is expanded; termination is
    /// then guaranteed only by identity de-duplication.
    #[serde(default)]
    pub max_nodes: Option<usize>,
}

impl AnalysisConfig {
    fn default_preview_len() -> usize {
        20
    }

    fn default_ellipsis() -> String {
        " [...]".to_owned()
    }

    fn default_frame_timeout_ms() -> u64 {
        5_000
    }

    fn default_eval_timeout_ms() -> u64 {
        2_000
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn eval_timeout(&self) -> Duration {
        Duration::from_millis(self.eval_timeout_ms)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            preview_len: Self::default_preview_len(),
            ellipsis: Self::default_ellipsis(),
            frame_timeout_ms: Self::default_frame_timeout_ms(),
            eval_timeout_ms: Self::default_eval_timeout_ms(),
            max_nodes: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiagramConfig {
    /// Host (and port) that object-card links point at. The viewer resolves
    /// `<locator_base>/<identity>` to navigate to an object.
    #[serde(default = "DiagramConfig::default_locator_base")]
    pub locator_base: String,

    /// Layout engine requested through `!pragma layout`; empty disables the pragma.
    #[serde(default = "DiagramConfig::default_layout_pragma")]
    pub layout_pragma: String,

    #[serde(default)]
    pub renderer: RendererConfig,
}

impl DiagramConfig {
    fn default_locator_base() -> String {
        "localhost:8026".to_owned()
    }

    fn default_layout_pragma() -> String {
        "smetana".to_owned()
    }
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            locator_base: Self::default_locator_base(),
            layout_pragma: Self::default_layout_pragma(),
            renderer: RendererConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RendererConfig {
    /// Executable that reads diagram markup on stdin and writes an image to stdout.
    #[serde(default = "RendererConfig::default_command")]
    pub command: String,

    #[serde(default = "RendererConfig::default_args")]
    pub args: Vec<String>,

    #[serde(default = "RendererConfig::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl RendererConfig {
    fn default_command() -> String {
        "plantuml".to_owned()
    }

    fn default_args() -> Vec<String> {
        vec!["-tsvg".to_owned(), "-pipe".to_owned()]
    }

    fn default_timeout_ms() -> u64 {
        10_000
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            command: Self::default_command(),
            args: Self::default_args(),
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

impl EdupyConfig {
    /// Load a config file from TOML.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    /// Parse and validate a TOML document.
    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        let config: EdupyConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config from an explicit path, then `EDUPY_CONFIG`, then defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }
        match std::env::var_os(EDUPY_CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => Self::load_from_path(PathBuf::from(path)),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let problems = validation::validate(self);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems.join("; ")))
        }
    }
}
