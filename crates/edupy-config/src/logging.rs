use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Once, OnceLock};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// A bare level (`debug`) or any `EnvFilter` directive list
    /// (`info,edupy.inspect=trace`). `RUST_LOG` is appended when set.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,

    /// Also write to stderr. The in-memory ring is always fed.
    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,

    /// Append to this file. An unopenable file disables only this sink.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Capacity of the in-memory ring of recent lines.
    #[serde(default = "LoggingConfig::default_buffer_lines")]
    pub buffer_lines: usize,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    fn default_buffer_lines() -> usize {
        2_000
    }

    /// Maps level spellings onto `EnvFilter` syntax; anything else is passed through.
    pub(crate) fn directives(&self) -> String {
        let level = self.level.trim();
        match level.to_ascii_lowercase().as_str() {
            "" => Self::default_level(),
            "warning" => "warn".to_owned(),
            lower @ ("trace" | "debug" | "info" | "warn" | "error" | "off") => lower.to_owned(),
            _ => level.to_owned(),
        }
    }

    /// Effective filter: configured directives followed by `RUST_LOG`.
    pub fn env_filter(&self) -> EnvFilter {
        let configured = self.directives();
        let from_env = std::env::var("RUST_LOG")
            .ok()
            .filter(|value| !value.trim().is_empty());

        let candidates = match from_env {
            Some(env) => vec![format!("{configured},{}", env.trim()), configured],
            None => vec![configured],
        };
        candidates
            .into_iter()
            .find_map(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| EnvFilter::default().add_directive(LevelFilter::INFO.into()))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
            file: None,
            buffer_lines: Self::default_buffer_lines(),
        }
    }
}

/// The most recent formatted log lines, oldest first.
#[derive(Debug)]
pub struct LogBuffer {
    capacity: usize,
    lines: Mutex<VecDeque<String>>,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(1_024))),
        }
    }

    pub fn push_line(&self, line: String) {
        let mut lines = self.lines.lock();
        while lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Up to `n` of the newest lines, oldest first.
    pub fn last_lines(&self, n: usize) -> Vec<String> {
        let lines = self.lines.lock();
        let skip = lines.len().saturating_sub(n);
        lines.iter().skip(skip).cloned().collect()
    }

    fn absorb(&self, bytes: &[u8]) {
        for line in String::from_utf8_lossy(bytes).lines() {
            if !line.is_empty() {
                self.push_line(line.to_owned());
            }
        }
    }
}

/// Hands every formatted event to the ring and to the configured sinks.
#[derive(Clone)]
struct FanOut {
    ring: Arc<LogBuffer>,
    stderr: bool,
    file: Option<Arc<Mutex<File>>>,
}

impl<'a> MakeWriter<'a> for FanOut {
    type Writer = EventWriter;

    fn make_writer(&'a self) -> Self::Writer {
        EventWriter {
            sinks: self.clone(),
            event: Vec::with_capacity(256),
        }
    }
}

/// Buffers one event and delivers it whole on drop, so sinks never interleave partial lines.
struct EventWriter {
    sinks: FanOut,
    event: Vec<u8>,
}

impl Write for EventWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.event.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for EventWriter {
    fn drop(&mut self) {
        if self.event.is_empty() {
            return;
        }
        self.sinks.ring.absorb(&self.event);
        if self.sinks.stderr {
            if cfg!(test) {
                // libtest only captures output sent through the print macros.
                eprint!("{}", String::from_utf8_lossy(&self.event));
            } else {
                let _ = io::stderr().lock().write_all(&self.event);
            }
        }
        if let Some(file) = &self.sinks.file {
            let _ = file.lock().write_all(&self.event);
        }
    }
}

static TRACING_INIT: Once = Once::new();
static GLOBAL_LOG_BUFFER: OnceLock<Arc<LogBuffer>> = OnceLock::new();

/// Installs the global `tracing` subscriber on first call and returns the log ring.
///
/// Later calls leave the installed subscriber alone.
pub fn init_tracing(config: &LoggingConfig) -> Arc<LogBuffer> {
    let ring = GLOBAL_LOG_BUFFER
        .get_or_init(|| Arc::new(LogBuffer::new(config.buffer_lines)))
        .clone();

    TRACING_INIT.call_once(|| {
        let file = match &config.file {
            Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => Some(Arc::new(Mutex::new(file))),
                Err(err) => {
                    eprintln!("edupy: cannot open log file {}: {err}", path.display());
                    None
                }
            },
            None => None,
        };
        let sinks = FanOut {
            ring: ring.clone(),
            stderr: config.stderr,
            file,
        };

        let fmt = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(sinks);
        let fmt: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if config.json {
            fmt.json().boxed()
        } else {
            fmt.boxed()
        };

        let installed = tracing_subscriber::registry()
            .with(config.env_filter())
            .with(fmt)
            .try_init();
        if installed.is_err() {
            eprintln!("edupy: a tracing subscriber is already installed; keeping it");
        }
    });

    ring
}
