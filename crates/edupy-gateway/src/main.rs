use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use edupy_config::EdupyConfig;
use edupy_diagram::{DiagramSettings, PlantUmlCommand, StaticClassSummaries};
use edupy_gateway::server::{self, AppState};
use edupy_gateway::{
    ConsoleWriter, DebugSessionController, Gateway, RecordingConsole, RecordingExecution,
    StreamConsole,
};
use edupy_inspect::{Inspector, InspectSettings, MockValueProvider, Scene};

/// Live object diagrams for a suspended Python program, served to browser viewers.
#[derive(Debug, Parser)]
#[command(name = "edupy", version, about)]
struct Cli {
    /// Path to a TOML config file.
    ///
    /// If unset, `EDUPY_CONFIG` is used as a fallback. When neither are provided
    /// the gateway uses in-memory defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override `server.listen`.
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// JSON scene replayed through the in-memory value provider.
    #[arg(long)]
    scene: Option<PathBuf>,

    /// JSON class summaries rendered as the class diagram.
    #[arg(long)]
    classes: Option<PathBuf>,

    /// Program whose stdout is relayed to the console channel and whose stdin
    /// receives console input.
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    program: Option<Vec<String>>,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.clone());
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    let logs = edupy_config::init_tracing(&config.logging);

    let provider = match &cli.scene {
        Some(path) => MockValueProvider::from_path(path)
            .with_context(|| format!("failed to load scene {}", path.display()))?,
        None => MockValueProvider::new(Scene::default()),
    };
    let inspector = Inspector::new(Arc::new(provider), InspectSettings::from(&config.analysis));

    let gateway = Arc::new(Gateway::new(config.server.offline_queue_len));
    let renderer = Arc::new(PlantUmlCommand::from_config(&config.diagram.renderer));

    let mut controller = DebugSessionController::new(gateway.clone(), inspector, renderer)
        .with_diagram_settings(DiagramSettings::from(&config.diagram))
        .with_execution(Arc::new(RecordingExecution::new()));
    if let Some(path) = &cli.classes {
        let classes = StaticClassSummaries::from_path(path)
            .with_context(|| format!("failed to load class summaries {}", path.display()))?;
        controller = controller.with_classes(Arc::new(classes));
    }

    let mut child = None;
    let console: Arc<dyn ConsoleWriter> = match &cli.program {
        Some(argv) => {
            let (program, args) = argv.split_first().context("--program needs a command")?;
            let mut spawned = tokio::process::Command::new(program)
                .args(args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .with_context(|| format!("failed to spawn {program}"))?;
            let stdin = spawned.stdin.take().context("program stdin unavailable")?;
            let stdout = spawned.stdout.take().context("program stdout unavailable")?;
            let relay_gateway = gateway.clone();
            tokio::spawn(async move {
                if let Err(err) = edupy_gateway::relay_output(relay_gateway, stdout).await {
                    tracing::warn!(target: "edupy.gateway", error = %err, "program output relay stopped");
                }
            });
            child = Some(spawned);
            Arc::new(StreamConsole::new(stdin))
        }
        None => Arc::new(RecordingConsole::new()),
    };
    let controller = Arc::new(controller.with_console(console));

    if let Err(err) = controller.on_frame_changed().await {
        tracing::error!(target: "edupy.gateway", error = %err, "initial collection pass failed");
    }

    let app = server::router(
        AppState {
            gateway,
            handler: controller,
            logs,
        },
        &config.server.ws_path,
        config.server.static_dir.clone(),
    );
    let listener = tokio::net::TcpListener::bind(config.server.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen))?;

    server::serve(listener, app, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!(target: "edupy.gateway", "shutting down");
    })
    .await?;

    drop(child);
    Ok(())
}

fn load_config(cli_path: Option<PathBuf>) -> EdupyConfig {
    match EdupyConfig::discover(cli_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("edupy: failed to load config: {err}; continuing with defaults");
            EdupyConfig::default()
        }
    }
}
