use crate::EdupyConfig;

/// Semantic checks that serde cannot express. Returns one message per problem.
pub(crate) fn validate(config: &EdupyConfig) -> Vec<String> {
    let mut problems = Vec::new();

    let ws_path = config.server.ws_path.trim();
    if ws_path.is_empty() || !ws_path.starts_with('/') {
        problems.push(format!(
            "server.ws_path must start with '/', got {:?}",
            config.server.ws_path
        ));
    }

    if config.server.offline_queue_len == 0 {
        problems.push("server.offline_queue_len must be at least 1".to_owned());
    }

    if config.analysis.preview_len == 0 {
        problems.push("analysis.preview_len must be at least 1".to_owned());
    }
    if config.analysis.frame_timeout_ms == 0 {
        problems.push("analysis.frame_timeout_ms must be at least 1".to_owned());
    }
    if config.analysis.eval_timeout_ms == 0 {
        problems.push("analysis.eval_timeout_ms must be at least 1".to_owned());
    }
    if config.analysis.max_nodes == Some(0) {
        problems.push("analysis.max_nodes must be at least 1 when set".to_owned());
    }

    if config.diagram.renderer.command.trim().is_empty() {
        problems.push("diagram.renderer.command must not be empty".to_owned());
    }
    if config.diagram.renderer.timeout_ms == 0 {
        problems.push("diagram.renderer.timeout_ms must be at least 1".to_owned());
    }

    if config.logging.buffer_lines == 0 {
        problems.push("logging.buffer_lines must be at least 1".to_owned());
    }

    problems
}
