use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::gateway::Gateway;

/// Publishes every line read from `output` on the console channel until EOF.
///
/// Returns the number of lines relayed.
pub async fn relay_output<R>(gateway: Arc<Gateway>, output: R) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(output).lines();
    let mut relayed = 0;
    while let Some(line) = lines.next_line().await? {
        if let Err(err) = gateway.publish_console(line) {
            tracing::warn!(target: "edupy.gateway", error = %err, "failed to publish console output");
            continue;
        }
        relayed += 1;
    }
    tracing::debug!(target: "edupy.gateway", relayed, "program output closed");
    Ok(relayed)
}
