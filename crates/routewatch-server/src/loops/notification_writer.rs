//! Writes notifications as JSON lines.

use anyhow::Result;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use routewatch_core::Notification;

/// Write every notification to `out`, one JSON object per line, until all
/// senders are gone. Returns the number of lines written.
pub async fn run_notification_writer<W: AsyncWrite + Unpin>(
    mut notifications: mpsc::UnboundedReceiver<Notification>,
    mut out: W,
) -> Result<u64> {
    let mut written = 0;

    while let Some(notification) = notifications.recv().await {
        let mut line = serde_json::to_vec(&notification)?;
        line.push(b'\n');
        out.write_all(&line).await?;
        written += 1;

        // Flush once the queue is momentarily empty rather than per line.
        if notifications.is_empty() {
            out.flush().await?;
        }
    }
    out.flush().await?;

    tracing::info!("Notification writer finished after {} line(s)", written);
    Ok(written)
}
