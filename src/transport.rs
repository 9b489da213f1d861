//! JSON-lines plumbing between the UI pipe and the engine loop.

use crate::protocol::{decode_line, Inbound, UiEvent};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Queue each decoded line for the engine until `input` ends.
///
/// Blank lines are skipped. Undecodable add and repeat lines are queued as
/// their failure event; other garbage is logged and dropped.
pub async fn read_commands<R>(input: R, commands: mpsc::Sender<Inbound>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match decode_line(line) {
                    Ok(inbound) => {
                        if commands.send(inbound).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, line, "Ignoring malformed command"),
                }
            }
            Ok(None) => {
                info!("Command input closed");
                break;
            }
            Err(e) => {
                error!(error = %e, "Failed to read command input");
                break;
            }
        }
    }
}

/// Write every event as one JSON line until all senders are gone
pub async fn write_events<W>(mut events: mpsc::UnboundedReceiver<UiEvent>, mut output: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = events.recv().await {
        let mut line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "Failed to encode event");
                continue;
            }
        };
        line.push('\n');
        if let Err(e) = output.write_all(line.as_bytes()).await {
            error!(error = %e, "Failed to write event");
            break;
        }
        if let Err(e) = output.flush().await {
            error!(error = %e, "Failed to flush event output");
            break;
        }
    }
}
