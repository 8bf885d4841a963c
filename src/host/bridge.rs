//! Line-delimited JSON bridge to the launcher
//!
//! When the client runs as a launcher subprocess, server packets arrive on
//! one stream as [`HostEvent`] lines and the client's messages go back on
//! another as [`ClientMessage`] lines.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::host::{ClientMessage, HostEvent, HostSession, SharedHost};

/// Pump events in and messages out until exit is requested or the input closes
///
/// Closing the input means the launcher is gone, so it also requests exit.
pub async fn run_bridge<R, W>(
    host: SharedHost,
    mut outbox: mpsc::UnboundedReceiver<ClientMessage>,
    reader: R,
    mut writer: W,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut exit = host.subscribe_exit();
    let mut input_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if input_open => {
                match line.map_err(|e| Error::Io(e.to_string()))? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => match serde_json::from_str::<HostEvent>(&line) {
                        Ok(event) => host.apply(event),
                        Err(e) => tracing::warn!(error = %e, "ignoring malformed host event"),
                    },
                    None => {
                        tracing::debug!("host input closed");
                        input_open = false;
                        host.request_exit();
                    }
                }
            }
            message = outbox.recv() => {
                let Some(message) = message else { break };
                write_message(&mut writer, &message).await?;
            }
            changed = exit.changed() => {
                if changed.is_err() || *exit.borrow() {
                    break;
                }
            }
        }
    }

    // Flush whatever the client queued before stopping
    while let Ok(message) = outbox.try_recv() {
        write_message(&mut writer, &message).await?;
    }
    writer.flush().await.map_err(|e| Error::Io(e.to_string()))
}

async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &ClientMessage) -> Result<()> {
    let json = serde_json::to_string(message).map_err(|e| Error::Io(e.to_string()))?;
    writer.write_all(json.as_bytes()).await.map_err(|e| Error::Io(e.to_string()))?;
    writer.write_all(b"\n").await.map_err(|e| Error::Io(e.to_string()))?;
    writer.flush().await.map_err(|e| Error::Io(e.to_string()))
}
