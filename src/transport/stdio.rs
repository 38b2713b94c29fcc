//! Standard I/O transport implementation

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::watch;
use tracing::{debug, error, info};

use super::{JsonRpcMessage, MessageHandler, Transport, process_line};

/// Standard I/O transport for local CLI integration with MCP clients
pub struct StdioTransport {
    shutdown_tx: watch::Sender<bool>,
}

impl StdioTransport {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self { shutdown_tx }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn start(&self, handler: Arc<dyn MessageHandler>) -> Result<()> {
        info!("Starting stdio transport");
        serve_io(
            tokio::io::stdin(),
            tokio::io::stdout(),
            handler,
            self.shutdown_tx.subscribe(),
        )
        .await
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Shutting down stdio transport");
        self.shutdown_tx.send_replace(true);
        Ok(())
    }
}

async fn write_message<W>(writer: &mut BufWriter<W>, message: &JsonRpcMessage) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json_str = serde_json::to_string(message).context("Failed to serialize message to JSON")?;
    debug!("Sending message: {}", json_str);

    writer
        .write_all(json_str.as_bytes())
        .await
        .context("Failed to write message")?;
    writer.write_all(b"\n").await.context("Failed to write newline")?;
    writer.flush().await.context("Failed to flush output")?;
    Ok(())
}

/// Serve newline-delimited JSON-RPC from `reader` to `writer`.
///
/// Requests are handled one at a time in arrival order. Returns on EOF or
/// when `shutdown` flips to `true`.
pub async fn serve_io<R, W>(
    reader: R,
    writer: W,
    handler: Arc<dyn MessageHandler>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut writer = BufWriter::new(writer);
    // cleared once the shutdown sender is gone
    let mut watching = true;

    info!("Starting stdio message processing loop");

    loop {
        if *shutdown.borrow() {
            info!("Shutdown requested, stopping message processing");
            break;
        }

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            changed = shutdown.changed(), if watching => {
                if changed.is_err() {
                    debug!("Shutdown sender dropped");
                    watching = false;
                }
                continue;
            }
        };

        let Some(line) = line else {
            info!("EOF reached, stopping message processing");
            break;
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(reply) = process_line(handler.as_ref(), trimmed).await {
            if let Err(e) = write_message(&mut writer, &reply).await {
                error!("Failed to send response: {:#}", e);
                return Err(e);
            }
        }
    }

    info!("Stdio transport stopped");
    Ok(())
}
