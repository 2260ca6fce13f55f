//! MCP server over stdio.
//!
//! Newline-delimited JSON-RPC: one object per line on stdin, one per line on
//! stdout. Nothing else may write to stdout; all diagnostics go to stderr
//! through the tracing stack. Requests are handled concurrently (one task
//! each) and responses are serialized through a single writer task, so
//! concurrent tool calls from one agent interleave freely and correlate by
//! id alone.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::handlers::Handlers;
use crate::protocol::{error_codes, RpcRequest, RpcResponse};

/// Maximum stdin line size in bytes (10 MB). Lines exceeding this are
/// rejected; an unframed client cannot OOM the daemon.
pub const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

/// How long in-flight calls get to finish after shutdown begins.
pub const DRAIN_GRACE: std::time::Duration = std::time::Duration::from_secs(2);

/// Read one newline-terminated line into `buf`, refusing lines longer than
/// `limit` bytes.
///
/// A plain `read_line()` keeps allocating until it sees a newline, so a
/// client that never sends one can exhaust memory. This variant copies
/// straight out of the reader's internal buffer and stops accumulating at
/// the limit; an oversized line is skipped through to its newline so the
/// next read starts on a frame boundary instead of mid-garbage.
pub async fn read_line_bounded<R>(
    reader: &mut R,
    buf: &mut String,
    limit: usize,
) -> std::io::Result<usize>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    use tokio::io::AsyncBufReadExt;

    let mut taken: Vec<u8> = Vec::new();

    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            break; // EOF mid-line; hand back what we have
        }

        let newline_at = chunk.iter().position(|&b| b == b'\n');
        let take = newline_at.map_or(chunk.len(), |i| i + 1);

        if taken.len() + take > limit {
            reader.consume(take);
            if newline_at.is_none() {
                skip_past_newline(reader).await?;
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("line longer than the {limit}-byte cap, discarded"),
            ));
        }

        taken.extend_from_slice(&chunk[..take]);
        reader.consume(take);
        if newline_at.is_some() {
            break;
        }
    }

    let count = taken.len();
    buf.push_str(&String::from_utf8_lossy(&taken));
    Ok(count)
}

/// Discard input up to and including the next newline (or EOF).
async fn skip_past_newline<R>(reader: &mut R) -> std::io::Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    use tokio::io::AsyncBufReadExt;

    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            return Ok(());
        }
        match chunk.iter().position(|&b| b == b'\n') {
            Some(i) => {
                reader.consume(i + 1);
                return Ok(());
            }
            None => {
                let len = chunk.len();
                reader.consume(len);
            }
        }
    }
}

/// The stdio MCP server.
pub struct McpServer {
    handlers: Arc<Handlers>,
}

impl McpServer {
    pub fn new(handlers: Arc<Handlers>) -> Self {
        Self { handlers }
    }

    /// Run until stdin closes or `shutdown` flips to true.
    ///
    /// When the loop exits, no further requests are accepted; tasks already
    /// spawned finish under the caller's drain grace.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let stdin = tokio::io::stdin();
        let mut reader = BufReader::new(stdin);
        let mut line = String::new();

        // Single writer task: every response funnels through one stdout owner.
        let (write_tx, mut write_rx) = mpsc::unbounded_channel::<String>();
        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(response) = write_rx.recv().await {
                if stdout.write_all(response.as_bytes()).await.is_err() {
                    break;
                }
                if stdout.write_all(b"\n").await.is_err() {
                    break;
                }
                if stdout.flush().await.is_err() {
                    break;
                }
            }
        });

        info!("MCP server listening on stdio");

        loop {
            line.clear();

            let bytes_read = tokio::select! {
                read = read_line_bounded(&mut reader, &mut line, MAX_LINE_BYTES) => {
                    match read {
                        Ok(n) => n,
                        Err(err) => {
                            warn!(error = %err, "oversized or unreadable stdin line dropped");
                            let response = RpcResponse::fail(
                                None,
                                error_codes::PAYLOAD_TOO_LARGE,
                                format!("Request rejected: {err}"),
                            );
                            let _ = write_tx.send(serde_json::to_string(&response)?);
                            continue;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("shutdown requested, no longer accepting requests");
                    break;
                }
            };

            if bytes_read == 0 {
                info!("stdin closed (EOF)");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request: RpcRequest = match serde_json::from_str(trimmed) {
                Ok(request) => request,
                Err(err) => {
                    warn!(error = %err, "invalid JSON-RPC frame");
                    let response = RpcResponse::fail(
                        None,
                        error_codes::PARSE_ERROR,
                        format!("Parse error: {err}"),
                    );
                    let _ = write_tx.send(serde_json::to_string(&response)?);
                    continue;
                }
            };

            // One task per request; responses interleave in completion order.
            let handlers = Arc::clone(&self.handlers);
            let write_tx = write_tx.clone();
            let request_id = request.id.clone();
            let is_notification = request.is_notification();
            tokio::spawn(async move {
                let handled =
                    tokio::spawn(async move { handlers.dispatch(request).await }).await;
                let response = match handled {
                    Ok(response) => response,
                    Err(join_err) => {
                        // A panicking handler becomes a typed error instead of
                        // killing the daemon.
                        error!(error = %join_err, "request handler panicked");
                        if is_notification {
                            return;
                        }
                        RpcResponse::fail(
                            request_id,
                            error_codes::INTERNAL_ERROR,
                            "Internal error while handling the request",
                        )
                    }
                };

                if response.is_none_marker() {
                    debug!("notification handled, no response");
                    return;
                }
                if is_notification {
                    // Notifications never receive responses, even failed ones.
                    debug!("dropping response to notification");
                    return;
                }
                match serde_json::to_string(&response) {
                    Ok(text) => {
                        let _ = write_tx.send(text);
                    }
                    Err(err) => error!(error = %err, "response serialization failed"),
                }
            });
        }

        drop(write_tx);
        let _ = writer.await;
        Ok(())
    }
}
