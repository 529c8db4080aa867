//! stdio transport - newline-delimited JSON-RPC on stdin/stdout
//!
//! Each message is handled on its own task so a long synchronous eval does
//! not hold up other commands. A single writer task owns the output stream.

use crate::protocol::McpServer;
use mcbot_core::mcp::{JsonRpcError, JsonRpcResponse};
use mcbot_foundation::Result;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Serve on the process's stdin/stdout until stdin closes
pub async fn serve_stdio(server: McpServer) -> Result<()> {
    info!("MCP server listening on stdio");
    serve(server, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve on any reader/writer pair until the reader hits EOF
///
/// A line that is not valid UTF-8 gets a parse-error reply like any other
/// unparsable message. Only EOF or a read error ends the loop.
///
/// Returns once every in-flight request has been answered.
pub async fn serve<R, W>(server: McpServer, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<String>(64);

    let writer_task = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if let Err(e) = write_line(&mut writer, &line).await {
                error!("Failed to write response: {}", e);
                break;
            }
        }
    });

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("Unparsable message: {}", e);
                let response = JsonRpcResponse::failure(Value::Null, JsonRpcError::parse_error());
                send_response(&tx, &response).await;
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        let server = server.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Some(response) = server.handle_message(&line).await {
                send_response(&tx, &response).await;
            }
        });
    }

    debug!("stdin closed, draining in-flight requests");
    drop(tx);
    if let Err(e) = writer_task.await {
        error!("Writer task failed: {}", e);
    }
    Ok(())
}

async fn send_response(tx: &mpsc::Sender<String>, response: &JsonRpcResponse) {
    match serde_json::to_string(response) {
        Ok(text) => {
            if tx.send(text).await.is_err() {
                debug!("Writer closed, dropping response");
            }
        }
        Err(e) => error!("Failed to serialize response: {}", e),
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
