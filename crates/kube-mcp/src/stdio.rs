//! Line-delimited JSON-RPC serve loop.
//!
//! One JSON object per line in, one per line out. Requests are handled one
//! at a time, in arrival order. End of input ends the loop.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

use kube_proto::rpc::{INVALID_REQUEST, PARSE_ERROR};
use kube_proto::{Request, Response};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ServerResult;
use crate::server::ToolServer;

/// Serve requests from `reader`, writing responses to `writer`.
///
/// # Errors
///
/// Returns an error only if the transport itself fails. Lines that are not
/// JSON are answered with a parse error; JSON that is not a request object
/// gets an invalid-request error carrying whatever `id` it had.
pub async fn serve<R, W>(server: &ToolServer, reader: R, mut writer: W) -> ServerResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("stdin read error: {}", e);
                return Err(e.into());
            }
        };

        // Skip empty lines
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(&line) {
            Ok(frame) => match Request::deserialize(&frame) {
                Ok(request) => {
                    debug!(id = ?request.id, method = %request.method, "handling request");
                    server.handle(request).await
                }
                Err(e) => {
                    let id = frame.get("id").cloned().unwrap_or(Value::Null);
                    Some(Response::error(id, INVALID_REQUEST, e.to_string()))
                }
            },
            Err(e) => Some(Response::error(Value::Null, PARSE_ERROR, e.to_string())),
        };

        if let Some(response) = response {
            let json = serde_json::to_string(&response)?;
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
            debug!(id = %response.id, "response sent");
        }
    }

    info!("input closed, shutting down");
    Ok(())
}

/// Serve on the process's stdin/stdout.
///
/// # Errors
///
/// Returns an error if stdin or stdout fails.
pub async fn serve_stdio(server: &ToolServer) -> ServerResult<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    serve(server, stdin, tokio::io::stdout()).await
}
