//! Client side of the tool server channel.
//!
//! [`RpcConnection`] speaks newline-delimited JSON-RPC over any async
//! reader/writer pair. [`StdioTransport`] owns a spawned server process and
//! drives a connection over its stdin/stdout.

use std::process::Stdio;
use std::time::Duration;

use kube_proto::{
    InitializeResult, ListToolsResult, Method, PROTOCOL_VERSION, Request,
    Response, ToolCallResponse, ToolDescriptor,
};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::error::TransportError;

/// Grace period between closing the server's stdin and killing it.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Operations the session needs from a tool server.
#[allow(async_fn_in_trait)]
pub trait ToolTransport {
    /// Tools the server offers.
    async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>, TransportError>;

    /// Invoke a tool by name.
    async fn call_tool(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallResponse, TransportError>;

    /// Release the channel.
    async fn shutdown(self) -> Result<(), TransportError>;
}

/// JSON-RPC client over a line-oriented byte stream.
#[derive(Debug)]
pub struct RpcConnection<R, W> {
    lines: Lines<R>,
    writer: W,
    next_id: u64,
    timeout: Duration,
}

impl<R, W> RpcConnection<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Wrap a reader/writer pair. Each request must be answered within `timeout`.
    pub fn new(reader: R, writer: W, timeout: Duration) -> Self {
        Self {
            lines: reader.lines(),
            writer,
            next_id: 1,
            timeout,
        }
    }

    /// Perform the `initialize` handshake and announce readiness.
    pub async fn initialize(&mut self) -> Result<InitializeResult, TransportError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
        });
        let result = self.request(Method::Initialize, params).await?;
        let init: InitializeResult = serde_json::from_value(result)?;
        self.notify(Method::Initialized).await?;
        info!(
            server = %init.server_info.name,
            version = %init.server_info.version,
            protocol = %init.protocol_version,
            "tool server initialized"
        );
        Ok(init)
    }

    /// Send a request and wait for its response.
    pub async fn request(&mut self, method: Method, params: Value) -> Result<Value, TransportError> {
        let id = self.next_id;
        self.next_id += 1;

        self.send(&Request::new(id, method, params)).await?;
        debug!(id, method = %method, "request sent");

        let response = tokio::time::timeout(self.timeout, self.read_response(id))
            .await
            .map_err(|_| TransportError::Timeout(method.to_string()))??;

        if let Some(error) = response.error {
            return Err(TransportError::Rpc(error));
        }
        response
            .result
            .ok_or_else(|| TransportError::Protocol(format!("response {id} has no result")))
    }

    /// Send a notification.
    pub async fn notify(&mut self, method: Method) -> Result<(), TransportError> {
        self.send(&Request::notification(method)).await
    }

    /// Give back the underlying writer, e.g. to close it.
    pub fn into_writer(self) -> W {
        self.writer
    }

    async fn send(&mut self, request: &Request) -> Result<(), TransportError> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn read_response(&mut self, id: u64) -> Result<Response, TransportError> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Err(TransportError::Closed);
            };
            if line.trim().is_empty() {
                continue;
            }

            let frame: Value = serde_json::from_str(&line)?;
            if frame.get("method").is_some() {
                let method = frame["method"].as_str().unwrap_or("unknown");
                debug!(method, "skipping server notification");
                continue;
            }

            let response: Response = serde_json::from_value(frame)?;
            match response.id_u64() {
                Some(got) if got == id => return Ok(response),
                // Answer to a request we already gave up on.
                Some(got) if got < id => {
                    debug!(got, expected = id, "skipping stale response");
                }
                None if response.id.is_null() && response.error.is_some() => {
                    return Ok(response);
                }
                _ => {
                    return Err(TransportError::Protocol(format!(
                        "response id mismatch (expected {id}, got {})",
                        response.id
                    )));
                }
            }
        }
    }
}

impl<R, W> ToolTransport for RpcConnection<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>, TransportError> {
        let result = self.request(Method::ListTools, Value::Null).await?;
        let list: ListToolsResult = serde_json::from_value(result)?;
        Ok(list.tools)
    }

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallResponse, TransportError> {
        let params = json!({ "name": name, "arguments": arguments });
        let result = self.request(Method::CallTool, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn shutdown(self) -> Result<(), TransportError> {
        let mut writer = self.into_writer();
        writer.shutdown().await?;
        Ok(())
    }
}

/// A tool server running as a child process.
#[derive(Debug)]
pub struct StdioTransport {
    connection: RpcConnection<BufReader<ChildStdout>, ChildStdin>,
    child: Child,
    program: String,
}

impl StdioTransport {
    /// Start `program` and complete the handshake.
    ///
    /// The child is killed if the handshake fails or the transport is
    /// dropped without [`ToolTransport::shutdown`].
    pub async fn spawn(
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    TransportError::ServerNotFound(program.to_string())
                } else {
                    TransportError::Spawn {
                        program: program.to_string(),
                        source,
                    }
                }
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Protocol("server stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Protocol("server stdout unavailable".into()))?;

        // Drain stderr so the server never blocks on a full pipe.
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "kube_agent::transport", "{line}");
                }
            });
        }

        let mut connection = RpcConnection::new(BufReader::new(stdout), stdin, timeout);
        if let Err(e) = connection.initialize().await {
            warn!(program, error = %e, "tool server handshake failed");
            kill_logged(&mut child, program).await;
            return Err(e);
        }

        Ok(Self {
            connection,
            child,
            program: program.to_string(),
        })
    }
}

/// Kill `child`, logging a failed kill. Returns whether the kill succeeded.
async fn kill_logged(child: &mut Child, program: &str) -> bool {
    match child.kill().await {
        Ok(()) => true,
        Err(e) => {
            warn!(program, error = %e, "failed to kill tool server");
            false
        }
    }
}

impl ToolTransport for StdioTransport {
    async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>, TransportError> {
        self.connection.list_tools().await
    }

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallResponse, TransportError> {
        self.connection.call_tool(name, arguments).await
    }

    async fn shutdown(self) -> Result<(), TransportError> {
        let Self {
            connection,
            mut child,
            program,
        } = self;

        // Closing stdin is the server's signal to exit.
        drop(connection);

        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(program, %status, "tool server exited");
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                warn!(program, "tool server did not exit, killing");
                child.kill().await?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    type Conn = RpcConnection<BufReader<tokio::io::DuplexStream>, tokio::io::DuplexStream>;

    /// Client connection plus the server's ends of the pipes.
    fn pair() -> (Conn, Lines<BufReader<tokio::io::DuplexStream>>, tokio::io::DuplexStream) {
        let (client_w, server_r) = duplex(4096);
        let (server_w, client_r) = duplex(4096);
        let conn = RpcConnection::new(
            BufReader::new(client_r),
            client_w,
            Duration::from_millis(500),
        );
        (conn, BufReader::new(server_r).lines(), server_w)
    }

    async fn reply(w: &mut tokio::io::DuplexStream, frame: Value) {
        w.write_all(format!("{frame}\n").as_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn skips_notifications_and_stale_ids() {
        let (mut conn, mut requests, mut server) = pair();
        conn.next_id = 5;

        let server_task = tokio::spawn(async move {
            let line = requests.next_line().await.unwrap().unwrap();
            let req: Request = serde_json::from_str(&line).unwrap();
            assert_eq!(req.id, Some(json!(5)));
            assert_eq!(req.method, "ping");
            reply(&mut server, json!({"jsonrpc": "2.0", "method": "notifications/progress"})).await;
            reply(&mut server, json!({"jsonrpc": "2.0", "id": 4, "result": {"old": true}})).await;
            reply(&mut server, json!({"jsonrpc": "2.0", "id": 5, "result": {}})).await;
        });

        let result = conn.request(Method::Ping, Value::Null).await.unwrap();
        assert_eq!(result, json!({}));
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn rpc_error_is_surfaced() {
        let (mut conn, mut requests, mut server) = pair();
        tokio::spawn(async move {
            requests.next_line().await.unwrap();
            reply(
                &mut server,
                json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32602, "message": "unknown tool: x"}}),
            )
            .await;
        });

        let err = conn.call_tool("x", json!({})).await.unwrap_err();
        assert!(matches!(err, TransportError::Rpc(ref e) if e.code == -32602));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let (mut conn, _requests, _server) = pair();
        let err = conn.request(Method::Ping, Value::Null).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(ref m) if m == "ping"));
    }

    #[tokio::test]
    async fn closed_server_is_fatal() {
        let (mut conn, requests, server) = pair();
        drop(server);
        drop(requests);
        let err = conn.list_tools().await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn handshake_sends_initialized_notification() {
        let (mut conn, mut requests, mut server) = pair();
        let server_task = tokio::spawn(async move {
            let line = requests.next_line().await.unwrap().unwrap();
            let req: Request = serde_json::from_str(&line).unwrap();
            assert_eq!(req.method, "initialize");
            assert_eq!(req.params["protocolVersion"], PROTOCOL_VERSION);
            reply(
                &mut server,
                json!({"jsonrpc": "2.0", "id": 1, "result": {
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "fake", "version": "0.0.1"}
                }}),
            )
            .await;
            let line = requests.next_line().await.unwrap().unwrap();
            let note: Request = serde_json::from_str(&line).unwrap();
            assert!(note.is_notification());
            assert_eq!(note.method, "notifications/initialized");
        });

        let init = conn.initialize().await.unwrap();
        assert_eq!(init.server_info.name, "fake");
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn missing_server_binary() {
        let err = StdioTransport::spawn("kube-mcp-does-not-exist", &[], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::ServerNotFound(ref p) if p == "kube-mcp-does-not-exist"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn server_that_exits_immediately() {
        let err = StdioTransport::spawn("true", &[], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_fatal(), "unexpected error: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn kill_reports_outcome() {
        let mut running = Command::new("sleep").arg("5").kill_on_drop(true).spawn().unwrap();
        assert!(kill_logged(&mut running, "sleep").await);

        // A reaped child cannot be killed; that is reported, not swallowed.
        let mut exited = Command::new("true").spawn().unwrap();
        exited.wait().await.unwrap();
        assert!(!kill_logged(&mut exited, "true").await);
    }
}
