//! # kube-proto
//!
//! Wire types shared by the kubectl tool server (`kube-mcp`) and the agent
//! session that drives it (`kube-agent`).
//!
//! ## Protocol
//!
//! Newline-delimited JSON-RPC 2.0 over the server's stdin/stdout:
//!
//! Request:
//! ```json
//! {"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {"name": "run_kubectl_command", "arguments": {"command": "kubectl get pods"}}}
//! ```
//!
//! Response:
//! ```json
//! {"jsonrpc": "2.0", "id": 1, "result": {"content": [{"type": "text", "text": "..."}], "result": "{...}", "isError": false}}
//! ```
//!
//! Every tool result carries two renditions of the same outcome: prose in
//! `content` for a text-oriented consumer and a JSON-encoded machine payload
//! in `result`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod rpc;
pub mod tools;

pub use error::ProtoError;
pub use rpc::{ErrorObject, Method, Request, Response};
pub use tools::{
    CallToolParams, Content, InitializeResult, ListToolsResult, ServerInfo, ToolCallRequest,
    ToolCallResponse, ToolDescriptor, ToolName,
};

/// Protocol revision announced during `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC version string carried on every frame.
pub const JSONRPC_VERSION: &str = "2.0";
