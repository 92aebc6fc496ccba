//! # kube-agent
//!
//! Interactive Kubernetes operations agent. A chat model on Amazon Bedrock
//! answers operator questions by calling the `kube-mcp` tool server, which
//! runs kubectl on its behalf.
//!
//! ```text
//! operator ──► repl ──► AgentSession ──► ChatModel (Bedrock Converse)
//!                            │
//!                            └──► ToolTransport ──stdio──► kube-mcp ──► kubectl
//! ```
//!
//! The session owns the transport for its whole life and resolves one
//! utterance at a time, including every tool round trip, before reading the
//! next line.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bedrock;
pub mod config;
pub mod error;
pub mod model;
pub mod prompt;
pub mod repl;
pub mod session;
pub mod transport;

pub use bedrock::BedrockModel;
pub use config::AgentConfig;
pub use error::{ConfigError, ModelError, SessionError, TransportError};
pub use model::{ChatModel, ContentBlock, Message, ModelReply, ModelRequest, Role, StopReason, Usage};
pub use session::{AgentSession, SessionOptions, SessionState};
pub use transport::{RpcConnection, StdioTransport, ToolTransport};

use tracing::info;

/// Build the model, start the tool server and open a session.
///
/// Credentials are checked before anything is spawned.
pub async fn connect(config: &AgentConfig) -> Result<AgentSession<BedrockModel, StdioTransport>, SessionError> {
    let token = config.bearer_token()?;
    let model = BedrockModel::new(&config.endpoint(), &config.model_id, token)?;
    info!(model = %config.model_id, region = %config.region, "model configured");

    let (program, args) = config.server_command()?;
    let transport = StdioTransport::spawn(&program, &args, config.request_timeout()).await?;

    let options = SessionOptions {
        max_tokens: config.max_tokens,
        max_tool_rounds: config.max_tool_rounds,
        history_budget_bytes: config.history_budget_bytes,
        max_tool_output_bytes: config.max_tool_output_bytes,
        ..SessionOptions::default()
    };
    AgentSession::start(model, transport, options).await
}
