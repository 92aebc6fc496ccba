//! Agent error types.

use kube_proto::ErrorObject;
use thiserror::Error;

/// Configuration errors. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No bearer token for the model backend.
    #[error("missing model credentials: set {0}")]
    MissingCredentials(&'static str),

    /// The server command line could not be tokenized.
    #[error("invalid server command: {0}")]
    InvalidServerCommand(String),

    /// Bad endpoint URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Errors talking to the tool server.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server executable is missing.
    #[error("tool server '{0}' not found")]
    ServerNotFound(String),

    /// The server process could not be started.
    #[error("failed to start tool server '{program}': {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The server closed its end of the channel.
    #[error("tool server closed the connection")]
    Closed,

    /// No response within the request budget.
    #[error("request '{0}' timed out")]
    Timeout(String),

    /// The server answered with a JSON-RPC error.
    #[error("tool server error: {0}")]
    Rpc(ErrorObject),

    /// The server sent something that is not a valid frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// I/O on the channel failed.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// The channel is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Closed | Self::Io(_) | Self::ServerNotFound(_) | Self::Spawn { .. }
        )
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// Errors from the model backend.
#[derive(Debug, Error)]
pub enum ModelError {
    /// HTTP-level failure.
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-success status.
    #[error("model backend returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Backend message.
        message: String,
    },

    /// The response did not have the expected shape.
    #[error("unexpected model response: {0}")]
    InvalidResponse(String),
}

/// Errors surfaced while handling one utterance or managing the session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Tool server problem.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Model problem.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The model kept requesting tools past the per-utterance cap.
    #[error("gave up after {0} tool rounds without a final answer")]
    ToolRoundLimit(usize),

    /// The session is not in a state that accepts utterances.
    #[error("session is {0}")]
    NotReady(&'static str),
}

impl SessionError {
    /// The session cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Transport(e) => e.is_fatal(),
            Self::Model(_) | Self::ToolRoundLimit(_) => false,
            Self::NotReady(_) => true,
        }
    }
}
