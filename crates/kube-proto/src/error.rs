//! Error types for the kube-proto crate.

use thiserror::Error;

/// Errors that can occur while decoding protocol frames.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Failed to decode a message.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// Tool name is not one the server registers.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

impl From<serde_json::Error> for ProtoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decoding(err.to_string())
    }
}
