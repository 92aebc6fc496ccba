//! Server error types.

use std::fmt;

use kube_proto::ProtoError;
use thiserror::Error;

/// How a tool call failed, as reported in the machine payload's `error_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Rejected before anything was spawned.
    Validation,
    /// Tool arguments did not decode.
    InvalidArguments,
    /// The kubectl executable is not on the execution path.
    BinaryNotFound,
    /// The process ran and exited non-zero.
    NonZeroExit,
    /// The process exceeded its wall-clock budget and was killed.
    Timeout,
    /// Any other spawn-level fault (permissions, resource exhaustion).
    Spawn,
}

impl FailureKind {
    /// Stable wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::InvalidArguments => "invalid_arguments",
            Self::BinaryNotFound => "binary_not_found",
            Self::NonZeroExit => "non_zero_exit",
            Self::Timeout => "timeout",
            Self::Spawn => "spawn",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised before a process produces an exit status.
///
/// Timeouts and non-zero exits are not errors at this level; they are
/// reported on [`crate::executor::ExecutionResult`].
#[derive(Debug, Error)]
pub enum ExecError {
    /// No tokens to run.
    #[error("empty command")]
    EmptyCommand,

    /// The first token is not the binary name.
    #[error("Command must start with '{expected}', got '{found}'")]
    UnexpectedBinary {
        /// Binary name commands must start with.
        expected: String,
        /// What the first token was.
        found: String,
    },

    /// The executable could not be found.
    #[error("{program} command not found. Is {program} installed and in PATH?")]
    BinaryNotFound {
        /// Program that was looked up.
        program: String,
    },

    /// The process could not be started.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Collecting the child's output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecError {
    /// Classify for the machine payload.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::EmptyCommand | Self::UnexpectedBinary { .. } => FailureKind::Validation,
            Self::BinaryNotFound { .. } => FailureKind::BinaryNotFound,
            Self::Spawn { .. } | Self::Io(_) => FailureKind::Spawn,
        }
    }
}

/// Context tool argument errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// `use` without a target.
    #[error("Missing context_name")]
    MissingContextName,

    /// Target that kubectl would parse as a flag.
    #[error("Invalid context_name '{0}'")]
    InvalidContextName(String),

    /// Action outside `get`, `list`, `use`.
    #[error("Invalid action '{0}'")]
    InvalidAction(String),
}

/// Protocol-level errors, mapped onto JSON-RPC error codes.
#[derive(Debug, Error)]
pub enum ServerError {
    /// JSON parsing/serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Method not found
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Invalid parameters
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// IO error on the transport
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Get the JSON-RPC error code for this error
    pub fn code(&self) -> i32 {
        use kube_proto::rpc::{INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR};
        match self {
            Self::Json(_) => PARSE_ERROR,
            Self::MethodNotFound(_) => METHOD_NOT_FOUND,
            Self::InvalidParams(_) => INVALID_PARAMS,
            Self::Io(_) => INTERNAL_ERROR,
        }
    }
}

impl From<ProtoError> for ServerError {
    fn from(err: ProtoError) -> Self {
        Self::InvalidParams(err.to_string())
    }
}

/// Server result type
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use kube_proto::rpc::{INVALID_PARAMS, METHOD_NOT_FOUND};

    #[test]
    fn binary_not_found_message_names_program() {
        let err = ExecError::BinaryNotFound {
            program: "kubectl".into(),
        };
        assert_eq!(
            err.to_string(),
            "kubectl command not found. Is kubectl installed and in PATH?"
        );
        assert_eq!(err.kind(), FailureKind::BinaryNotFound);
    }

    #[test]
    fn spawn_errors_classified_as_spawn() {
        let err = ExecError::Spawn {
            program: "kubectl".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert_eq!(err.kind(), FailureKind::Spawn);
    }

    #[test]
    fn context_error_messages() {
        assert_eq!(ContextError::MissingContextName.to_string(), "Missing context_name");
        assert_eq!(
            ContextError::InvalidContextName("-x".into()).to_string(),
            "Invalid context_name '-x'"
        );
        assert_eq!(
            ContextError::InvalidAction("delete".into()).to_string(),
            "Invalid action 'delete'"
        );
    }

    #[test]
    fn server_error_codes() {
        assert_eq!(ServerError::MethodNotFound("x".into()).code(), METHOD_NOT_FOUND);
        let unknown: ServerError = ProtoError::UnknownTool("x".into()).into();
        assert_eq!(unknown.code(), INVALID_PARAMS);
    }

    #[test]
    fn failure_kind_wire_names() {
        assert_eq!(FailureKind::Timeout.as_str(), "timeout");
        assert_eq!(FailureKind::NonZeroExit.to_string(), "non_zero_exit");
    }
}
