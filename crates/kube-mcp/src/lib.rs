//! # kube-mcp
//!
//! A stdio tool server that lets a model-driven agent run kubectl safely.
//!
//! Two tools are served:
//!
//! - `run_kubectl_command`: a free-form command string is validated
//!   ([`validator`]), tokenized and run with a 30s budget ([`executor`]), and
//!   its stdout classified as JSON or text ([`normalizer`]).
//! - `kubectl_context`: `get`, `list` or `use` a kubeconfig context, built
//!   from fixed sub-verbs ([`context`]) and run with a 10s budget.
//!
//! ```text
//! ┌────────────┐  JSON-RPC (stdio)  ┌────────────┐   spawn   ┌─────────┐
//! │ kube-agent │◄──────────────────►│  kube-mcp  │──────────►│ kubectl │
//! └────────────┘                    └────────────┘           └─────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod normalizer;
pub mod server;
pub mod stdio;
pub mod tools;
pub mod validator;

pub use config::{Args, ServerConfig};
pub use error::{ContextError, ExecError, FailureKind, ServerError, ServerResult};
pub use executor::{CommandExecutor, ExecutionResult};
pub use normalizer::{NormalizedOutput, OutputFormat, normalize};
pub use server::ToolServer;
pub use stdio::{serve, serve_stdio};
pub use validator::{CommandValidator, ValidationOutcome};
