//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::executor::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONTEXT_TIMEOUT};
use crate::validator::{DEFAULT_DESTRUCTIVE_VERBS, KUBECTL};

/// Tool server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Executable spawned for kubectl commands.
    pub kubectl: PathBuf,
    /// Budget for generic commands.
    pub command_timeout: Duration,
    /// Budget for context operations.
    pub context_timeout: Duration,
    /// Verbs classified (not blocked) as destructive.
    pub destructive_verbs: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            kubectl: PathBuf::from(KUBECTL),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            context_timeout: DEFAULT_CONTEXT_TIMEOUT,
            destructive_verbs: DEFAULT_DESTRUCTIVE_VERBS
                .iter()
                .map(|v| (*v).to_string())
                .collect(),
        }
    }
}

impl ServerConfig {
    /// Use a different kubectl executable.
    #[must_use]
    pub fn with_kubectl(mut self, path: impl Into<PathBuf>) -> Self {
        self.kubectl = path.into();
        self
    }

    /// Override the generic command budget.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Override the context operation budget.
    #[must_use]
    pub fn with_context_timeout(mut self, timeout: Duration) -> Self {
        self.context_timeout = timeout;
        self
    }
}

/// Command-line surface of the `kube-mcp` binary.
#[derive(Debug, Parser)]
#[command(name = "kube-mcp")]
#[command(about = "Serve kubectl as tools over stdio (newline-delimited JSON-RPC)")]
#[command(version)]
pub struct Args {
    /// kubectl executable to spawn
    #[arg(long, env = "KUBE_MCP_KUBECTL", default_value = KUBECTL)]
    pub kubectl: PathBuf,

    /// Timeout for generic kubectl commands, in seconds
    #[arg(long, env = "KUBE_MCP_COMMAND_TIMEOUT", default_value_t = DEFAULT_COMMAND_TIMEOUT.as_secs())]
    pub command_timeout_secs: u64,

    /// Timeout for context operations, in seconds
    #[arg(long, env = "KUBE_MCP_CONTEXT_TIMEOUT", default_value_t = DEFAULT_CONTEXT_TIMEOUT.as_secs())]
    pub context_timeout_secs: u64,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self::default()
            .with_kubectl(args.kubectl)
            .with_command_timeout(Duration::from_secs(args.command_timeout_secs))
            .with_context_timeout(Duration::from_secs(args.context_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.kubectl, PathBuf::from("kubectl"));
        assert_eq!(config.command_timeout, Duration::from_secs(30));
        assert_eq!(config.context_timeout, Duration::from_secs(10));
        assert_eq!(config.destructive_verbs, vec!["delete", "drain", "cordon"]);
    }

    #[test]
    fn args_parse_overrides() {
        let args = Args::parse_from([
            "kube-mcp",
            "--kubectl",
            "/opt/bin/kubectl",
            "--command-timeout-secs",
            "5",
        ]);
        let config = ServerConfig::from(args);
        assert_eq!(config.kubectl, PathBuf::from("/opt/bin/kubectl"));
        assert_eq!(config.command_timeout, Duration::from_secs(5));
        assert_eq!(config.context_timeout, Duration::from_secs(10));
    }
}
