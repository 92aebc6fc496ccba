//! Agent configuration.
//!
//! Everything is read from the environment with fixed defaults; flags
//! exist only to override the environment.

use std::time::Duration;

use clap::Parser;

use crate::error::ConfigError;

/// Default Bedrock region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default Bedrock model.
pub const DEFAULT_MODEL_ID: &str = "apac.anthropic.claude-3-5-sonnet-20241022-v2:0";

/// Environment variable holding the Bedrock API key.
pub const BEARER_TOKEN_ENV: &str = "AWS_BEARER_TOKEN_BEDROCK";

/// Agent settings.
#[derive(Debug, Clone, Parser)]
#[command(name = "kube-agent")]
#[command(about = "Kubernetes operations agent (kubectl powered)")]
#[command(version)]
pub struct AgentConfig {
    /// Bedrock region
    #[arg(long, env = "BEDROCK_MODEL_REGION", default_value = DEFAULT_REGION)]
    pub region: String,

    /// Bedrock model identifier
    #[arg(long, env = "BEDROCK_MODEL_ID", default_value = DEFAULT_MODEL_ID)]
    pub model_id: String,

    /// Bedrock API key
    #[arg(long, env = BEARER_TOKEN_ENV, hide_env_values = true)]
    pub bearer_token: Option<String>,

    /// Override the Bedrock runtime endpoint (e.g. a VPC endpoint)
    #[arg(long, env = "BEDROCK_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Command line that starts the tool server
    #[arg(long, env = "KUBE_AGENT_SERVER", default_value = "kube-mcp")]
    pub server: String,

    /// Maximum tokens per model reply
    #[arg(long, default_value_t = 4096)]
    pub max_tokens: u32,

    /// Maximum model/tool round trips per request
    #[arg(long, default_value_t = 16)]
    pub max_tool_rounds: usize,

    /// Budget for one tool server request, in seconds
    #[arg(long, default_value_t = 60)]
    pub request_timeout_secs: u64,

    /// Approximate conversation size kept between requests, in bytes
    #[arg(long, default_value_t = 400_000)]
    pub history_budget_bytes: usize,

    /// Longest tool output kept in the conversation, in bytes
    #[arg(long, default_value_t = 16_000)]
    pub max_tool_output_bytes: usize,
}

impl AgentConfig {
    /// The bearer token, required to reach the model.
    pub fn bearer_token(&self) -> Result<&str, ConfigError> {
        self.bearer_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingCredentials(BEARER_TOKEN_ENV))
    }

    /// Bedrock runtime base URL.
    pub fn endpoint(&self) -> String {
        self.endpoint.clone().unwrap_or_else(|| {
            format!("https://bedrock-runtime.{}.amazonaws.com", self.region)
        })
    }

    /// Server program and its arguments.
    pub fn server_command(&self) -> Result<(String, Vec<String>), ConfigError> {
        let mut parts = shlex::split(&self.server)
            .ok_or_else(|| ConfigError::InvalidServerCommand(self.server.clone()))?;
        if parts.is_empty() {
            return Err(ConfigError::InvalidServerCommand(self.server.clone()));
        }
        let program = parts.remove(0);
        Ok((program, parts))
    }

    /// Budget for one tool server request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> AgentConfig {
        let mut argv = vec!["kube-agent"];
        argv.extend_from_slice(args);
        AgentConfig::parse_from(argv)
    }

    #[test]
    fn explicit_token_is_used() {
        let config = parse(&["--bearer-token", "abc"]);
        assert_eq!(config.bearer_token().unwrap(), "abc");
    }

    #[test]
    fn blank_token_is_missing() {
        let config = parse(&["--bearer-token", "  "]);
        assert!(matches!(
            config.bearer_token(),
            Err(ConfigError::MissingCredentials(BEARER_TOKEN_ENV))
        ));
    }

    #[test]
    fn endpoint_follows_region() {
        let config = parse(&["--region", "eu-west-1"]);
        assert_eq!(config.endpoint(), "https://bedrock-runtime.eu-west-1.amazonaws.com");
        let config = parse(&["--endpoint", "http://localhost:9000"]);
        assert_eq!(config.endpoint(), "http://localhost:9000");
    }

    #[test]
    fn server_command_is_tokenized() {
        let config = parse(&["--server", "kube-mcp --kubectl '/opt/k 8s/kubectl'"]);
        let (program, args) = config.server_command().unwrap();
        assert_eq!(program, "kube-mcp");
        assert_eq!(args, ["--kubectl", "/opt/k 8s/kubectl"]);
    }

    #[test]
    fn empty_server_command_rejected() {
        let config = parse(&["--server", ""]);
        assert!(config.server_command().is_err());
    }

    #[test]
    fn history_limits_default_and_override() {
        let config = parse(&[]);
        assert_eq!(config.history_budget_bytes, 400_000);
        assert_eq!(config.max_tool_output_bytes, 16_000);
        let config = parse(&["--history-budget-bytes", "65536", "--max-tool-output-bytes", "4096"]);
        assert_eq!(config.history_budget_bytes, 65_536);
        assert_eq!(config.max_tool_output_bytes, 4096);
    }
}
