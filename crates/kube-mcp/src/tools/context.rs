//! `kubectl_context`: get, list or switch the active context.

use serde_json::{Map, Value, json};
use tracing::{info, warn};

use kube_proto::{ToolCallResponse, ToolName};

use crate::context::{ContextArgs, ContextCommand};
use crate::error::{ContextError, FailureKind};
use crate::server::ToolServer;
use crate::tools::{fenced, parse_args};

/// Run a context operation. Output is always treated as text.
pub async fn run(server: &ToolServer, arguments: Map<String, Value>) -> ToolCallResponse {
    let args: ContextArgs = match parse_args(ToolName::KubectlContext, arguments) {
        Ok(args) => args,
        Err(response) => return response,
    };

    let command = match ContextCommand::from_args(&args) {
        Ok(command) => command,
        Err(err) => return invalid(&err),
    };
    let action = command.action();
    let timeout = server.config().context_timeout;

    info!(%action, "context operation");
    match server.executor().execute(&command.tokens(), timeout).await {
        Ok(result) if result.timed_out => {
            let secs = timeout.as_secs();
            let payload = json!({
                "action": action.as_str(),
                "success": false,
                "error": format!("Context operation timeout ({secs}s)"),
                "error_kind": FailureKind::Timeout.as_str(),
                "timed_out": true,
            });
            ToolCallResponse::new(
                format!("⏱️ Context operation timed out after {secs} seconds"),
                &payload,
            )
        }
        Ok(result) => {
            let success = result.success();
            let message = if success {
                format!("✅ Context operation successful:\n\n{}", fenced("", &result.stdout))
            } else {
                format!("❌ Context operation failed:\n\n{}", fenced("", &result.stderr))
            };
            let payload = json!({
                "action": action.as_str(),
                "success": success,
                "output": result.stdout,
                "error": result.stderr,
            });
            ToolCallResponse::new(message, &payload)
        }
        Err(err) => {
            warn!(%action, error = %err, "context operation could not run");
            let payload = json!({
                "action": action.as_str(),
                "success": false,
                "error": err.to_string(),
                "error_kind": err.kind().as_str(),
            });
            ToolCallResponse::new(format!("❌ Error managing context: {err}"), &payload)
        }
    }
}

fn invalid(err: &ContextError) -> ToolCallResponse {
    let (message, error) = match err {
        ContextError::MissingContextName => (
            "❌ Error: context_name is required when action='use'".to_string(),
            err.to_string(),
        ),
        ContextError::InvalidContextName(name) => (
            format!("❌ Error: Invalid context_name '{name}'. Context names cannot start with '-'"),
            err.to_string(),
        ),
        ContextError::InvalidAction(action) => (
            format!("❌ Error: Invalid action '{action}'. Use 'get', 'list', or 'use'"),
            "Invalid action".to_string(),
        ),
    };
    ToolCallResponse::new(message, &json!({"success": false, "error": error}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    fn server() -> ToolServer {
        ToolServer::new(ServerConfig::default().with_kubectl("/nonexistent/kubectl"))
    }

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn use_without_name_fails_fast() {
        let resp = run(&server(), args(json!({"action": "use"}))).await;
        assert!(resp.is_error);
        assert_eq!(resp.text(), "❌ Error: context_name is required when action='use'");
        assert_eq!(
            resp.payload().unwrap(),
            json!({"success": false, "error": "Missing context_name"})
        );
    }

    #[tokio::test]
    async fn flag_like_context_name_fails_fast() {
        // The configured binary does not exist; a spawn attempt would report binary_not_found.
        let resp = run(&server(), args(json!({"action": "use", "context_name": "--kubeconfig=/x"}))).await;
        assert!(resp.is_error);
        assert_eq!(
            resp.text(),
            "❌ Error: Invalid context_name '--kubeconfig=/x'. Context names cannot start with '-'"
        );
        assert_eq!(
            resp.payload().unwrap(),
            json!({"success": false, "error": "Invalid context_name '--kubeconfig=/x'"})
        );
    }

    #[tokio::test]
    async fn invalid_action_fails_fast() {
        let resp = run(&server(), args(json!({"action": "rename"}))).await;
        assert_eq!(
            resp.text(),
            "❌ Error: Invalid action 'rename'. Use 'get', 'list', or 'use'"
        );
        assert_eq!(
            resp.payload().unwrap(),
            json!({"success": false, "error": "Invalid action"})
        );
    }

    #[tokio::test]
    async fn non_string_action_is_invalid_arguments() {
        let resp = run(&server(), args(json!({"action": 3}))).await;
        assert_eq!(resp.payload().unwrap()["error_kind"], "invalid_arguments");
    }

    #[tokio::test]
    async fn missing_binary_reported_with_action() {
        let resp = run(&server(), args(json!({"action": "list"}))).await;
        assert!(resp.is_error);
        let payload = resp.payload().unwrap();
        assert_eq!(payload["action"], "list");
        assert_eq!(payload["error_kind"], "binary_not_found");
        assert!(resp.text().starts_with("❌ Error managing context:"));
    }
}
