//! `run_kubectl_command`: validate, execute, normalize.

use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use kube_proto::{ToolCallResponse, ToolName};

use crate::error::{ExecError, FailureKind};
use crate::executor::ExecutionResult;
use crate::normalizer::normalize;
use crate::server::ToolServer;
use crate::tools::{fenced, parse_args};

#[derive(Debug, Deserialize)]
struct CommandArgs {
    command: String,
}

/// Run a free-form kubectl command.
pub async fn run(server: &ToolServer, arguments: Map<String, Value>) -> ToolCallResponse {
    let args: CommandArgs = match parse_args(ToolName::RunKubectlCommand, arguments) {
        Ok(args) => args,
        Err(response) => return response,
    };
    let command = args.command;

    // Execution uses the validated tokens, never a second split.
    let tokens = match server.validator().tokenize(&command) {
        Ok(tokens) => tokens,
        Err(reason) => {
            info!(%command, %reason, "command rejected");
            return rejected(&command, &reason);
        }
    };

    let timeout = server.config().command_timeout;
    info!(%command, "executing");
    match server.executor().execute(&tokens, timeout).await {
        Ok(result) if result.timed_out => timed_out(&command, timeout.as_secs()),
        Ok(result) => completed(&command, &result),
        Err(err) => exec_failed(&command, &err),
    }
}

fn rejected(command: &str, reason: &str) -> ToolCallResponse {
    let payload = json!({
        "command": command,
        "error": reason,
        "error_kind": FailureKind::Validation.as_str(),
        "success": false,
    });
    ToolCallResponse::new(format!("❌ Invalid command: {reason}"), &payload)
}

fn completed(command: &str, result: &ExecutionResult) -> ToolCallResponse {
    let output = normalize(result);
    let success = result.success();
    info!(
        %command,
        exit_code = result.exit_code,
        format = output.format.as_str(),
        "command completed"
    );

    let message = if success {
        let body = output
            .displayable()
            .and_then(|doc| serde_json::to_string_pretty(doc).ok())
            .map_or_else(|| fenced("", &result.stdout), |pretty| fenced("json", &pretty));
        format!("✅ Command executed successfully:\n\n{body}")
    } else {
        format!(
            "❌ Command failed with return code {}:\n\n{}",
            result.exit_code,
            fenced("", &result.stderr)
        )
    };

    let mut payload = json!({
        "command": command,
        "return_code": result.exit_code,
        "stdout": result.stdout,
        "stderr": result.stderr,
        "success": success,
        "timed_out": false,
        "output_format": output.format,
        "parsed_output": output.structured,
    });
    if let Some(kind) = result.failure() {
        payload["error_kind"] = Value::from(kind.as_str());
    }
    ToolCallResponse::new(message, &payload)
}

fn timed_out(command: &str, secs: u64) -> ToolCallResponse {
    let payload = json!({
        "command": command,
        "error": format!("Command execution timeout ({secs}s)"),
        "error_kind": FailureKind::Timeout.as_str(),
        "timed_out": true,
        "success": false,
    });
    ToolCallResponse::new(
        format!("⏱️ Command timed out after {secs} seconds:\n`{command}`"),
        &payload,
    )
}

fn exec_failed(command: &str, err: &ExecError) -> ToolCallResponse {
    warn!(%command, error = %err, "command could not run");
    let payload = json!({
        "command": command,
        "error": err.to_string(),
        "error_kind": err.kind().as_str(),
        "success": false,
    });
    let message = match err {
        ExecError::BinaryNotFound { program } => format!(
            "❌ Error: {program} command not found.\nPlease ensure {program} is installed and available in your PATH."
        ),
        _ => format!("❌ Unexpected error executing command:\n{err}"),
    };
    ToolCallResponse::new(message, &payload)
}
