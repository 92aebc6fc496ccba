//! Tool handlers.
//!
//! Dispatches a decoded [`ToolCallRequest`] to the handler for its tool.
//! Handlers never fail: every outcome, including bad arguments, is rendered
//! into a [`ToolCallResponse`].

use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use kube_proto::{ToolCallRequest, ToolCallResponse, ToolName};

use crate::error::FailureKind;
use crate::server::ToolServer;

pub mod command;
pub mod context;

/// Run one tool call through its pipeline.
pub async fn dispatch(server: &ToolServer, request: ToolCallRequest) -> ToolCallResponse {
    match request.tool {
        ToolName::RunKubectlCommand => command::run(server, request.arguments).await,
        ToolName::KubectlContext => context::run(server, request.arguments).await,
    }
}

// ─────────────────────────────────────────────────────────────
// Helper functions
// ─────────────────────────────────────────────────────────────

/// Parse arguments into a typed struct
pub(crate) fn parse_args<T: DeserializeOwned>(
    tool: ToolName,
    arguments: Map<String, Value>,
) -> Result<T, ToolCallResponse> {
    serde_json::from_value(Value::Object(arguments)).map_err(|e| {
        let payload = json!({
            "tool": tool.as_str(),
            "error": e.to_string(),
            "error_kind": FailureKind::InvalidArguments.as_str(),
            "success": false,
        });
        ToolCallResponse::new(format!("❌ Invalid arguments for {tool}: {e}"), &payload)
    })
}

/// Fence `body` for display, keeping a trailing newline out of the block.
pub(crate) fn fenced(lang: &str, body: &str) -> String {
    format!("```{lang}\n{}\n```", body.trim_end_matches('\n'))
}
