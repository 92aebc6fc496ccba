//! Tool invocation server.
//!
//! [`ToolServer`] is transport-agnostic: [`ToolServer::call`] turns one
//! decoded tool call into one response, and [`ToolServer::handle`] does the
//! same for a JSON-RPC frame. No state is carried between calls.

use serde_json::{Value, json};
use tracing::{debug, info};

use kube_proto::{
    CallToolParams, InitializeResult, ListToolsResult, Method, PROTOCOL_VERSION, Request, Response,
    ServerInfo, ToolCallRequest, ToolCallResponse, ToolDescriptor, ToolName,
};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::executor::CommandExecutor;
use crate::tools;
use crate::validator::{CommandValidator, KUBECTL};

/// Name announced in `serverInfo`.
pub const SERVER_NAME: &str = "kubernetes-cli-server";

/// Serves the kubectl tools.
#[derive(Debug, Clone)]
pub struct ToolServer {
    config: ServerConfig,
    validator: CommandValidator,
    executor: CommandExecutor,
}

impl Default for ToolServer {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl ToolServer {
    /// Create a server from configuration.
    pub fn new(config: ServerConfig) -> Self {
        let validator = CommandValidator::new(KUBECTL, &config.destructive_verbs);
        let executor = CommandExecutor::new(&config.kubectl);
        Self {
            config,
            validator,
            executor,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub(crate) fn validator(&self) -> &CommandValidator {
        &self.validator
    }

    pub(crate) fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    /// Descriptors for every registered tool.
    pub fn tools() -> Vec<ToolDescriptor> {
        ToolName::ALL.into_iter().map(ToolName::descriptor).collect()
    }

    /// Run one tool call. Always yields exactly one response.
    pub async fn call(&self, request: ToolCallRequest) -> ToolCallResponse {
        let tool = request.tool;
        let response = tools::dispatch(self, request).await;
        info!(%tool, success = response.success(), "tool call finished");
        response
    }

    /// Handle one JSON-RPC frame. Notifications yield `None`.
    pub async fn handle(&self, request: Request) -> Option<Response> {
        let Some(id) = request.id else {
            debug!(method = %request.method, "notification");
            return None;
        };

        match self.dispatch(&request.method, request.params).await {
            Ok(result) => Some(Response::success(id, result)),
            Err(e) => {
                debug!(method = %request.method, error = %e, "request failed");
                Some(Response::error(id, e.code(), e.to_string()))
            }
        }
    }

    async fn dispatch(&self, method: &str, params: Value) -> ServerResult<Value> {
        let Some(method) = Method::parse(method) else {
            return Err(ServerError::MethodNotFound(method.to_string()));
        };

        match method {
            Method::Initialize => {
                let result = InitializeResult {
                    protocol_version: params
                        .get("protocolVersion")
                        .and_then(Value::as_str)
                        .unwrap_or(PROTOCOL_VERSION)
                        .to_string(),
                    capabilities: json!({"tools": {}}),
                    server_info: ServerInfo {
                        name: SERVER_NAME.to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    },
                };
                Ok(serde_json::to_value(result)?)
            }
            // Answered like a ping if a client sends it with an id.
            Method::Initialized | Method::Ping => Ok(json!({})),
            Method::ListTools => Ok(serde_json::to_value(ListToolsResult {
                tools: Self::tools(),
            })?),
            Method::CallTool => {
                let params: CallToolParams = serde_json::from_value(params)
                    .map_err(|e| ServerError::InvalidParams(e.to_string()))?;
                let request = ToolCallRequest::try_from(params)?;
                Ok(serde_json::to_value(self.call(request).await)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube_proto::rpc::{INVALID_PARAMS, METHOD_NOT_FOUND};

    fn request(id: u64, method: &str, params: Value) -> Request {
        Request {
            jsonrpc: "2.0".into(),
            id: Some(Value::from(id)),
            method: method.into(),
            params,
        }
    }

    #[tokio::test]
    async fn initialize_echoes_protocol_version() {
        let resp = ToolServer::default()
            .handle(request(1, "initialize", json!({"protocolVersion": "2025-03-26"})))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
    }

    #[tokio::test]
    async fn lists_exactly_two_tools() {
        let resp = ToolServer::default()
            .handle(request(2, "tools/list", Value::Null))
            .await
            .unwrap();
        let result: ListToolsResult = serde_json::from_value(resp.result.unwrap()).unwrap();
        let names: Vec<_> = result.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["run_kubectl_command", "kubectl_context"]);
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let resp = ToolServer::default()
            .handle(Request::notification(Method::Initialized))
            .await;
        assert!(resp.is_none());
    }

    #[tokio::test]
    async fn unknown_method() {
        let resp = ToolServer::default()
            .handle(request(3, "resources/list", Value::Null))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, METHOD_NOT_FOUND);
        assert_eq!(resp.id, json!(3));
    }

    #[tokio::test]
    async fn unknown_tool_is_invalid_params() {
        let resp = ToolServer::default()
            .handle(request(4, "tools/call", json!({"name": "kubernetes", "arguments": {}})))
            .await
            .unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.code, INVALID_PARAMS);
        assert!(err.message.contains("unknown tool: kubernetes"));
    }

    #[tokio::test]
    async fn tool_call_result_has_dual_representation() {
        let resp = ToolServer::default()
            .handle(request(
                5,
                "tools/call",
                json!({"name": "run_kubectl_command", "arguments": {"command": "get pods"}}),
            ))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(result["content"][0]["type"], "text");
        let payload: Value = serde_json::from_str(result["result"].as_str().unwrap()).unwrap();
        assert_eq!(payload["success"], false);
    }
}
