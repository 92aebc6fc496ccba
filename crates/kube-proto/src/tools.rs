//! Tool descriptors and tool-call payloads.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::ProtoError;

/// Tools registered by the kubectl server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    /// Free-form `kubectl ...` command.
    RunKubectlCommand,
    /// Get, list or switch the active kubeconfig context.
    KubectlContext,
}

impl ToolName {
    /// Every registered tool.
    pub const ALL: [Self; 2] = [Self::RunKubectlCommand, Self::KubectlContext];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RunKubectlCommand => "run_kubectl_command",
            Self::KubectlContext => "kubectl_context",
        }
    }

    /// Description shown to the model.
    pub fn description(self) -> &'static str {
        match self {
            Self::RunKubectlCommand => {
                "Execute a kubectl command and return its output. The command must include \
                 the 'kubectl' prefix, e.g. \"kubectl get pods -n default -o json\" or \
                 \"kubectl logs my-pod --tail=50\". Returns stdout, stderr, the exit code and, \
                 when the output is JSON, the parsed document."
            }
            Self::KubectlContext => {
                "Manage kubectl contexts. action='get' shows the current context, \
                 action='list' lists all contexts, action='use' switches to context_name \
                 (required for 'use')."
            }
        }
    }

    /// JSON Schema for the tool's arguments.
    pub fn input_schema(self) -> Value {
        match self {
            Self::RunKubectlCommand => json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "Full kubectl command to execute, starting with 'kubectl'."
                    }
                },
                "required": ["command"]
            }),
            Self::KubectlContext => json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["get", "list", "use"],
                        "default": "get",
                        "description": "'get' (current context), 'list' (all contexts) or 'use' (switch context)."
                    },
                    "context_name": {
                        "type": "string",
                        "description": "Context to switch to; required when action is 'use'."
                    }
                }
            }),
        }
    }

    /// Descriptor advertised through `tools/list`.
    pub fn descriptor(self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.as_str().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ProtoError::UnknownTool(s.to_string()))
    }
}

/// A tool as advertised to clients.
///
/// Names stay strings here: a client lists whatever the server offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// JSON Schema for arguments.
    #[serde(rename = "inputSchema", default = "empty_schema")]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

/// `tools/call` params as they appear on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Tool name.
    pub name: String,
    /// Tool arguments.
    #[serde(default)]
    pub arguments: Value,
}

/// A decoded call to one of the registered tools.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    /// Which tool.
    pub tool: ToolName,
    /// Arguments, keyed by parameter name.
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    /// Create a request.
    pub fn new(tool: ToolName, arguments: Map<String, Value>) -> Self {
        Self { tool, arguments }
    }

    /// Convenience constructor for tests and callers holding a JSON object.
    pub fn with_args(tool: ToolName, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { tool, arguments }
    }
}

impl TryFrom<CallToolParams> for ToolCallRequest {
    type Error = ProtoError;

    fn try_from(params: CallToolParams) -> Result<Self, Self::Error> {
        let tool = params.name.parse()?;
        let arguments = match params.arguments {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ProtoError::Decoding(format!(
                    "arguments must be an object, got {other}"
                )));
            }
        };
        Ok(Self { tool, arguments })
    }
}

/// One block of human-readable tool output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
}

/// Result of a `tools/call`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResponse {
    /// Prose for a text-oriented consumer.
    pub content: Vec<Content>,
    /// JSON-encoded machine payload.
    pub result: String,
    /// True when the payload reports `success: false`.
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl ToolCallResponse {
    /// Build a response from a summary and a machine payload.
    ///
    /// `is_error` is derived from the payload's `success` field; a payload
    /// without one counts as a failure.
    pub fn new(summary: impl Into<String>, payload: &Value) -> Self {
        let success = payload
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Self {
            content: vec![Content::Text {
                text: summary.into(),
            }],
            result: serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string()),
            is_error: !success,
        }
    }

    /// Whether the call succeeded.
    pub fn success(&self) -> bool {
        !self.is_error
    }

    /// All text blocks joined by newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                Content::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Decode the machine payload.
    pub fn payload(&self) -> Result<Value, ProtoError> {
        Ok(serde_json::from_str(&self.result)?)
    }
}

/// Identity returned by `initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

/// `initialize` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeResult {
    /// Negotiated protocol revision.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Capability advertisement.
    #[serde(default)]
    pub capabilities: Value,
    /// Server identity.
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// `tools/list` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// Advertised tools.
    pub tools: Vec<ToolDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn tool_names_round_trip_through_serde() {
        for tool in ToolName::ALL {
            let json = serde_json::to_value(tool).unwrap();
            assert_eq!(json, Value::String(tool.as_str().to_string()));
            assert_eq!(tool.as_str().parse::<ToolName>().unwrap(), tool);
        }
    }

    #[test]
    fn unknown_tool_name_rejected() {
        let err = "kubernetes".parse::<ToolName>().unwrap_err();
        assert!(matches!(err, ProtoError::UnknownTool(name) if name == "kubernetes"));
    }

    #[test]
    fn descriptors_use_wire_field_names() {
        let value = serde_json::to_value(ToolName::KubectlContext.descriptor()).unwrap();
        assert_eq!(value["name"], "kubectl_context");
        assert!(value["inputSchema"]["properties"]["action"].is_object());
    }

    #[test]
    fn descriptor_without_schema_gets_empty_object() {
        let desc: ToolDescriptor = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert_eq!(desc.input_schema["type"], "object");
        assert_eq!(desc.description, "");
    }

    #[test]
    fn call_params_decode_into_request() {
        let params: CallToolParams = serde_json::from_value(json!({
            "name": "run_kubectl_command",
            "arguments": {"command": "kubectl get pods"}
        }))
        .unwrap();
        let req = ToolCallRequest::try_from(params).unwrap();
        assert_eq!(req.tool, ToolName::RunKubectlCommand);
        assert_eq!(req.arguments["command"], "kubectl get pods");
    }

    #[test]
    fn call_params_without_arguments_decode_to_empty_map() {
        let params: CallToolParams =
            serde_json::from_value(json!({"name": "kubectl_context"})).unwrap();
        let req = ToolCallRequest::try_from(params).unwrap();
        assert!(req.arguments.is_empty());
    }

    #[test]
    fn call_params_with_scalar_arguments_rejected() {
        let params = CallToolParams {
            name: "kubectl_context".into(),
            arguments: json!("get"),
        };
        assert!(matches!(
            ToolCallRequest::try_from(params),
            Err(ProtoError::Decoding(_))
        ));
    }

    #[test]
    fn response_error_flag_follows_payload_success() {
        let ok = ToolCallResponse::new("fine", &json!({"success": true}));
        assert!(ok.success());
        let failed = ToolCallResponse::new("nope", &json!({"success": false}));
        assert!(failed.is_error);
        let missing = ToolCallResponse::new("?", &json!({}));
        assert!(missing.is_error);
    }

    #[test]
    fn response_serializes_dual_representation() {
        let resp = ToolCallResponse::new("✅ done", &json!({"success": true, "stdout": "x"}));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][0]["text"], "✅ done");
        assert_eq!(value["isError"], false);
        let payload: Value = serde_json::from_str(value["result"].as_str().unwrap()).unwrap();
        assert_eq!(payload["stdout"], "x");
    }

    proptest! {
        #[test]
        fn prop_payload_survives_response(stdout in ".*", code in any::<i32>()) {
            let payload = json!({"success": code == 0, "stdout": stdout, "return_code": code});
            let resp = ToolCallResponse::new("summary", &payload);
            prop_assert_eq!(resp.payload().unwrap(), payload);
            prop_assert_eq!(resp.success(), code == 0);
        }
    }
}
