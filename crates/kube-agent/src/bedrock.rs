//! Amazon Bedrock Converse API backend.
//!
//! Authenticates with a Bedrock API key sent as a bearer token, so no
//! request signing is needed.

use std::time::Duration;

use reqwest::Url;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::{ConfigError, ModelError};
use crate::model::{ChatModel, ContentBlock, Message, ModelReply, ModelRequest, Role, StopReason, Usage};

/// Upper bound on a single Converse call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Bedrock Converse client.
#[derive(Debug, Clone)]
pub struct BedrockModel {
    client: reqwest::Client,
    url: Url,
    token: String,
}

impl BedrockModel {
    /// Client for `model_id` behind `endpoint`.
    pub fn new(endpoint: &str, model_id: &str, token: impl Into<String>) -> Result<Self, ConfigError> {
        let url = converse_url(endpoint, model_id)?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::InvalidEndpoint(e.to_string()))?;
        Ok(Self {
            client,
            url,
            token: token.into(),
        })
    }
}

impl ChatModel for BedrockModel {
    async fn converse(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError> {
        let body = to_converse_body(&request);
        debug!(messages = request.messages.len(), "calling bedrock converse");

        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ModelError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let payload: Value = serde_json::from_str(&body)
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        let reply = parse_converse_response(&payload)?;
        debug!(
            stop_reason = ?reply.stop_reason,
            input_tokens = reply.usage.input_tokens,
            output_tokens = reply.usage.output_tokens,
            "bedrock reply"
        );
        Ok(reply)
    }
}

/// Pull `message` out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("Message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// `{endpoint}/model/{model_id}/converse`, with the model id path-encoded.
pub fn converse_url(endpoint: &str, model_id: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| ConfigError::InvalidEndpoint(endpoint.to_string()))?
        .pop_if_empty()
        .extend(["model", model_id, "converse"]);
    Ok(url)
}

/// Build the Converse request body.
pub fn to_converse_body(request: &ModelRequest<'_>) -> Value {
    let messages: Vec<Value> = request.messages.iter().map(message_to_json).collect();

    let mut body = json!({
        "messages": messages,
        "inferenceConfig": { "maxTokens": request.max_tokens },
    });
    if !request.system.is_empty() {
        body["system"] = json!([{ "text": request.system }]);
    }
    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "toolSpec": {
                        "name": t.name,
                        "description": t.description,
                        "inputSchema": { "json": t.input_schema },
                    }
                })
            })
            .collect();
        body["toolConfig"] = json!({ "tools": tools });
    }
    body
}

fn message_to_json(message: &Message) -> Value {
    let content: Vec<Value> = message.content.iter().map(block_to_json).collect();
    json!({ "role": message.role.as_str(), "content": content })
}

fn block_to_json(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text(text) => json!({ "text": text }),
        ContentBlock::ToolUse { id, name, input } => json!({
            "toolUse": { "toolUseId": id, "name": name, "input": input }
        }),
        ContentBlock::ToolResult {
            tool_use_id,
            text,
            json,
            is_error,
        } => {
            let mut content = vec![json!({ "text": text })];
            // Converse only accepts objects in json blocks.
            if let Some(doc @ Value::Object(_)) = json {
                content.push(json!({ "json": doc }));
            }
            json!({
                "toolResult": {
                    "toolUseId": tool_use_id,
                    "content": content,
                    "status": if *is_error { "error" } else { "success" },
                }
            })
        }
    }
}

/// Decode a Converse response body.
pub fn parse_converse_response(payload: &Value) -> Result<ModelReply, ModelError> {
    let message = payload
        .pointer("/output/message")
        .ok_or_else(|| ModelError::InvalidResponse("missing output.message".into()))?;

    let role = match message.get("role").and_then(Value::as_str) {
        Some("user") => Role::User,
        _ => Role::Assistant,
    };

    let blocks = message
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| ModelError::InvalidResponse("missing message content".into()))?;

    let mut content = Vec::with_capacity(blocks.len());
    for block in blocks {
        if let Some(text) = block.get("text").and_then(Value::as_str) {
            content.push(ContentBlock::text(text));
        } else if let Some(tool) = block.get("toolUse") {
            content.push(parse_tool_use(tool)?);
        } else {
            debug!(?block, "ignoring unsupported content block");
        }
    }

    let stop_reason = payload
        .get("stopReason")
        .and_then(Value::as_str)
        .map_or(StopReason::EndTurn, StopReason::parse);

    let usage = payload.get("usage").map_or_else(Usage::default, |u| Usage {
        input_tokens: u.get("inputTokens").and_then(Value::as_u64).unwrap_or(0),
        output_tokens: u.get("outputTokens").and_then(Value::as_u64).unwrap_or(0),
    });

    Ok(ModelReply {
        message: Message { role, content },
        stop_reason,
        usage,
    })
}

fn parse_tool_use(tool: &Value) -> Result<ContentBlock, ModelError> {
    let field = |name: &str| {
        tool.get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ModelError::InvalidResponse(format!("toolUse without {name}")))
    };
    Ok(ContentBlock::ToolUse {
        id: field("toolUseId")?,
        name: field("name")?,
        input: tool
            .get("input")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube_proto::ToolName;

    #[test]
    fn url_encodes_model_id() {
        let url = converse_url(
            "https://bedrock-runtime.us-east-1.amazonaws.com",
            "apac.anthropic.claude-3-5-sonnet-20241022-v2:0",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://bedrock-runtime.us-east-1.amazonaws.com/model/apac.anthropic.claude-3-5-sonnet-20241022-v2:0/converse"
        );

        let url = converse_url("http://localhost:9000/", "arn:aws:bedrock:x/y").unwrap();
        assert_eq!(url.path(), "/model/arn:aws:bedrock:x%2Fy/converse");
    }

    #[test]
    fn bad_endpoint_is_config_error() {
        assert!(matches!(
            converse_url("not a url", "m"),
            Err(ConfigError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn body_carries_system_tools_and_results() {
        let tools = [ToolName::RunKubectlCommand.descriptor()];
        let messages = [
            Message::user("list pods"),
            Message {
                role: Role::Assistant,
                content: vec![ContentBlock::ToolUse {
                    id: "t1".into(),
                    name: "run_kubectl_command".into(),
                    input: json!({"command": "kubectl get pods"}),
                }],
            },
            Message {
                role: Role::User,
                content: vec![ContentBlock::ToolResult {
                    tool_use_id: "t1".into(),
                    text: "✅ Command executed successfully".into(),
                    json: Some(json!({"success": true})),
                    is_error: false,
                }],
            },
        ];
        let body = to_converse_body(&ModelRequest {
            system: "be careful",
            messages: &messages,
            tools: &tools,
            max_tokens: 4096,
        });

        assert_eq!(body["system"][0]["text"], "be careful");
        assert_eq!(body["inferenceConfig"]["maxTokens"], 4096);
        assert_eq!(body["toolConfig"]["tools"][0]["toolSpec"]["name"], "run_kubectl_command");
        assert_eq!(
            body["toolConfig"]["tools"][0]["toolSpec"]["inputSchema"]["json"]["type"],
            "object"
        );
        assert_eq!(body["messages"][1]["content"][0]["toolUse"]["toolUseId"], "t1");
        let result = &body["messages"][2]["content"][0]["toolResult"];
        assert_eq!(result["status"], "success");
        assert_eq!(result["content"][1]["json"]["success"], true);
    }

    #[test]
    fn empty_system_and_tools_are_omitted() {
        let messages = [Message::user("hi")];
        let body = to_converse_body(&ModelRequest {
            system: "",
            messages: &messages,
            tools: &[],
            max_tokens: 16,
        });
        assert!(body.get("system").is_none());
        assert!(body.get("toolConfig").is_none());
    }

    #[test]
    fn parses_tool_use_reply() {
        let payload = json!({
            "output": {"message": {"role": "assistant", "content": [
                {"text": "Let me check."},
                {"toolUse": {"toolUseId": "abc", "name": "kubectl_context", "input": {"action": "get"}}}
            ]}},
            "stopReason": "tool_use",
            "usage": {"inputTokens": 10, "outputTokens": 5, "totalTokens": 15}
        });
        let reply = parse_converse_response(&payload).unwrap();
        assert_eq!(reply.stop_reason, StopReason::ToolUse);
        assert_eq!(reply.usage.output_tokens, 5);
        let uses: Vec<_> = reply.message.tool_uses().collect();
        assert_eq!(uses, [("abc", "kubectl_context", &json!({"action": "get"}))]);
    }

    #[test]
    fn error_body_message() {
        assert_eq!(
            error_message(r#"{"message":"The security token included in the request is invalid."}"#),
            "The security token included in the request is invalid."
        );
        assert_eq!(error_message("Service Unavailable\n"), "Service Unavailable");
    }

    #[test]
    fn missing_output_is_invalid() {
        let err = parse_converse_response(&json!({"stopReason": "end_turn"})).unwrap_err();
        assert!(matches!(err, ModelError::InvalidResponse(_)));
    }
}
