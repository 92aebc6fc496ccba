//! Backend-neutral conversation types.

use kube_proto::ToolDescriptor;
use serde_json::Value;

use crate::error::ModelError;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The operator, or tool results sent on their behalf.
    User,
    /// The model.
    Assistant,
}

impl Role {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One piece of a message.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    /// Prose.
    Text(String),
    /// The model asks for a tool invocation.
    ToolUse {
        /// Correlates the eventual result.
        id: String,
        /// Tool name.
        name: String,
        /// Tool arguments.
        input: Value,
    },
    /// Outcome of a tool invocation.
    ToolResult {
        /// The `ToolUse` this answers.
        tool_use_id: String,
        /// Human-readable summary.
        text: String,
        /// Machine payload, when the tool returned one.
        json: Option<Value>,
        /// The invocation failed.
        is_error: bool,
    },
}

impl ContentBlock {
    /// Text block from anything string-like.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Rough serialized size, used to budget conversation history.
    pub fn approx_bytes(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::ToolUse { id, name, input } => id.len() + name.len() + input.to_string().len(),
            Self::ToolResult {
                tool_use_id,
                text,
                json,
                ..
            } => tool_use_id.len() + text.len() + json.as_ref().map_or(0, |doc| doc.to_string().len()),
        }
    }
}

/// A turn in the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Author.
    pub role: Role,
    /// Ordered content.
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// Plain user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Plain assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Concatenated text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Rough serialized size of all blocks.
    pub fn approx_bytes(&self) -> usize {
        self.content.iter().map(ContentBlock::approx_bytes).sum()
    }

    /// Whether this message opens a new exchange: operator words rather
    /// than tool results. History can only be cut in front of such a message
    /// without orphaning a tool result.
    pub fn starts_turn(&self) -> bool {
        self.role == Role::User
            && !self
                .content
                .iter()
                .any(|b| matches!(b, ContentBlock::ToolResult { .. }))
    }

    /// Tool invocations requested in this message, as `(id, name, input)`.
    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.content.iter().filter_map(|b| match b {
            ContentBlock::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
            _ => None,
        })
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Finished its answer.
    EndTurn,
    /// Waiting for tool results.
    ToolUse,
    /// Ran out of output budget.
    MaxTokens,
    /// Anything else the backend reports.
    Other(String),
}

impl StopReason {
    /// Map a backend stop reason.
    pub fn parse(reason: &str) -> Self {
        match reason {
            "end_turn" | "stop_sequence" => Self::EndTurn,
            "tool_use" => Self::ToolUse,
            "max_tokens" => Self::MaxTokens,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Token accounting for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    /// Prompt tokens.
    pub input_tokens: u64,
    /// Generated tokens.
    pub output_tokens: u64,
}

/// What the model said.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelReply {
    /// The assistant message.
    pub message: Message,
    /// Why generation stopped.
    pub stop_reason: StopReason,
    /// Token usage.
    pub usage: Usage,
}

/// One model call.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    /// System prompt.
    pub system: &'a str,
    /// Conversation so far, oldest first.
    pub messages: &'a [Message],
    /// Tools the model may request.
    pub tools: &'a [ToolDescriptor],
    /// Output budget.
    pub max_tokens: u32,
}

/// A chat model that can request tool invocations.
#[allow(async_fn_in_trait)]
pub trait ChatModel {
    /// Continue the conversation by one assistant message.
    async fn converse(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError>;
}
