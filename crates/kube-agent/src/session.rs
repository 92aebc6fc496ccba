//! The agent session: one model, one tool server, one conversation.

use std::fmt;
use std::time::Instant;

use kube_proto::{ToolCallResponse, ToolDescriptor};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{SessionError, TransportError};
use crate::model::{ChatModel, ContentBlock, Message, ModelRequest, Role, StopReason};
use crate::prompt::SYSTEM_PROMPT;
use crate::transport::ToolTransport;

/// Lifecycle of an [`AgentSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not yet connected.
    Uninitialized,
    /// Waiting for the next utterance.
    Ready,
    /// Resolving an utterance.
    Dispatching,
    /// Tearing down the transport.
    Closing,
    /// Done.
    Closed,
}

impl SessionState {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::Dispatching => "dispatching",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Appended to an answer the model stopped writing at its output limit.
pub const TRUNCATED_ANSWER_NOTE: &str = "\n\n⚠️  Answer cut off: the model reached its output token limit.";

/// Session tuning.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// System instruction.
    pub system_prompt: String,
    /// Output budget per model call.
    pub max_tokens: u32,
    /// Model/tool round trips allowed per utterance.
    pub max_tool_rounds: usize,
    /// Approximate size history is trimmed back to after each utterance.
    /// The newest exchange is always kept, even if it alone is larger.
    pub history_budget_bytes: usize,
    /// Longest tool output kept in history; longer output is cut.
    pub max_tool_output_bytes: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            system_prompt: SYSTEM_PROMPT.to_string(),
            max_tokens: 4096,
            max_tool_rounds: 16,
            history_budget_bytes: 400_000,
            max_tool_output_bytes: 16_000,
        }
    }
}

/// Drives a conversation between a model and a tool server.
///
/// The session holds the transport exclusively until [`AgentSession::close`].
/// Each utterance is resolved completely, including every tool round trip,
/// before the next one is accepted.
pub struct AgentSession<M, T> {
    model: M,
    transport: Option<T>,
    tools: Vec<ToolDescriptor>,
    history: Vec<Message>,
    options: SessionOptions,
    state: SessionState,
}

impl<M, T> fmt::Debug for AgentSession<M, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentSession")
            .field("state", &self.state)
            .field("tools", &self.tools.len())
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl<M: ChatModel, T: ToolTransport> AgentSession<M, T> {
    /// Enumerate the server's tools and become ready.
    ///
    /// On failure the transport is shut down before the error is returned.
    pub async fn start(model: M, mut transport: T, options: SessionOptions) -> Result<Self, SessionError> {
        debug!(state = %SessionState::Uninitialized, "starting session");
        let tools = match transport.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                if let Err(teardown) = transport.shutdown().await {
                    warn!(error = %teardown, "transport teardown failed");
                }
                return Err(e.into());
            }
        };

        info!(
            tools = ?tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "session ready"
        );
        Ok(Self {
            model,
            transport: Some(transport),
            tools,
            history: Vec::new(),
            options,
            state: SessionState::Ready,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Tools advertised to the model.
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Conversation so far, after trimming.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Resolve one utterance into the model's final answer.
    ///
    /// On error the conversation is left as it was before the call. On
    /// success the oldest exchanges are dropped until history fits its budget.
    pub async fn ask(&mut self, utterance: &str) -> Result<String, SessionError> {
        if self.state != SessionState::Ready {
            return Err(SessionError::NotReady(self.state.as_str()));
        }

        let checkpoint = self.history.len();
        self.state = SessionState::Dispatching;
        self.history.push(Message::user(utterance));

        let started = Instant::now();
        let result = self.dispatch().await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &result {
            Ok(_) => {
                debug!(elapsed_ms, "utterance resolved");
                self.trim_history();
            }
            Err(e) => {
                warn!(elapsed_ms, error = %e, "utterance failed");
                self.history.truncate(checkpoint);
            }
        }
        self.state = SessionState::Ready;
        result
    }

    async fn dispatch(&mut self) -> Result<String, SessionError> {
        let mut rounds = 0;
        loop {
            let reply = self
                .model
                .converse(ModelRequest {
                    system: &self.options.system_prompt,
                    messages: &self.history,
                    tools: &self.tools,
                    max_tokens: self.options.max_tokens,
                })
                .await?;

            let calls: Vec<(String, String, Value)> = reply
                .message
                .tool_uses()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();
            let mut answer = reply.message.text();
            self.history.push(reply.message);

            if calls.is_empty() {
                if reply.stop_reason == StopReason::MaxTokens {
                    warn!(max_tokens = self.options.max_tokens, "answer hit the output token limit");
                    answer.push_str(TRUNCATED_ANSWER_NOTE);
                }
                return Ok(answer);
            }
            if rounds == self.options.max_tool_rounds {
                return Err(SessionError::ToolRoundLimit(rounds));
            }
            rounds += 1;

            let mut results = Vec::with_capacity(calls.len());
            for (id, name, input) in calls {
                results.push(self.invoke(id, &name, input).await?);
            }
            self.history.push(Message {
                role: Role::User,
                content: results,
            });
        }
    }

    /// Run one tool call. Failures become error results unless the transport is gone.
    async fn invoke(&mut self, id: String, name: &str, input: Value) -> Result<ContentBlock, SessionError> {
        let transport = self
            .transport
            .as_mut()
            .ok_or(SessionError::NotReady(SessionState::Closed.as_str()))?;
        let started = Instant::now();
        let outcome = transport.call_tool(name, input).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(response) => {
                info!(tool = name, success = response.success(), elapsed_ms, "tool call finished");
                let (text, json) = history_entry(&response, self.options.max_tool_output_bytes);
                Ok(ContentBlock::ToolResult {
                    tool_use_id: id,
                    text,
                    json,
                    is_error: response.is_error,
                })
            }
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                warn!(tool = name, error = %e, elapsed_ms, "tool call failed");
                Ok(ContentBlock::ToolResult {
                    tool_use_id: id,
                    text: format!("❌ Tool call failed: {e}"),
                    json: None,
                    is_error: true,
                })
            }
        }
    }

    /// Drop whole exchanges from the front until history fits its budget.
    ///
    /// Cuts land only in front of an operator message, so every tool use
    /// stays next to its result and history still opens with the user.
    fn trim_history(&mut self) {
        let budget = self.options.history_budget_bytes;
        let mut total: usize = self.history.iter().map(Message::approx_bytes).sum();
        let mut cut = 0;
        while total > budget {
            let Some(next) = self.history[cut + 1..]
                .iter()
                .position(Message::starts_turn)
                .map(|offset| cut + 1 + offset)
            else {
                break;
            };
            total -= self.history[cut..next].iter().map(Message::approx_bytes).sum::<usize>();
            cut = next;
        }
        if cut > 0 {
            self.history.drain(..cut);
            info!(dropped = cut, kept = self.history.len(), approx_bytes = total, "trimmed history");
        }
    }

    /// Tear down the transport. The session is closed whatever the outcome;
    /// closing again does nothing.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        let Some(transport) = self.transport.take() else {
            return Ok(());
        };
        self.state = SessionState::Closing;
        debug!(state = %self.state, "closing session");
        let result = transport.shutdown().await;
        if let Err(e) = &result {
            warn!(error = %e, "transport teardown failed");
        }
        self.state = SessionState::Closed;
        debug!(state = %self.state, "session closed");
        result
    }
}

/// What history keeps of a tool response.
///
/// With a payload, the prose is reduced to its headline since the payload
/// carries the same output, and long payload strings are cut. Without one the
/// prose itself is cut.
fn history_entry(response: &ToolCallResponse, limit: usize) -> (String, Option<Value>) {
    let text = response.text();
    match response.payload() {
        Ok(mut payload) => {
            if let Value::Object(fields) = &mut payload {
                compact_payload(fields, limit);
            }
            let headline = text.lines().next().unwrap_or_default().to_string();
            (headline, Some(payload))
        }
        Err(_) => (truncate_output(&text, limit), None),
    }
}

fn compact_payload(fields: &mut Map<String, Value>, limit: usize) {
    let parsed_len = fields
        .get("parsed_output")
        .filter(|doc| !doc.is_null())
        .map(|doc| doc.to_string().len());
    match parsed_len {
        // The parsed document is stdout already.
        Some(len) if len <= limit => {
            fields.remove("stdout");
        }
        Some(_) => {
            fields.insert("parsed_output".to_string(), Value::Null);
        }
        None => {}
    }
    for value in fields.values_mut() {
        if let Value::String(s) = value {
            if s.len() > limit {
                *s = truncate_output(s, limit);
            }
        }
    }
}

/// Cut `text` to at most `limit` bytes on a char boundary, noting the cut.
pub fn truncate_output(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}\n\n[Output truncated: {} bytes total, showing first {end}. Use a more specific query for full results.]",
        &text[..end],
        text.len()
    )
}
