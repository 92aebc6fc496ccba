//! JSON-RPC framing.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::JSONRPC_VERSION;

/// JSON-RPC request or notification.
///
/// A frame without an `id` (or with `id: null`) is a notification and never
/// receives a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Request ID for correlation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Method name (e.g., "tools/list", "tools/call").
    pub method: String,
    /// Method parameters.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl Request {
    /// Create a request that expects a response.
    pub fn new(id: u64, method: Method, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(Value::from(id)),
            method: method.as_str().to_string(),
            params,
        }
    }

    /// Create a notification.
    pub fn notification(method: Method) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.as_str().to_string(),
            params: Value::Null,
        }
    }

    /// Whether this frame is a notification.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Request ID for correlation (`null` when the request could not be parsed).
    #[serde(default)]
    pub id: Value,
    /// Result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl Response {
    /// Create a success response.
    pub fn success(id: Value, result: impl Serialize) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(serde_json::to_value(result).unwrap_or(Value::Null)),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(ErrorObject {
                code,
                message: message.into(),
            }),
        }
    }

    /// Numeric id, if the peer used one.
    pub fn id_u64(&self) -> Option<u64> {
        self.id.as_u64()
    }
}

/// JSON-RPC error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
}

impl fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

// Standard JSON-RPC error codes
/// The line was not valid JSON.
pub const PARSE_ERROR: i32 = -32700;
/// The JSON was not a valid request object.
pub const INVALID_REQUEST: i32 = -32600;
/// Method is not served.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Parameters did not decode.
pub const INVALID_PARAMS: i32 = -32602;
/// Server-side fault.
pub const INTERNAL_ERROR: i32 = -32603;

/// Methods understood by the tool server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Handshake.
    Initialize,
    /// Client acknowledgement of the handshake (notification).
    Initialized,
    /// Liveness check.
    Ping,
    /// Enumerate tools.
    ListTools,
    /// Invoke one tool.
    CallTool,
}

impl Method {
    /// Every method, in handshake order.
    pub const ALL: [Self; 5] = [
        Self::Initialize,
        Self::Initialized,
        Self::Ping,
        Self::ListTools,
        Self::CallTool,
    ];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Initialized => "notifications/initialized",
            Self::Ping => "ping",
            Self::ListTools => "tools/list",
            Self::CallTool => "tools/call",
        }
    }

    /// Resolve a wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
