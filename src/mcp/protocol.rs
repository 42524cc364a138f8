//! JSON-RPC 2.0 message types for MCP protocol.
//!
//! This module defines the three message shapes exchanged on the wire and
//! the envelope rules they share.
//!
//! # Message Types
//!
//! - **Request**: A call from the client. Without an `id` it is a
//!   *notification* and never receives a reply.
//! - **Response**: A successful reply carrying a `result`.
//! - **Error response**: A failed reply carrying an `error` object. Its `id`
//!   is `null` when the request ID could not be determined.
//!
//! # MCP-Specific Constraints
//!
//! - Request IDs must be strings or integers (never `null`)
//! - `params`, when present, must be an object

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::MessageError;

/// The MCP protocol version this implementation supports.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// The JSON-RPC version tag carried by every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Server name for capability negotiation.
pub const SERVER_NAME: &str = "mcp-tool-host";

/// A JSON-RPC 2.0 request ID.
///
/// Per the MCP specification, IDs must be strings or integers, never `null`.
/// Numeric IDs must fit in an `i64`; larger integers such as
/// `18446744073709551615` are rejected as invalid requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric request ID.
    Number(i64),
    /// String request ID.
    String(String),
}

impl RequestId {
    /// Converts a JSON value into a request ID.
    ///
    /// Returns `None` for anything other than a string or an integer that
    /// fits in an `i64`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Number),
            Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

/// A message that can be written to the wire.
///
/// `serde_json` leaves forward slashes unescaped, so paths and URLs in
/// payloads stay readable.
pub trait WireMessage: Serialize {
    /// Serialises the message as a single line of JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if a payload value cannot be serialised.
    fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Decodes text into a JSON object.
///
/// # Errors
///
/// Returns [`MessageError::Parse`] if the text is not valid JSON or is valid
/// JSON that is not an object (an array or a scalar).
pub fn parse_object(text: &str) -> Result<Map<String, Value>, MessageError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| MessageError::Parse(e.to_string()))?;

    match value {
        Value::Object(obj) => Ok(obj),
        _ => Err(MessageError::Parse(
            "message must be a JSON object".to_string(),
        )),
    }
}

/// Checks that the object carries `"jsonrpc": "2.0"`.
///
/// # Errors
///
/// Returns [`MessageError::InvalidRequest`] if the field is missing or has
/// any other value.
pub fn validate_envelope(obj: &Map<String, Value>) -> Result<(), MessageError> {
    match obj.get("jsonrpc").and_then(Value::as_str) {
        Some(JSONRPC_VERSION) => Ok(()),
        _ => Err(MessageError::invalid("jsonrpc field must be \"2.0\"")),
    }
}

/// Extracts an optional ID field.
fn parse_id(value: Option<&Value>) -> Result<Option<RequestId>, MessageError> {
    value
        .map(|v| {
            RequestId::from_value(v)
                .ok_or_else(|| MessageError::invalid("id must be a string or an integer"))
        })
        .transpose()
}

/// A JSON-RPC 2.0 request message.
///
/// A request without an `id` is a notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcRequest {
    /// Always "2.0".
    pub jsonrpc: &'static str,

    /// Request identifier, absent for notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,

    /// The method to invoke.
    pub method: String,

    /// Optional parameters for the method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

impl JsonRpcRequest {
    /// Creates a new request.
    #[must_use]
    pub fn new(
        id: Option<RequestId>,
        method: impl Into<String>,
        params: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.into(),
            params,
        }
    }

    /// Parses and validates a request from wire text.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Parse`] for malformed JSON and
    /// [`MessageError::InvalidRequest`] for a well-formed message of the
    /// wrong shape.
    pub fn from_text(text: &str) -> Result<Self, MessageError> {
        Self::from_object(parse_object(text)?)
    }

    /// Validates a decoded JSON object as a request.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::InvalidRequest`] if the envelope is wrong, the
    /// `id` is not a string or integer, `method` is missing, empty or not a
    /// string, or `params` is present but not an object. Once the `id` has
    /// been read it is carried in the error.
    pub fn from_object(mut obj: Map<String, Value>) -> Result<Self, MessageError> {
        validate_envelope(&obj)?;

        let id = parse_id(obj.get("id"))?;

        let method = match obj.remove("method") {
            Some(Value::String(method)) if !method.is_empty() => method,
            Some(Value::String(_)) => {
                return Err(MessageError::InvalidRequest {
                    id,
                    reason: "method field cannot be empty".to_string(),
                })
            }
            _ => {
                return Err(MessageError::InvalidRequest {
                    id,
                    reason: "method field must be a string".to_string(),
                })
            }
        };

        let params = match obj.remove("params") {
            None => None,
            Some(Value::Object(params)) => Some(params),
            Some(_) => {
                return Err(MessageError::InvalidRequest {
                    id,
                    reason: "params field must be an object".to_string(),
                })
            }
        };

        Ok(Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        })
    }

    /// Returns `true` if this request has no ID.
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

impl WireMessage for JsonRpcRequest {}

/// A successful JSON-RPC 2.0 response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcResponse {
    /// Always "2.0".
    pub jsonrpc: &'static str,

    /// The request ID this response corresponds to.
    pub id: RequestId,

    /// The result of the method call.
    pub result: Value,
}

impl JsonRpcResponse {
    /// Creates a new success response.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Value is not const-compatible
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
        }
    }

    /// Validates a decoded JSON object as a response.
    ///
    /// The `result` key must be present; a `null` value is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::InvalidRequest`] if the envelope is wrong or
    /// `id` or `result` is missing.
    pub fn from_object(mut obj: Map<String, Value>) -> Result<Self, MessageError> {
        validate_envelope(&obj)?;

        let id = parse_id(obj.get("id"))?
            .ok_or_else(|| MessageError::invalid("response id is required"))?;

        let result = obj
            .remove("result")
            .ok_or_else(|| MessageError::invalid("result field is required"))?;

        Ok(Self::success(id, result))
    }
}

impl WireMessage for JsonRpcResponse {}

/// Standard JSON-RPC 2.0 error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON was received by the server.
    ParseError,
    /// The JSON sent is not a valid Request object.
    InvalidRequest,
    /// The method does not exist or is not available.
    MethodNotFound,
    /// Invalid method parameters.
    InvalidParams,
    /// Internal JSON-RPC error.
    InternalError,
    /// Server-defined error in the reserved -32099..=-32000 band.
    ServerError(i32),
}

impl ErrorCode {
    /// The reserved band for implementation-defined server errors.
    pub const SERVER_ERROR_RANGE: std::ops::RangeInclusive<i32> = -32099..=-32000;

    /// Returns the numeric code for this error.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError(code) => code,
        }
    }

    /// Returns the default message for this error code.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::ServerError(_) => "Server error",
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcErrorData {
    /// The error code.
    pub code: i32,

    /// A short description of the error.
    pub message: String,

    /// Additional information about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorData {
    /// Creates a new error from an error code.
    #[must_use]
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code: code.code(),
            message: code.default_message().to_string(),
            data: None,
        }
    }

    /// Creates a new error with a custom message.
    #[must_use]
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    /// Adds additional data to the error.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A JSON-RPC 2.0 error response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcError {
    /// Always "2.0".
    pub jsonrpc: &'static str,

    /// The request ID this error corresponds to, `null` if unknown.
    pub id: Option<RequestId>,

    /// The error details.
    pub error: JsonRpcErrorData,
}

impl JsonRpcError {
    /// Creates a new error response.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // JsonRpcErrorData contains String
    pub fn new(id: Option<RequestId>, error: JsonRpcErrorData) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            error,
        }
    }

    /// Creates an error response with the code's default message and a
    /// textual detail in `data`.
    #[must_use]
    pub fn with_detail(id: Option<RequestId>, code: ErrorCode, detail: impl Into<String>) -> Self {
        Self::new(
            id,
            JsonRpcErrorData::from_code(code).with_data(Value::String(detail.into())),
        )
    }

    /// Creates a method not found error response.
    #[must_use]
    pub fn method_not_found(id: RequestId, method: &str) -> Self {
        Self::with_detail(
            Some(id),
            ErrorCode::MethodNotFound,
            format!("Method not found: {method}"),
        )
    }

    /// Creates an internal error response.
    #[must_use]
    pub fn internal_error(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self::with_detail(id, ErrorCode::InternalError, message)
    }

    /// Validates a decoded JSON object as an error response.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::InvalidRequest`] if the envelope is wrong, the
    /// `id` is neither `null`, a string nor an integer, or the `error` object
    /// lacks an integer `code` or a string `message`.
    pub fn from_object(obj: Map<String, Value>) -> Result<Self, MessageError> {
        validate_envelope(&obj)?;

        let id = match obj.get("id") {
            None | Some(Value::Null) => None,
            other => parse_id(other)?,
        };

        let error = obj
            .get("error")
            .and_then(Value::as_object)
            .ok_or_else(|| MessageError::invalid("error field must be an object"))?;

        let code = error
            .get("code")
            .and_then(Value::as_i64)
            .and_then(|c| i32::try_from(c).ok())
            .ok_or_else(|| MessageError::invalid("error code must be an integer"))?;

        let message = error
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| MessageError::invalid("error message must be a string"))?;

        Ok(Self::new(
            id,
            JsonRpcErrorData {
                code,
                message: message.to_string(),
                data: error.get("data").cloned(),
            },
        ))
    }
}

impl WireMessage for JsonRpcError {}
