//! Error types for mcp-tool-host.
//!
//! Each layer of the server owns one error enum:
//!
//! - [`ConfigError`]: configuration file loading and validation
//! - [`MessageError`]: decoding an incoming JSON-RPC message
//! - [`RegistryError`]: building the tool catalogue at startup
//! - [`ToolError`]: failures reported by a tool while executing

use std::path::PathBuf;

use thiserror::Error;

use crate::mcp::protocol::{ErrorCode, JsonRpcError, JsonRpcErrorData, RequestId};

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Errors raised while decoding an incoming JSON-RPC message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// The text is not valid UTF-8 or JSON, or does not decode to an object.
    #[error("parse error: {0}")]
    Parse(String),

    /// The JSON is well formed but is not a valid message.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// The request ID, if it was extracted before validation failed.
        id: Option<RequestId>,
        /// What is wrong with the message.
        reason: String,
    },
}

impl MessageError {
    /// Creates an invalid request error with no known ID.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            id: None,
            reason: reason.into(),
        }
    }

    /// Returns the JSON-RPC error code for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Parse(_) => ErrorCode::ParseError,
            Self::InvalidRequest { .. } => ErrorCode::InvalidRequest,
        }
    }

    /// Converts this failure into the error response sent to the client.
    #[must_use]
    pub fn into_response(self) -> JsonRpcError {
        let code = self.code();
        match self {
            Self::Parse(detail) => JsonRpcError::new(
                None,
                JsonRpcErrorData::from_code(code).with_data(detail.into()),
            ),
            Self::InvalidRequest { id, reason } => JsonRpcError::new(
                id,
                JsonRpcErrorData::from_code(code).with_data(reason.into()),
            ),
        }
    }
}

/// Errors raised while building the tool registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A tool with the same name is already registered.
    #[error("tool already registered: {name}")]
    DuplicateTool {
        /// The conflicting tool name.
        name: String,
    },
}

/// Errors a tool reports from `execute`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// The arguments did not match what the tool accepts.
    #[error("invalid arguments: {message}")]
    InvalidArguments {
        /// Description of the argument problem.
        message: String,
    },

    /// The tool failed while doing its work.
    #[error("{message}")]
    Execution {
        /// Description of the failure.
        message: String,
    },

    /// A tool-specific failure with its own code.
    ///
    /// Codes outside the reserved -32099..=-32000 band are reported as
    /// internal errors.
    #[error("{message}")]
    Server {
        /// Implementation-defined error code.
        code: i32,
        /// Description of the failure.
        message: String,
    },
}

impl ToolError {
    /// Creates an argument validation error.
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }

    /// Creates an execution error.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Returns the JSON-RPC error code this failure is reported with.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArguments { .. } => ErrorCode::InvalidParams,
            Self::Execution { .. } => ErrorCode::InternalError,
            Self::Server { code, .. } if ErrorCode::SERVER_ERROR_RANGE.contains(code) => {
                ErrorCode::ServerError(*code)
            }
            Self::Server { .. } => ErrorCode::InternalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let error = ConfigError::NotFound {
            path: PathBuf::from("/path/to/config.json"),
        };
        let msg = error.to_string();
        assert!(msg.contains("not found"));
        assert!(msg.contains("config.json"));
    }

    #[test]
    fn validation_error_display() {
        let error = ConfigError::ValidationError {
            message: "invalid setting".to_string(),
        };
        let msg = error.to_string();
        assert!(msg.contains("invalid setting"));
    }

    #[test]
    fn parse_error_response_has_null_id() {
        let response = MessageError::Parse("expected value".to_string()).into_response();
        assert_eq!(response.id, None);
        assert_eq!(response.error.code, -32700);
        assert_eq!(response.error.data, Some("expected value".into()));
    }

    #[test]
    fn invalid_request_keeps_extracted_id() {
        let error = MessageError::InvalidRequest {
            id: Some(RequestId::Number(7)),
            reason: "params must be an object".to_string(),
        };
        let response = error.into_response();
        assert_eq!(response.id, Some(RequestId::Number(7)));
        assert_eq!(response.error.code, -32600);
    }

    #[test]
    fn duplicate_tool_display() {
        let error = RegistryError::DuplicateTool {
            name: "echo".to_string(),
        };
        assert_eq!(error.to_string(), "tool already registered: echo");
    }

    #[test]
    fn tool_error_display() {
        assert_eq!(
            ToolError::invalid_arguments("missing 'text'").to_string(),
            "invalid arguments: missing 'text'"
        );
        assert_eq!(ToolError::execution("disk full").to_string(), "disk full");
    }

    #[test]
    fn tool_error_codes() {
        assert_eq!(
            ToolError::invalid_arguments("x").code(),
            ErrorCode::InvalidParams
        );
        assert_eq!(ToolError::execution("x").code(), ErrorCode::InternalError);

        let in_band = ToolError::Server {
            code: -32001,
            message: "locked".to_string(),
        };
        assert_eq!(in_band.code(), ErrorCode::ServerError(-32001));

        let out_of_band = ToolError::Server {
            code: 42,
            message: "odd".to_string(),
        };
        assert_eq!(out_of_band.code(), ErrorCode::InternalError);
    }
}
