//! MCP server implementation.
//!
//! This module implements the MCP server lifecycle:
//!
//! 1. **Initialisation**: A single `initialize` handshake, which must come
//!    before any other call
//! 2. **Operation**: Handling `tools/list` and `tools/call`
//! 3. **Shutdown**: The loop ends when the input stream is exhausted
//!
//! Messages are handled strictly one at a time: each is parsed, routed,
//! executed and answered before the next line is read. Replies are therefore
//! written in request order.

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::error::ToolError;
use crate::mcp::protocol::{
    ErrorCode, JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION, SERVER_NAME,
};
use crate::mcp::registry::{ToolContent, ToolRegistry};
use crate::mcp::transport::Transport;

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for initialize request.
    AwaitingInit,
    /// Ready for normal operation.
    Running,
}

/// The methods this server answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `initialize`
    Initialize,
    /// `tools/list`
    ToolsList,
    /// `tools/call`
    ToolsCall,
}

impl Method {
    /// Resolves a method name, returning `None` for unknown methods.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "initialize" => Some(Self::Initialize),
            "tools/list" => Some(Self::ToolsList),
            "tools/call" => Some(Self::ToolsCall),
            _ => None,
        }
    }

    /// Returns the wire name of this method.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::ToolsList => "tools/list",
            Self::ToolsCall => "tools/call",
        }
    }
}

/// Server capabilities advertised during initialisation.
///
/// The tool list is fixed for the whole session, so `listChanged` is always
/// reported as `false`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    pub tools: ToolCapabilities,
}

/// Tool-specific capabilities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change during the session.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Server information for initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl ServerInfo {
    /// Creates server information with the given name and version.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self::new(SERVER_NAME, env!("CARGO_PKG_VERSION"))
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Result of a successful tool call.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
}

impl ToolCallResult {
    /// Wraps a single content item.
    #[must_use]
    pub fn single(content: ToolContent) -> Self {
        Self {
            content: vec![content],
        }
    }
}

/// The reply produced for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Successful response.
    Response(JsonRpcResponse),
    /// Error response.
    Error(JsonRpcError),
}

/// Failures raised by method handlers.
#[derive(Debug, Error)]
enum HandlerError {
    /// The request parameters are malformed.
    #[error("{0}")]
    InvalidParams(String),

    /// The named tool does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The server is not in a state to answer the request.
    #[error("{0}")]
    Internal(String),

    /// The tool itself failed.
    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl HandlerError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidParams(_) => ErrorCode::InvalidParams,
            Self::NotFound(_) => ErrorCode::MethodNotFound,
            Self::Internal(_) => ErrorCode::InternalError,
            Self::Tool(e) => e.code(),
        }
    }
}

type HandlerResult = Result<Value, HandlerError>;

/// The MCP server.
pub struct McpServer<R, W, E> {
    /// Current server state.
    state: ServerState,
    /// The transport layer.
    transport: Transport<R, W, E>,
    /// Tools offered to the client, if any were configured.
    registry: Option<ToolRegistry>,
    /// Capabilities advertised at initialisation.
    capabilities: ServerCapabilities,
    /// Identity advertised at initialisation.
    server_info: ServerInfo,
    /// Capabilities received from the client at initialisation.
    client_capabilities: Option<Value>,
    /// Identity received from the client at initialisation.
    client_info: Option<ClientInfo>,
}

impl<R, W, E> McpServer<R, W, E>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    /// Creates a new MCP server with no tool registry.
    #[must_use]
    pub fn new(transport: Transport<R, W, E>) -> Self {
        Self {
            state: ServerState::AwaitingInit,
            transport,
            registry: None,
            capabilities: ServerCapabilities::default(),
            server_info: ServerInfo::default(),
            client_capabilities: None,
            client_info: None,
        }
    }

    /// Attaches a tool registry.
    #[must_use]
    pub fn with_registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Overrides the identity reported in the `initialize` response.
    #[must_use]
    pub fn with_server_info(mut self, server_info: ServerInfo) -> Self {
        self.server_info = server_info;
        self
    }

    /// Replaces the tool registry.
    pub fn set_registry(&mut self, registry: ToolRegistry) {
        self.registry = Some(registry);
    }

    /// Returns the tool registry, if one is attached.
    #[must_use]
    pub const fn registry(&self) -> Option<&ToolRegistry> {
        self.registry.as_ref()
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Returns `true` once the handshake has completed.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        matches!(self.state, ServerState::Running)
    }

    /// Returns the capabilities the client sent with `initialize`.
    #[must_use]
    pub const fn client_capabilities(&self) -> Option<&Value> {
        self.client_capabilities.as_ref()
    }

    /// Returns the identity the client sent with `initialize`.
    #[must_use]
    pub const fn client_info(&self) -> Option<&ClientInfo> {
        self.client_info.as_ref()
    }

    /// Returns the transport.
    #[must_use]
    pub const fn transport(&self) -> &Transport<R, W, E> {
        &self.transport
    }

    /// Returns the transport mutably, e.g. to toggle debug mode.
    pub fn transport_mut(&mut self) -> &mut Transport<R, W, E> {
        &mut self.transport
    }

    /// Consumes the server and returns its transport.
    pub fn into_transport(self) -> Transport<R, W, E> {
        self.transport
    }

    /// Runs the read-dispatch-write loop until the input stream ends.
    ///
    /// A read failure ends the session: it is logged, an internal error with
    /// a `null` ID is written on a best-effort basis, and the error is
    /// returned. The transport is closed however the loop ends.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the input stream fails.
    pub async fn run(&mut self) -> io::Result<()> {
        let result = self.serve().await;

        if let Err(ref e) = result {
            self.transport
                .log(&format!("Fatal error in server loop: {e}"), true)
                .await;
            let error = JsonRpcError::internal_error(None, format!("Fatal server error: {e}"));
            self.transport.write_error(&error).await;
        }

        self.transport.close().await;
        result
    }

    async fn serve(&mut self) -> io::Result<()> {
        while !self.transport.is_eof() {
            match self.transport.read_message().await? {
                Some(Ok(line)) => self.handle_message(&line).await,
                Some(Err(e)) => {
                    self.transport
                        .log(&format!("Rejected message: {e}"), true)
                        .await;
                    self.transport.write_error(&e.into_response()).await;
                }
                None => break,
            }
        }

        Ok(())
    }

    /// Handles one raw message and writes its reply, if it has one.
    pub async fn handle_message(&mut self, text: &str) {
        match self.dispatch(text).await {
            Some(Reply::Response(response)) => {
                self.transport.write_response(&response).await;
            }
            Some(Reply::Error(error)) => {
                self.transport.write_error(&error).await;
            }
            None => {}
        }
    }

    /// Parses and routes one raw message, returning the reply to send.
    ///
    /// Returns `None` for notifications, which are never answered.
    pub async fn dispatch(&mut self, text: &str) -> Option<Reply> {
        let request = match JsonRpcRequest::from_text(text) {
            Ok(request) => request,
            Err(e) => {
                self.transport
                    .log(&format!("Rejected message: {e}"), true)
                    .await;
                return Some(Reply::Error(e.into_response()));
            }
        };

        let JsonRpcRequest {
            id, method, params, ..
        } = request;

        let Some(id) = id else {
            self.transport
                .log(&format!("Received notification: {method}"), false)
                .await;
            return None;
        };

        let params = params.unwrap_or_default();
        tracing::debug!(%id, %method, "Dispatching request");

        let outcome = match Method::from_name(&method) {
            Some(Method::Initialize) => self.handle_initialize(&params).await,
            Some(Method::ToolsList) => self.handle_tools_list(),
            Some(Method::ToolsCall) => self.handle_tools_call(&params),
            None => Err(HandlerError::NotFound(format!("Method not found: {method}"))),
        };

        match outcome {
            Ok(result) => Some(Reply::Response(JsonRpcResponse::success(id, result))),
            Err(e) => {
                self.transport
                    .log(&format!("Request {id} ({method}) failed: {e}"), true)
                    .await;
                Some(Reply::Error(JsonRpcError::with_detail(
                    Some(id),
                    e.code(),
                    e.to_string(),
                )))
            }
        }
    }

    /// Handles the initialize request.
    async fn handle_initialize(&mut self, params: &Map<String, Value>) -> HandlerResult {
        if self.is_initialized() {
            return Err(HandlerError::Internal(
                "Server already initialized".to_string(),
            ));
        }

        if let Some(requested) = params.get("protocolVersion").and_then(Value::as_str) {
            if requested != MCP_PROTOCOL_VERSION {
                self.transport
                    .log(
                        &format!(
                            "Warning: client requested protocol version {requested}, \
                             server supports {MCP_PROTOCOL_VERSION}; continuing"
                        ),
                        false,
                    )
                    .await;
            }
        }

        self.client_info = match params.get("clientInfo") {
            None => None,
            Some(info) => match ClientInfo::deserialize(info) {
                Ok(info) => Some(info),
                Err(e) => {
                    self.transport
                        .log(&format!("Ignoring malformed clientInfo: {e}"), false)
                        .await;
                    None
                }
            },
        };

        if let Some(ref info) = self.client_info {
            tracing::info!(
                client = %info.name,
                version = info.version.as_deref().unwrap_or("unknown"),
                "Client connected"
            );
        }

        self.client_capabilities = Some(
            params
                .get("capabilities")
                .cloned()
                .unwrap_or_else(|| json!({})),
        );
        self.state = ServerState::Running;

        Ok(json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": self.capabilities,
            "serverInfo": self.server_info,
        }))
    }

    /// Handles the tools/list request.
    fn handle_tools_list(&self) -> HandlerResult {
        self.require_initialized()?;

        let tools = self
            .registry
            .as_ref()
            .map(ToolRegistry::list)
            .unwrap_or_default();

        Ok(json!({ "tools": tools }))
    }

    /// Handles the tools/call request.
    fn handle_tools_call(&self, params: &Map<String, Value>) -> HandlerResult {
        self.require_initialized()?;

        let registry = self.registry.as_ref().ok_or_else(|| {
            HandlerError::Internal("No tool registry configured".to_string())
        })?;

        let name = match params.get("name") {
            Some(Value::String(name)) if !name.is_empty() => name.as_str(),
            _ => {
                return Err(HandlerError::InvalidParams(
                    "'name' must be a non-empty string".to_string(),
                ))
            }
        };

        let empty = Map::new();
        let arguments = match params.get("arguments") {
            None => &empty,
            Some(Value::Object(arguments)) => arguments,
            Some(_) => {
                return Err(HandlerError::InvalidParams(
                    "'arguments' must be an object".to_string(),
                ))
            }
        };

        let tool = registry
            .get(name)
            .ok_or_else(|| HandlerError::NotFound(format!("Tool not found: {name}")))?;

        tracing::debug!(tool = name, "Executing tool");
        let content = tool.execute(arguments)?;

        serde_json::to_value(ToolCallResult::single(content)).map_err(|e| {
            tracing::error!(error = %e, "Failed to serialise tool call result");
            HandlerError::Internal("Internal error: failed to serialise result".to_string())
        })
    }

    /// Ensures the handshake has completed.
    fn require_initialized(&self) -> Result<(), HandlerError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(HandlerError::Internal("Server not initialized".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use tokio::io::{AsyncRead, ReadBuf};

    use super::*;
    use crate::mcp::protocol::{parse_object, RequestId};
    use crate::mcp::registry::Tool;

    type TestServer = McpServer<&'static [u8], Vec<u8>, Vec<u8>>;

    struct Upper;

    impl Tool for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn description(&self) -> &str {
            "Upper-cases 'text'"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }

        fn execute(&self, arguments: &Map<String, Value>) -> Result<ToolContent, ToolError> {
            match arguments.get("text") {
                Some(Value::String(text)) => Ok(ToolContent::text(text.to_uppercase())),
                Some(_) => Err(ToolError::invalid_arguments("'text' must be a string")),
                None => Err(ToolError::execution("nothing to upper-case")),
            }
        }
    }

    fn server() -> TestServer {
        McpServer::new(Transport::new(&b""[..], Vec::new(), Vec::new()))
    }

    fn server_with_tools() -> TestServer {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Upper)).unwrap();
        server().with_registry(registry)
    }

    async fn initialize(server: &mut TestServer) {
        let reply = server
            .dispatch(r#"{"jsonrpc":"2.0","id":0,"method":"initialize","params":{}}"#)
            .await;
        assert!(matches!(reply, Some(Reply::Response(_))));
    }

    fn expect_error(reply: Option<Reply>) -> JsonRpcError {
        match reply {
            Some(Reply::Error(error)) => error,
            other => panic!("expected error reply, got {other:?}"),
        }
    }

    fn expect_result(reply: Option<Reply>) -> Value {
        match reply {
            Some(Reply::Response(response)) => response.result,
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn server_initial_state() {
        let server = server();
        assert_eq!(server.state(), ServerState::AwaitingInit);
        assert!(!server.is_initialized());
        assert!(server.client_capabilities().is_none());
        assert!(server.registry().is_none());
    }

    #[test]
    fn method_names_round_trip() {
        for method in [Method::Initialize, Method::ToolsList, Method::ToolsCall] {
            assert_eq!(Method::from_name(method.name()), Some(method));
        }
        assert_eq!(Method::from_name("ping"), None);
    }

    #[tokio::test]
    async fn initialize_returns_capabilities() {
        let mut server = server();
        let result = expect_result(
            server
                .dispatch(
                    r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{
                        "protocolVersion":"2024-11-05",
                        "capabilities":{"roots":{}},
                        "clientInfo":{"name":"test-client","version":"1.0.0"}}}"#,
                )
                .await,
        );

        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["capabilities"]["tools"]["listChanged"], false);
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert!(server.is_initialized());
        assert_eq!(server.client_capabilities(), Some(&json!({"roots": {}})));
        assert_eq!(
            server.client_info(),
            Some(&ClientInfo {
                name: "test-client".to_string(),
                version: Some("1.0.0".to_string()),
            })
        );
    }

    #[tokio::test]
    async fn initialize_without_params_is_accepted() {
        let mut server = server();
        let result = expect_result(
            server
                .dispatch(r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#)
                .await,
        );

        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(server.client_capabilities(), Some(&json!({})));
        assert!(server.client_info().is_none());
    }

    #[tokio::test]
    async fn version_mismatch_is_logged_not_rejected() {
        let mut server = server();
        let result = expect_result(
            server
                .dispatch(
                    r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"1999-01-01"}}"#,
                )
                .await,
        );
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);

        let (_, output, diagnostics) = server.into_transport().into_parts();
        let diagnostics = String::from_utf8(diagnostics).unwrap();
        assert!(output.is_empty());
        assert!(diagnostics.contains("1999-01-01"));
    }

    #[tokio::test]
    async fn second_initialize_fails_and_keeps_state() {
        let mut server = server();
        server
            .dispatch(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"capabilities":{"a":1}}}"#,
            )
            .await;

        let error = expect_error(
            server
                .dispatch(
                    r#"{"jsonrpc":"2.0","id":2,"method":"initialize","params":{"capabilities":{"b":2}}}"#,
                )
                .await,
        );

        assert_eq!(error.id, Some(RequestId::Number(2)));
        assert_eq!(error.error.code, ErrorCode::InternalError.code());
        assert_eq!(server.client_capabilities(), Some(&json!({"a": 1})));
        assert!(server.is_initialized());
    }

    #[tokio::test]
    async fn tools_list_requires_initialization() {
        let mut server = server_with_tools();
        let error = expect_error(
            server
                .dispatch(r#"{"jsonrpc":"2.0","id":"x","method":"tools/list"}"#)
                .await,
        );

        assert_eq!(error.id, Some(RequestId::String("x".to_string())));
        assert_eq!(error.error.code, ErrorCode::InternalError.code());
    }

    #[tokio::test]
    async fn tools_list_without_registry_is_empty() {
        let mut server = server();
        initialize(&mut server).await;

        let result = expect_result(
            server
                .dispatch(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
                .await,
        );
        assert_eq!(result, json!({"tools": []}));
    }

    #[tokio::test]
    async fn tools_list_returns_definitions() {
        let mut server = server_with_tools();
        initialize(&mut server).await;

        let result = expect_result(
            server
                .dispatch(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
                .await,
        );
        assert_eq!(result["tools"][0]["name"], "upper");
        assert_eq!(result["tools"][0]["inputSchema"]["type"], "object");
    }

    #[tokio::test]
    async fn tools_call_wraps_single_content_item() {
        let mut server = server_with_tools();
        initialize(&mut server).await;

        let result = expect_result(
            server
                .dispatch(
                    r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"upper","arguments":{"text":"abc"}}}"#,
                )
                .await,
        );
        assert_eq!(result, json!({"content": [{"type": "text", "text": "ABC"}]}));
    }

    #[tokio::test]
    async fn tools_call_error_mapping() {
        let mut server = server_with_tools();
        initialize(&mut server).await;

        let cases = [
            (r#"{"name":"missing-tool","arguments":{}}"#, ErrorCode::MethodNotFound),
            (r#"{"arguments":{}}"#, ErrorCode::InvalidParams),
            (r#"{"name":""}"#, ErrorCode::InvalidParams),
            (r#"{"name":7}"#, ErrorCode::InvalidParams),
            (r#"{"name":"upper","arguments":[1]}"#, ErrorCode::InvalidParams),
            (r#"{"name":"upper","arguments":{"text":1}}"#, ErrorCode::InvalidParams),
            (r#"{"name":"upper"}"#, ErrorCode::InternalError),
        ];

        for (params, code) in cases {
            let message = format!(
                r#"{{"jsonrpc":"2.0","id":9,"method":"tools/call","params":{params}}}"#
            );
            let error = expect_error(server.dispatch(&message).await);
            assert_eq!(error.id, Some(RequestId::Number(9)), "params: {params}");
            assert_eq!(error.error.code, code.code(), "params: {params}");
            assert!(error.error.data.is_some(), "params: {params}");
        }
    }

    #[tokio::test]
    async fn tool_failure_message_is_attached() {
        let mut server = server_with_tools();
        initialize(&mut server).await;

        let error = expect_error(
            server
                .dispatch(r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"upper"}}"#)
                .await,
        );
        assert_eq!(error.error.message, "Internal error");
        assert_eq!(error.error.data, Some(json!("nothing to upper-case")));
    }

    #[tokio::test]
    async fn tools_call_without_registry_is_internal_error() {
        let mut server = server();
        initialize(&mut server).await;

        let error = expect_error(
            server
                .dispatch(r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"upper"}}"#)
                .await,
        );
        assert_eq!(error.error.code, ErrorCode::InternalError.code());
        assert_eq!(error.error.data, Some(json!("No tool registry configured")));
    }

    #[tokio::test]
    async fn unknown_method_is_not_found() {
        let mut server = server();
        let error = expect_error(
            server
                .dispatch(r#"{"jsonrpc":"2.0","id":6,"method":"resources/list"}"#)
                .await,
        );
        assert_eq!(error.id, Some(RequestId::Number(6)));
        assert_eq!(error.error.code, ErrorCode::MethodNotFound.code());
    }

    #[tokio::test]
    async fn notifications_are_never_answered() {
        let mut server = server();
        for text in [
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            r#"{"jsonrpc":"2.0","method":"no/such/method"}"#,
            r#"{"jsonrpc":"2.0","method":"tools/list"}"#,
        ] {
            assert_eq!(server.dispatch(text).await, None, "input: {text}");
        }
        assert!(!server.is_initialized());
    }

    #[tokio::test]
    async fn malformed_messages_are_answered_with_null_id() {
        let mut server = server();

        let error = expect_error(server.dispatch("{invalid json").await);
        assert_eq!(error.id, None);
        assert_eq!(error.error.code, ErrorCode::ParseError.code());

        let error = expect_error(server.dispatch(r#"{"id":1,"method":"x"}"#).await);
        assert_eq!(error.id, None);
        assert_eq!(error.error.code, ErrorCode::InvalidRequest.code());
    }

    /// Input stream whose every read fails.
    struct FailingReader;

    impl AsyncRead for FailingReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::other("device gone")))
        }
    }

    impl AsyncBufRead for FailingReader {
        fn poll_fill_buf(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
            Poll::Ready(Err(io::Error::other("device gone")))
        }

        fn consume(self: Pin<&mut Self>, _amt: usize) {}
    }

    #[tokio::test]
    async fn read_failure_ends_the_session() {
        let transport = Transport::new(FailingReader, Vec::new(), Vec::new());
        let mut server = McpServer::new(transport);

        let err = server.run().await.unwrap_err();
        assert_eq!(err.to_string(), "device gone");

        let transport = server.into_transport();
        assert!(transport.is_closed());
        assert!(!transport.is_eof());

        let (_, output, diagnostics) = transport.into_parts();
        let output = String::from_utf8(output).unwrap();
        let diagnostics = String::from_utf8(diagnostics).unwrap();

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 1);
        let error = JsonRpcError::from_object(parse_object(lines[0]).unwrap()).unwrap();
        assert_eq!(error.id, None);
        assert_eq!(error.error.code, ErrorCode::InternalError.code());
        assert!(lines[0].contains(r#""id":null"#));
        assert!(diagnostics.contains("[ERROR] Fatal error in server loop: device gone"));
    }

    #[tokio::test]
    async fn invalid_utf8_line_does_not_end_the_session() {
        let input: &'static [u8] =
            b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"x\xff\"}\n{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"initialize\"}\n";
        let mut server = McpServer::new(Transport::new(input, Vec::new(), Vec::new()));

        server.run().await.unwrap();
        assert!(server.is_initialized());

        let (_, output, _) = server.into_transport().into_parts();
        let output = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 2);
        let rejected = JsonRpcError::from_object(parse_object(lines[0]).unwrap()).unwrap();
        assert_eq!(rejected.id, None);
        assert_eq!(rejected.error.code, ErrorCode::ParseError.code());
        assert!(lines[1].contains(r#""id":2"#));
        assert!(lines[1].contains(r#""result""#));
    }
}
