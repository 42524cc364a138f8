//! mcp-tool-host: MCP server exposing registered tools over stdio
//!
//! This library implements the protocol side of the Model Context Protocol:
//! JSON-RPC message handling, the `initialize` handshake, and dispatch of
//! `tools/list` and `tools/call` to a registry of host-supplied tools.
//!
//! # Architecture
//!
//! The server owns the protocol. Tools own the work:
//!
//! - **Message Model**: Parse and validate JSON-RPC 2.0 requests, responses
//!   and error responses
//! - **Transport**: One JSON message per line in, one per line out, log
//!   lines on a separate diagnostic stream
//! - **Registry**: Name-keyed catalogue of [`mcp::Tool`] implementations
//! - **Server**: Handshake state machine and method routing
//!
//! # Modules
//!
//! - [`config`] — Configuration loading and validation
//! - [`error`] — Error types
//! - [`mcp`] — MCP protocol implementation

pub mod config;
pub mod error;
pub mod mcp;
