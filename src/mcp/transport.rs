//! Line-delimited transport for MCP server.
//!
//! This module implements the stdio transport as specified by MCP:
//!
//! - Messages are UTF-8 encoded JSON-RPC
//! - Messages are delimited by newlines
//! - Messages must not contain embedded newlines
//! - input: receives messages from client
//! - output: sends messages to client
//! - diagnostics: used for logging (never MCP messages)
//!
//! The transport is generic over its three streams so the same code runs
//! against the process standard handles and against in-memory buffers.

use std::io;

use chrono::{SecondsFormat, Utc};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::MessageError;
use crate::mcp::protocol::{JsonRpcError, JsonRpcResponse, WireMessage};

/// Transport bound to the process standard handles.
pub type StdioTransport =
    Transport<BufReader<tokio::io::Stdin>, tokio::io::Stdout, tokio::io::Stderr>;

/// A newline-delimited JSON-RPC transport.
///
/// Reads messages from `reader`, writes messages to `writer`, and writes
/// human-readable log lines to `diagnostics`.
pub struct Transport<R, W, E> {
    /// Buffered input stream.
    reader: R,
    /// Protocol output stream.
    writer: W,
    /// Diagnostic stream for log lines.
    diagnostics: E,
    /// Echo every message read or written to the diagnostic stream.
    debug: bool,
    /// Set once the input stream reports end-of-stream.
    eof: bool,
    /// Set once `close` has run.
    closed: bool,
    /// Whether `close` may shut the output stream down.
    owns_streams: bool,
}

impl StdioTransport {
    /// Creates a transport over stdin, stdout and stderr.
    ///
    /// The standard handles are never shut down by [`Transport::close`].
    #[must_use]
    pub fn stdio(debug: bool) -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            writer: tokio::io::stdout(),
            diagnostics: tokio::io::stderr(),
            debug,
            eof: false,
            closed: false,
            owns_streams: false,
        }
    }
}

impl<R, W, E> Transport<R, W, E>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    /// Creates a transport over caller-supplied streams.
    ///
    /// The transport takes ownership of the streams; [`Transport::close`]
    /// shuts the output stream down.
    pub const fn new(reader: R, writer: W, diagnostics: E) -> Self {
        Self {
            reader,
            writer,
            diagnostics,
            debug: false,
            eof: false,
            closed: false,
            owns_streams: true,
        }
    }

    /// Enables or disables echoing of traffic to the diagnostic stream.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Returns `true` if debug echo is enabled.
    #[must_use]
    pub const fn is_debug(&self) -> bool {
        self.debug
    }

    /// Returns `true` once the input stream has been exhausted.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.eof
    }

    /// Returns `true` once [`Transport::close`] has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Reads the next non-blank message line.
    ///
    /// Blank lines are skipped. Returns `None` at end-of-stream, after which
    /// [`Transport::is_eof`] reports `true`. A line that is not valid UTF-8
    /// is returned as [`MessageError::Parse`] so the caller can answer it and
    /// keep reading.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the input stream fails.
    pub async fn read_message(&mut self) -> io::Result<Option<Result<String, MessageError>>> {
        loop {
            let mut buf = Vec::new();
            let bytes_read = self.reader.read_until(b'\n', &mut buf).await?;

            if bytes_read == 0 {
                self.eof = true;
                return Ok(None);
            }

            let line = match String::from_utf8(buf) {
                Ok(line) => line,
                Err(e) => {
                    if self.debug {
                        let lossy = String::from_utf8_lossy(e.as_bytes());
                        self.log(&format!("<-- {}", lossy.trim()), false).await;
                    }
                    return Ok(Some(Err(MessageError::Parse(format!(
                        "message is not valid UTF-8: {}",
                        e.utf8_error()
                    )))));
                }
            };

            let message = line.trim();
            if message.is_empty() {
                continue;
            }

            if self.debug {
                self.log(&format!("<-- {message}"), false).await;
            }

            return Ok(Some(Ok(message.to_string())));
        }
    }

    /// Serialises a message and writes it as one line.
    ///
    /// Failures are logged to the diagnostic stream rather than returned, so
    /// a broken output pipe does not abort the server loop.
    ///
    /// Returns `true` if the message was written and flushed.
    pub async fn write_message<M: WireMessage>(&mut self, message: &M) -> bool {
        let json = match message.to_wire() {
            Ok(json) => json,
            Err(e) => {
                self.log(&format!("Failed to serialise message: {e}"), true)
                    .await;
                return false;
            }
        };

        if self.debug {
            self.log(&format!("--> {json}"), false).await;
        }

        match self.write_raw(&json).await {
            Ok(()) => true,
            Err(e) => {
                self.log(&format!("Failed to write message: {e}"), true)
                    .await;
                false
            }
        }
    }

    /// Writes a JSON-RPC response.
    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> bool {
        self.write_message(response).await
    }

    /// Writes a JSON-RPC error response.
    pub async fn write_error(&mut self, error: &JsonRpcError) -> bool {
        self.write_message(error).await
    }

    /// Writes a raw JSON string with newline termination and flushes.
    async fn write_raw(&mut self, json: &str) -> io::Result<()> {
        // MCP stdio framing: messages must not contain embedded newlines
        debug_assert!(
            !json.contains('\n'),
            "JSON message must not contain embedded newlines"
        );

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }

    /// Writes a timestamped log line to the diagnostic stream.
    ///
    /// Diagnostic write failures are ignored; there is nowhere left to
    /// report them.
    pub async fn log(&mut self, text: &str, is_error: bool) {
        let severity = if is_error { "ERROR" } else { "INFO" };
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let line = format!("{timestamp} [{severity}] {text}\n");

        let _ = self.diagnostics.write_all(line.as_bytes()).await;
        let _ = self.diagnostics.flush().await;
    }

    /// Flushes pending output and releases owned streams.
    ///
    /// Standard handles are flushed but never shut down. Calling this more
    /// than once has no further effect.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.writer.flush().await {
            self.log(&format!("Failed to flush output: {e}"), true).await;
        }

        if self.owns_streams {
            if let Err(e) = self.writer.shutdown().await {
                self.log(&format!("Failed to close output: {e}"), true)
                    .await;
            }
        }

        let _ = self.diagnostics.flush().await;
    }

    /// Consumes the transport and returns its streams.
    pub fn into_parts(self) -> (R, W, E) {
        (self.reader, self.writer, self.diagnostics)
    }
}
