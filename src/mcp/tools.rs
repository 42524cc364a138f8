//! Built-in tools registered by the `mcp-tool-host` binary.
//!
//! Host applications embedding the library register their own
//! [`Tool`] implementations instead of, or alongside, these.

use std::sync::Arc;

use chrono::format::{Item, StrftimeItems};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::error::{RegistryError, ToolError};
use crate::mcp::registry::{Tool, ToolContent, ToolRegistry};

/// Names of every built-in tool.
pub const BUILTIN_TOOL_NAMES: [&str; 2] = [EchoTool::NAME, CurrentTimeTool::NAME];

/// Returns the built-in tools, in registration order.
#[must_use]
pub fn builtin_tools() -> Vec<Arc<dyn Tool>> {
    vec![Arc::new(EchoTool), Arc::new(CurrentTimeTool)]
}

/// Builds a registry holding the built-in tools not named in `disabled`.
///
/// # Errors
///
/// Returns an error if two built-in tools share a name.
pub fn builtin_registry(disabled: &[String]) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();

    for tool in builtin_tools() {
        if disabled.iter().any(|name| name == tool.name()) {
            tracing::info!(tool = tool.name(), "Built-in tool disabled by configuration");
            continue;
        }
        registry.register(tool)?;
    }

    Ok(registry)
}

/// Reads an optional string argument.
fn optional_str<'a>(
    arguments: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a str>, ToolError> {
    match arguments.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ToolError::invalid_arguments(format!(
            "'{key}' must be a string"
        ))),
    }
}

/// Returns its `text` argument unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoTool;

impl EchoTool {
    /// Registry name.
    pub const NAME: &'static str = "echo";
}

impl Tool for EchoTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Return the given text unchanged. Useful for checking that the server is reachable."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Text to echo back"
                }
            },
            "required": ["text"]
        })
    }

    fn execute(&self, arguments: &Map<String, Value>) -> Result<ToolContent, ToolError> {
        let text = optional_str(arguments, "text")?
            .ok_or_else(|| ToolError::invalid_arguments("missing required argument 'text'"))?;

        Ok(ToolContent::text(text))
    }
}

/// Reports the current UTC time.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentTimeTool;

impl CurrentTimeTool {
    /// Registry name.
    pub const NAME: &'static str = "current_time";
}

impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Return the current UTC time. Defaults to RFC 3339; pass a strftime \
         pattern in 'format' for a custom layout (e.g. '%Y-%m-%d')."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "format": {
                    "type": "string",
                    "description": "Optional strftime pattern"
                }
            }
        })
    }

    fn execute(&self, arguments: &Map<String, Value>) -> Result<ToolContent, ToolError> {
        let now = Utc::now();

        let Some(pattern) = optional_str(arguments, "format")? else {
            return Ok(ToolContent::text(
                now.to_rfc3339_opts(SecondsFormat::Secs, true),
            ));
        };

        // chrono panics when displaying an invalid pattern, so reject it first.
        let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return Err(ToolError::invalid_arguments(format!(
                "invalid time format '{pattern}'"
            )));
        }

        Ok(ToolContent::text(
            now.format_with_items(items.into_iter()).to_string(),
        ))
    }
}
