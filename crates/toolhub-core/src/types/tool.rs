//! Tool presentation and call/result types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool definition presented to a planning component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Registry name of the tool
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// JSON Schema for the input parameters
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new tool definition with an empty object schema
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Value::Object(Default::default()),
        }
    }

    /// Set the parameter schema
    pub fn with_parameters(mut self, schema: Value) -> Self {
        self.parameters = schema;
        self
    }
}

/// Outcome of a single tool execution
///
/// Every execution, local or remote, successful or not, ends up as one of
/// these. Serializes as `{"output": ...}` or `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolOutput {
    Output(String),
    Error(String),
}

impl ToolOutput {
    pub fn output(text: impl Into<String>) -> Self {
        ToolOutput::Output(text.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        ToolOutput::Error(message.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutput::Error(_))
    }

    /// The output or error text
    pub fn text(&self) -> &str {
        match self {
            ToolOutput::Output(text) | ToolOutput::Error(text) => text,
        }
    }
}

/// Tool call requested by an orchestrating loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Name of the tool being called
    pub name: String,
    /// Input arguments for the tool
    pub input: Value,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Get an input argument by key
    pub fn get_arg(&self, key: &str) -> Option<&Value> {
        self.input.get(key)
    }

    /// Get an input argument as a string
    pub fn get_arg_str(&self, key: &str) -> Option<&str> {
        self.input.get(key).and_then(|v| v.as_str())
    }
}

/// Tool result to send back to the orchestrating loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this is responding to
    #[serde(rename = "callId")]
    pub call_id: String,
    /// The result content
    pub content: String,
    /// Whether this result represents an error
    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Create an error tool result
    pub fn error(call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: error.into(),
            is_error: true,
        }
    }

    /// Wrap a [`ToolOutput`] for the call with the given id
    pub fn from_output(call_id: impl Into<String>, output: ToolOutput) -> Self {
        match output {
            ToolOutput::Output(text) => Self::success(call_id, text),
            ToolOutput::Error(message) => Self::error(call_id, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_definition() {
        let tool = ToolDefinition::new("get_forecast", "Get the forecast")
            .with_parameters(json!({
                "type": "object",
                "properties": {
                    "city": { "type": "string" }
                },
                "required": ["city"]
            }));

        assert_eq!(tool.name, "get_forecast");
        assert_eq!(tool.parameters["required"][0], "city");
    }

    #[test]
    fn test_tool_output_shape() {
        let ok = serde_json::to_value(ToolOutput::output("72F, sunny")).unwrap();
        assert_eq!(ok, json!({ "output": "72F, sunny" }));

        let err = serde_json::to_value(ToolOutput::error("not connected")).unwrap();
        assert_eq!(err, json!({ "error": "not connected" }));
        assert!(ToolOutput::error("x").is_error());
    }

    #[test]
    fn test_tool_call_args() {
        let call = ToolCall::new("call_1", "get_forecast", json!({ "city": "Oslo" }));
        assert_eq!(call.get_arg_str("city"), Some("Oslo"));
        assert!(call.get_arg("days").is_none());
    }

    #[test]
    fn test_tool_result_from_output() {
        let ok = ToolResult::from_output("call_1", ToolOutput::output("done"));
        assert!(!ok.is_error);
        assert_eq!(ok.content, "done");

        let err = ToolResult::from_output("call_2", ToolOutput::error("boom"));
        assert!(err.is_error);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["callId"], "call_2");
        assert_eq!(json["isError"], true);
    }
}
