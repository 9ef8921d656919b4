//! Session and connector traits
//!
//! A [`Connector`] turns a [`TransportTarget`] into a live [`ToolSession`],
//! registering whatever it acquired on the way in a [`TeardownScope`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::McpResult;
use super::teardown::TeardownScope;

/// Where a tool provider lives and how to reach it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportTarget {
    /// Network-stream provider reachable at a URL
    #[serde(rename = "sse")]
    Stream { url: String },
    /// Local process speaking over its stdin/stdout
    #[serde(rename = "stdio")]
    Process {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl TransportTarget {
    pub fn stream(url: impl Into<String>) -> Self {
        TransportTarget::Stream { url: url.into() }
    }

    pub fn process(command: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        TransportTarget::Process {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// URL or command, used as the server id when the caller gives none
    pub fn address(&self) -> &str {
        match self {
            TransportTarget::Stream { url } => url,
            TransportTarget::Process { command, .. } => command,
        }
    }

    /// Short label for log lines
    pub fn kind(&self) -> &'static str {
        match self {
            TransportTarget::Stream { .. } => "stream",
            TransportTarget::Process { .. } => "process",
        }
    }
}

impl std::fmt::Display for TransportTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportTarget::Stream { url } => write!(f, "{}", url),
            TransportTarget::Process { command, args } if args.is_empty() => write!(f, "{}", command),
            TransportTarget::Process { command, args } => write!(f, "{} {}", command, args.join(" ")),
        }
    }
}

/// A callable operation as reported by discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteOperation {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

impl RemoteOperation {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: serde_json::json!({ "type": "object", "properties": {} }),
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }
}

/// One typed piece of an invocation response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentFragment {
    Text(String),
    /// Any non-text kind (image, audio, resource...), identified by name only
    Other(String),
}

/// Raw response of a remote invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOutcome {
    pub content: Vec<ContentFragment>,
    /// The provider flagged this result as a failure
    pub is_error: bool,
}

impl CallOutcome {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentFragment::Text(text.into())],
            is_error: false,
        }
    }

    /// Text fragments joined with `", "`, or `None` when there are none
    pub fn joined_text(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|fragment| match fragment {
                ContentFragment::Text(text) => Some(text.as_str()),
                ContentFragment::Other(_) => None,
            })
            .collect();

        if texts.is_empty() {
            None
        } else {
            Some(texts.join(", "))
        }
    }
}

/// A handshaken session with one tool provider
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// Discovery: list the provider's callable operations
    async fn list_operations(&self) -> McpResult<Vec<RemoteOperation>>;

    /// Invoke an operation by its provider-side name
    async fn call_operation(&self, name: &str, arguments: Value) -> McpResult<CallOutcome>;
}

/// Opens transports and performs the protocol handshake
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open `target`. Everything acquired must be pushed onto `scope` as it is
    /// acquired, so a failure halfway can be unwound by closing the scope.
    async fn open(
        &self,
        target: &TransportTarget,
        scope: &mut TeardownScope,
    ) -> McpResult<Arc<dyn ToolSession>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_joined_text_skips_other_fragments() {
        let outcome = CallOutcome {
            content: vec![
                ContentFragment::Text("a".into()),
                ContentFragment::Other("image".into()),
                ContentFragment::Text("b".into()),
            ],
            is_error: false,
        };
        assert_eq!(outcome.joined_text().as_deref(), Some("a, b"));

        let images_only = CallOutcome {
            content: vec![ContentFragment::Other("image".into())],
            is_error: false,
        };
        assert_eq!(images_only.joined_text(), None);
    }

    #[test]
    fn test_target_address_and_display() {
        let stream = TransportTarget::stream("http://localhost:8000/sse");
        assert_eq!(stream.address(), "http://localhost:8000/sse");
        assert_eq!(stream.kind(), "stream");

        let process = TransportTarget::process("python", ["-m", "weather"]);
        assert_eq!(process.address(), "python");
        assert_eq!(process.to_string(), "python -m weather");
    }

    #[test]
    fn test_target_serde_uses_config_tags() {
        let process: TransportTarget =
            serde_json::from_value(json!({ "type": "stdio", "command": "uvx", "args": ["mcp-time"] })).unwrap();
        assert_eq!(process, TransportTarget::process("uvx", ["mcp-time"]));

        let stream = serde_json::to_value(TransportTarget::stream("http://x")).unwrap();
        assert_eq!(stream, json!({ "type": "sse", "url": "http://x" }));
    }

    #[test]
    fn test_remote_operation_from_discovery_json() {
        let op: RemoteOperation = serde_json::from_value(json!({
            "name": "get_forecast",
            "description": "Forecast for a city",
            "inputSchema": { "type": "object" }
        }))
        .unwrap();
        assert_eq!(op.name, "get_forecast");
        assert_eq!(op.input_schema["type"], "object");
    }
}
