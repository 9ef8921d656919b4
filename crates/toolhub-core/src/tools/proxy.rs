//! Registry entries that forward to a remote provider

use std::sync::{Arc, Weak};

use serde_json::Value;

use crate::client::ServerConnection;
use crate::error::ClientError;
use crate::logging::Logger;
use crate::mcp::RemoteOperation;
use crate::types::{ToolDefinition, ToolOutput};

/// Text returned when a provider answers with no text fragments
pub const NO_OUTPUT: &str = "No output returned.";

/// A discovered remote operation exposed under its registry name
///
/// The proxy holds its connection weakly: once the client drops the
/// connection, every call reports "not connected" instead of reaching a
/// stale session.
pub struct RemoteToolProxy {
    tool_name: String,
    original_name: String,
    server_id: String,
    description: String,
    parameters: Value,
    connection: Weak<ServerConnection>,
    logger: Arc<dyn Logger>,
}

impl RemoteToolProxy {
    pub fn new(
        tool_name: impl Into<String>,
        operation: &RemoteOperation,
        connection: &Arc<ServerConnection>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            original_name: operation.name.clone(),
            server_id: connection.server_id().to_string(),
            description: operation.description.clone(),
            parameters: operation.input_schema.clone(),
            connection: Arc::downgrade(connection),
            logger,
        }
    }

    /// Same operation and connection under another registry name
    pub fn renamed(&self, tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            original_name: self.original_name.clone(),
            server_id: self.server_id.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
            connection: Weak::clone(&self.connection),
            logger: Arc::clone(&self.logger),
        }
    }

    /// Name in the registry
    pub fn name(&self) -> &str {
        &self.tool_name
    }

    /// Name the provider knows the operation by
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(&self.tool_name, &self.description).with_parameters(self.parameters.clone())
    }

    /// Invoke the operation on the owning provider
    ///
    /// Never fails: every problem comes back as [`ToolOutput::Error`].
    pub async fn execute(&self, arguments: Value) -> ToolOutput {
        let session = self
            .connection
            .upgrade()
            .and_then(|connection| connection.session());

        let Some(session) = session else {
            return ToolOutput::error(ClientError::NotConnected(self.server_id.clone()).to_string());
        };

        self.logger.debug(&format!(
            "Calling '{}' on server '{}' as '{}'",
            self.original_name, self.server_id, self.tool_name
        ));

        match session.call_operation(&self.original_name, arguments).await {
            Ok(outcome) if outcome.is_error => {
                let message = outcome.joined_text().unwrap_or_else(|| "remote tool reported an error".into());
                ToolOutput::error(ClientError::RemoteExecution(message).to_string())
            }
            Ok(outcome) => ToolOutput::output(outcome.joined_text().unwrap_or_else(|| NO_OUTPUT.into())),
            Err(e) => {
                self.logger.warn(&format!("Tool '{}' failed on server '{}': {}", self.tool_name, self.server_id, e));
                ToolOutput::error(ClientError::RemoteExecution(e.to_string()).to_string())
            }
        }
    }
}

impl std::fmt::Debug for RemoteToolProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteToolProxy")
            .field("tool_name", &self.tool_name)
            .field("original_name", &self.original_name)
            .field("server_id", &self.server_id)
            .finish()
    }
}
