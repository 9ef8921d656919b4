//! MCP sessions using the official rmcp SDK
//!
//! Connects to MCP servers over a child process (stdio) or Streamable HTTP.

use std::sync::Arc;

use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParams, ClientCapabilities, ClientInfo, Implementation, RawContent, Tool},
    service::{Peer, RunningService},
    transport::{ConfigureCommandExt, StreamableHttpClientTransport, TokioChildProcess},
    RoleClient, ServiceExt,
};
use serde_json::Value;
use tokio::process::Command;

use super::error::{McpError, McpResult};
use super::session::{CallOutcome, Connector, ContentFragment, RemoteOperation, ToolSession};
use super::teardown::TeardownScope;
use super::TransportTarget;
use crate::logging::Logger;

/// Opens real MCP sessions through rmcp
pub struct RmcpConnector {
    client_name: String,
    logger: Arc<dyn Logger>,
}

impl RmcpConnector {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            client_name: "toolhub".to_string(),
            logger,
        }
    }

    /// Name announced to servers during the handshake
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    fn client_info(&self) -> ClientInfo {
        ClientInfo {
            meta: None,
            protocol_version: Default::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: self.client_name.clone(),
                title: Some("Toolhub".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                website_url: None,
                icons: None,
            },
        }
    }

    async fn serve_process(
        &self,
        command: &str,
        args: &[String],
    ) -> McpResult<RunningService<RoleClient, ClientInfo>> {
        self.logger.info(&format!("[RmcpConnector] Spawning process: {} {:?}", command, args));

        let transport = TokioChildProcess::new(Command::new(command).configure(|cmd| {
            cmd.args(args);
        }))
        .map_err(|e| McpError::ConnectionFailed(format!("failed to spawn '{}': {}", command, e)))?;

        self.client_info()
            .serve(transport)
            .await
            .map_err(|e| McpError::InitializationFailed(e.to_string()))
    }

    async fn serve_stream(&self, url: &str) -> McpResult<RunningService<RoleClient, ClientInfo>> {
        self.logger.info(&format!("[RmcpConnector] Connecting to HTTP: {}", url));

        let transport = StreamableHttpClientTransport::from_uri(url);

        self.client_info()
            .serve(transport)
            .await
            .map_err(|e| McpError::InitializationFailed(e.to_string()))
    }
}

#[async_trait]
impl Connector for RmcpConnector {
    async fn open(
        &self,
        target: &TransportTarget,
        scope: &mut TeardownScope,
    ) -> McpResult<Arc<dyn ToolSession>> {
        let service = match target {
            TransportTarget::Process { command, args } => self.serve_process(command, args).await?,
            TransportTarget::Stream { url } => self.serve_stream(url).await?,
        };

        if let Some(info) = service.peer_info() {
            self.logger.info(&format!(
                "[RmcpConnector] Initialized session with {} {}",
                info.server_info.name, info.server_info.version
            ));
        }

        let peer = service.peer().clone();

        // The running service owns the transport (and the child process);
        // cancelling it closes both.
        let logger = Arc::clone(&self.logger);
        scope.push(format!("mcp session {}", target), move || async move {
            match service.cancel().await {
                Ok(reason) => {
                    logger.debug(&format!("[RmcpConnector] Session closed: {:?}", reason));
                    Ok(())
                }
                Err(e) => Err(McpError::Cancelled(e.to_string())),
            }
        });

        Ok(Arc::new(RmcpSession {
            peer,
            logger: Arc::clone(&self.logger),
        }))
    }
}

/// A live rmcp client session
pub struct RmcpSession {
    peer: Peer<RoleClient>,
    logger: Arc<dyn Logger>,
}

#[async_trait]
impl ToolSession for RmcpSession {
    async fn list_operations(&self) -> McpResult<Vec<RemoteOperation>> {
        let result = self
            .peer
            .list_tools(Default::default())
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;

        self.logger.info(&format!(
            "[RmcpSession] Listed {} tools",
            result.tools.len()
        ));

        Ok(result.tools.into_iter().map(RemoteOperation::from).collect())
    }

    async fn call_operation(&self, name: &str, arguments: Value) -> McpResult<CallOutcome> {
        self.logger.info(&format!("[RmcpSession] Calling tool: {}", name));

        let params = CallToolRequestParams {
            meta: None,
            name: name.to_owned().into(),
            arguments: arguments.as_object().cloned(),
            task: None,
        };

        let result = self
            .peer
            .call_tool(params)
            .await
            .map_err(|e| McpError::ToolCallFailed(e.to_string()))?;

        // Content is Annotated<RawContent>, the variant lives in .raw
        let content = result
            .content
            .iter()
            .map(|c| match &c.raw {
                RawContent::Text(t) => ContentFragment::Text(t.text.clone()),
                RawContent::Image(_) => ContentFragment::Other("image".to_string()),
                _ => ContentFragment::Other("resource".to_string()),
            })
            .collect();

        Ok(CallOutcome {
            content,
            is_error: result.is_error.unwrap_or(false),
        })
    }
}

impl From<Tool> for RemoteOperation {
    fn from(tool: Tool) -> Self {
        Self {
            name: tool.name.to_string(),
            description: tool.description.map(|s| s.to_string()).unwrap_or_default(),
            // input_schema is Arc<JsonObject>
            input_schema: Value::Object(tool.input_schema.as_ref().clone()),
        }
    }
}
