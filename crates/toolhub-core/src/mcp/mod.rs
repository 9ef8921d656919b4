//! MCP (Model Context Protocol) session layer
//!
//! Wraps the official rmcp SDK behind two small traits so the rest of the
//! crate never touches transport details:
//!
//! - [`Connector`] opens a transport to one provider and performs the handshake
//! - [`ToolSession`] runs discovery and invocations on the open session
//!
//! Every resource a connector acquires is registered on a [`TeardownScope`],
//! which releases them in reverse order when the connection goes away.
//!
//! # Example
//!
//! ```rust,ignore
//! use toolhub_core::mcp::{Connector, RmcpConnector, TeardownScope, TransportTarget};
//!
//! let connector = RmcpConnector::new(logger);
//! let mut scope = TeardownScope::new();
//! let session = connector
//!     .open(&TransportTarget::process("uvx", ["mcp-server-time"]), &mut scope)
//!     .await?;
//!
//! for op in session.list_operations().await? {
//!     println!("{}: {}", op.name, op.description);
//! }
//!
//! scope.close(logger).await;
//! ```

mod client;
mod error;
mod mock;
mod session;
mod teardown;

pub use client::{RmcpConnector, RmcpSession};
pub use error::{McpError, McpResult};
pub use mock::{MockConnector, MockResponse, MockServer, MockStats};
pub use session::{CallOutcome, Connector, ContentFragment, RemoteOperation, ToolSession, TransportTarget};
pub use teardown::TeardownScope;
