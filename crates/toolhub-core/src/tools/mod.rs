//! Tool management module
//!
//! Local tools and proxies for remote operations share one registry.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  ToolRegistry                               │
//! │                                             │
//! │  - Local tools from the host application    │
//! │  - RemoteToolProxy per discovered operation │
//! │  - Dispatch by registry name                │
//! └─────────────────────────────────────────────┘
//!           │
//!           │ tools/call (original operation name)
//!           ▼
//! ┌─────────────────────────────────────────────┐
//! │  ServerConnection (one per provider)        │
//! └─────────────────────────────────────────────┘
//! ```

mod naming;
mod proxy;
mod registry;

pub use naming::{candidate_name, is_valid_tool_name, registry_name, sanitize_tool_name, MAX_TOOL_NAME_LEN, UNNAMED_TOOL};
pub use proxy::{RemoteToolProxy, NO_OUTPUT};
pub use registry::{LocalTool, RegisteredTool, ToolRegistry};
