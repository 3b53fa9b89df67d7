//! Job-scoped MCP client bridge for the sub-agent router (§4.8).
//!
//! [`McpBridge::connect`] opens one `rmcp` client per enabled
//! [`chatos_config::McpServerConfig`] (stdio child process, or HTTP/SSE),
//! lists and prefix-renames their tools, and exposes [`McpBridge::call_tool`]
//! for dispatching a renamed tool call back to its owning server. Unlike the
//! prior generation's process-global MCP client, a bridge lives for exactly
//! one run: callers must [`McpBridge::close`] it on every exit path.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod bridge;
mod error;
mod types;

pub use bridge::McpBridge;
pub use error::{McpError, McpResult};
pub use types::{McpToolInfo, render_call_error, render_call_result};
