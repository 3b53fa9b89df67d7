//! MCP bridge error types.

use thiserror::Error;

/// Errors surfaced while connecting to or calling an MCP server (§4.8).
#[derive(Debug, Error)]
pub enum McpError {
    /// The server's `McpServerConfig` failed validation.
    #[error("invalid server config for '{server}': {reason}")]
    InvalidConfig {
        /// The server's configured name.
        server: String,
        /// Why validation failed.
        reason: String,
    },

    /// The transport could not be established.
    #[error("failed to connect to '{server}': {reason}")]
    Connect {
        /// The server's configured name.
        server: String,
        /// The underlying transport/protocol error.
        reason: String,
    },

    /// No connected server owns a tool by that prefixed name.
    #[error("no tool named '{0}'")]
    ToolNotFound(String),
}

/// Result alias for MCP bridge operations.
pub type McpResult<T> = Result<T, McpError>;
