//! Dispatch seam between the loop and whatever actually runs tools (§4.7
//! step 3's `invoke`). The router wires this to the MCP bridge plus any
//! built-in tools for a run; the loop itself knows nothing about MCP.

use async_trait::async_trait;
use serde_json::Value;

/// Dispatches one tool call by name, returning its JSON result as a string.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Run `name` with `args` and return its result, already rendered as a
    /// JSON string suitable for a tool-result message. Implementations
    /// should never return `Err`-like control flow through this trait —
    /// transport/dispatch failures are rendered into the string itself
    /// (the router's MCP-backed invoker does this the same way the MCP
    /// bridge renders its own transport errors).
    async fn invoke(&self, name: &str, args: Value) -> String;
}
