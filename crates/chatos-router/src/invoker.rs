//! Bridges the tool-call loop's [`ToolInvoker`](chatos_toolloop::ToolInvoker)
//! seam to the MCP client bridge (§4.7, §4.8).

use serde_json::{Value, json};

use chatos_mcp::McpBridge;
use chatos_toolloop::ToolInvoker;

/// Invokes a named tool through an already-connected [`McpBridge`],
/// rendering transport failures into the returned string rather than an
/// `Err` (the tool-call loop never sees a dispatch error as control flow).
pub struct McpToolInvoker<'a> {
    bridge: &'a McpBridge,
}

impl<'a> McpToolInvoker<'a> {
    #[must_use]
    pub fn new(bridge: &'a McpBridge) -> Self {
        Self { bridge }
    }
}

#[async_trait::async_trait]
impl<'a> ToolInvoker for McpToolInvoker<'a> {
    async fn invoke(&self, name: &str, args: Value) -> String {
        match self.bridge.call_tool(name, args).await {
            Ok(rendered) => rendered,
            Err(e) => json!({"ok": false, "error": e.to_string()}).to_string(),
        }
    }
}
