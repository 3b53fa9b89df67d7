//! Types describing a connected server's tools and a call's JSON result
//! (§4.8).

use rmcp::model::{CallToolResult, RawContent};
use serde_json::{Value, json};

/// One tool exposed by a connected MCP server, renamed under the
/// `mcp_<slug(serverName)>_` prefix (§4.8).
#[derive(Debug, Clone)]
pub struct McpToolInfo {
    /// Id of the owning [`chatos_config::McpServerConfig`].
    pub server_id: String,
    /// The server's configured name.
    pub server_name: String,
    /// The tool's name as renamed for the loop (`mcp_<slug>_<rawName>`).
    pub prefixed_name: String,
    /// The tool's original name on the server.
    pub raw_name: String,
    /// Human-readable description, if the server provided one.
    pub description: Option<String>,
    /// JSON Schema for the tool's arguments.
    pub input_schema: Value,
}

/// Render a [`CallToolResult`] as the `callTool` JSON payload shape (§4.8):
/// `{ok, server_id, server_name, tool, content, structured, is_error}`.
#[must_use]
pub fn render_call_result(
    server_id: &str,
    server_name: &str,
    tool: &str,
    result: &CallToolResult,
) -> Value {
    let is_error = result.is_error.unwrap_or(false);
    let content: Vec<Value> = result.content.iter().map(content_to_json).collect();
    json!({
        "ok": !is_error,
        "server_id": server_id,
        "server_name": server_name,
        "tool": tool,
        "content": content,
        "structured": result.structured_content,
        "is_error": is_error,
    })
}

/// Render a transport/dispatch failure as the same JSON shape, with an
/// `error` field added (§4.8).
#[must_use]
pub fn render_call_error(server_id: &str, server_name: &str, tool: &str, error: &str) -> Value {
    json!({
        "ok": false,
        "server_id": server_id,
        "server_name": server_name,
        "tool": tool,
        "content": Value::Array(vec![]),
        "structured": Value::Null,
        "is_error": true,
        "error": error,
    })
}

fn content_to_json(content: &rmcp::model::Content) -> Value {
    match &**content {
        RawContent::Text(text) => json!({"type": "text", "text": text.text}),
        RawContent::Image(image) => {
            json!({"type": "image", "data": image.data, "mimeType": image.mime_type})
        }
        RawContent::Audio(audio) => {
            json!({"type": "audio", "data": audio.data, "mimeType": audio.mime_type})
        }
        RawContent::Resource(embedded) => match &embedded.resource {
            rmcp::model::ResourceContents::TextResourceContents { uri, text, .. } => {
                json!({"type": "resource", "uri": uri, "text": text})
            }
            rmcp::model::ResourceContents::BlobResourceContents { uri, .. } => {
                json!({"type": "resource", "uri": uri})
            }
        },
        RawContent::ResourceLink(link) => {
            json!({"type": "resource_link", "uri": link.uri})
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_call_error_marks_not_ok() {
        let payload = render_call_error("s1", "fs", "mcp_fs_read_file", "connection reset");
        assert_eq!(payload["ok"], false);
        assert_eq!(payload["is_error"], true);
        assert_eq!(payload["error"], "connection reset");
        assert_eq!(payload["tool"], "mcp_fs_read_file");
    }
}
