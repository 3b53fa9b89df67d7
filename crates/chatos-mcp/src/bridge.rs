//! Per-job MCP tool session: connects to every enabled server, merges their
//! tools under a prefix, and dispatches calls back to the owning server
//! (§4.8, §5 "tool session" lifetime).

use std::collections::HashMap;
use std::sync::Arc;

use chatos_config::McpServerConfig;
use rmcp::model::CallToolRequestParam;
use rmcp::service::RunningService;
use rmcp::transport::TokioChildProcess;
use rmcp::transport::sse_client::SseClientTransport;
use rmcp::transport::streamable_http_client::{
    StreamableHttpClientTransport, StreamableHttpClientTransportConfig,
};
use rmcp::{RoleClient, ServiceExt};
use serde_json::Value;
use tracing::warn;

use crate::error::{McpError, McpResult};
use crate::types::{McpToolInfo, render_call_error, render_call_result};

type Session = RunningService<RoleClient, ()>;

struct ConnectedServer {
    id: String,
    name: String,
    session: Session,
}

/// A set of MCP client connections opened for one run, and the merged,
/// prefix-renamed tool list they expose (§4.8).
pub struct McpBridge {
    servers: Vec<ConnectedServer>,
    tools: Vec<McpToolInfo>,
}

impl McpBridge {
    /// Connect to every enabled server in `configs`, list their tools,
    /// rename each to `mcp_<slug(serverName)>_<rawName>` (skipping servers
    /// whose tool is already prefixed that way), and keep only tools
    /// matching `allow_prefixes` when that list is non-empty. Collisions on
    /// the prefixed name keep the first tool seen (§4.8).
    ///
    /// A server that fails to connect is skipped with a logged warning; the
    /// bridge still serves whichever servers succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::InvalidConfig`] only if every enabled server's
    /// config fails validation (no servers to connect).
    pub async fn connect(configs: &[McpServerConfig], allow_prefixes: &[String]) -> McpResult<Self> {
        let enabled: Vec<&McpServerConfig> = configs.iter().filter(|c| c.enabled).collect();

        let mut servers = Vec::new();
        let mut tools = Vec::new();
        let mut seen_names: std::collections::HashSet<String> = std::collections::HashSet::new();

        for cfg in enabled {
            if let Err(reason) = cfg.validate() {
                warn!(server = %cfg.name, reason, "skipping misconfigured MCP server");
                continue;
            }
            match connect_one(cfg).await {
                Ok(session) => {
                    let raw_tools = match session.list_tools(None).await {
                        Ok(result) => result.tools,
                        Err(e) => {
                            warn!(server = %cfg.name, error = %e, "failed to list tools");
                            Vec::new()
                        }
                    };
                    let prefix = cfg.tool_prefix();
                    for tool in raw_tools {
                        let raw_name = tool.name.to_string();
                        let prefixed_name = if raw_name.starts_with(&prefix) {
                            raw_name.clone()
                        } else {
                            format!("{prefix}{raw_name}")
                        };
                        if !allow_prefixes.is_empty()
                            && !allow_prefixes.iter().any(|p| prefixed_name.starts_with(p.as_str()))
                        {
                            continue;
                        }
                        if !seen_names.insert(prefixed_name.clone()) {
                            continue;
                        }
                        tools.push(McpToolInfo {
                            server_id: cfg.id.clone(),
                            server_name: cfg.name.clone(),
                            prefixed_name,
                            raw_name,
                            description: tool.description.as_deref().map(String::from),
                            input_schema: serde_json::to_value(&*tool.input_schema)
                                .unwrap_or_else(|_| serde_json::json!({"type": "object"})),
                        });
                    }
                    servers.push(ConnectedServer {
                        id: cfg.id.clone(),
                        name: cfg.name.clone(),
                        session,
                    });
                }
                Err(e) => {
                    warn!(server = %cfg.name, error = %e, "failed to connect MCP server");
                }
            }
        }

        Ok(Self { servers, tools })
    }

    /// The merged, prefix-renamed tool set available to the run (§4.8).
    #[must_use]
    pub fn tools(&self) -> &[McpToolInfo] {
        &self.tools
    }

    /// Dispatch a call to the server that owns `prefixed_name`, returning the
    /// `{ok, server_id, server_name, tool, content, structured, is_error}`
    /// JSON string (§4.8). Transport failures are reported in the same
    /// shape with `ok:false` and an `error` field rather than as an `Err`.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::ToolNotFound`] if no connected server owns a tool
    /// by that name.
    pub async fn call_tool(&self, prefixed_name: &str, args: Value) -> McpResult<String> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.prefixed_name == prefixed_name)
            .ok_or_else(|| McpError::ToolNotFound(prefixed_name.to_string()))?;
        let server = self
            .servers
            .iter()
            .find(|s| s.id == tool.server_id)
            .ok_or_else(|| McpError::ToolNotFound(prefixed_name.to_string()))?;

        let arguments = match args {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other);
                Some(map)
            }
        };

        let params = CallToolRequestParam {
            name: tool.raw_name.clone().into(),
            arguments,
        };

        let payload = match server.session.call_tool(params).await {
            Ok(result) => render_call_result(&server.id, &server.name, prefixed_name, &result),
            Err(e) => render_call_error(&server.id, &server.name, prefixed_name, &e.to_string()),
        };

        Ok(payload.to_string())
    }

    /// Close every connected client. Must be called on every exit path of a
    /// tool-using run (§4.8).
    pub async fn close(self) {
        for server in self.servers {
            if let Err(e) = server.session.cancel().await {
                warn!(server = %server.name, error = %e, "error closing MCP session");
            }
        }
    }
}

async fn connect_one(cfg: &McpServerConfig) -> McpResult<Session> {
    match cfg.transport {
        chatos_config::McpTransport::Stdio => {
            let command = cfg.command.clone().ok_or_else(|| McpError::InvalidConfig {
                server: cfg.name.clone(),
                reason: "command is required for stdio transport".to_string(),
            })?;
            let mut proc = tokio::process::Command::new(&command);
            proc.args(&cfg.args);
            let child = TokioChildProcess::new(proc).map_err(|e| McpError::Connect {
                server: cfg.name.clone(),
                reason: e.to_string(),
            })?;
            ().serve(child).await.map_err(|e| McpError::Connect {
                server: cfg.name.clone(),
                reason: e.to_string(),
            })
        }
        chatos_config::McpTransport::Http => {
            let url = endpoint_url(cfg)?;
            let mut config = StreamableHttpClientTransportConfig::with_uri(Arc::from(url.as_str()));
            if let Some(header) = auth_header(cfg) {
                config = config.auth_header(header);
            }
            let transport = StreamableHttpClientTransport::from_config(config);
            ().serve(transport).await.map_err(|e| McpError::Connect {
                server: cfg.name.clone(),
                reason: e.to_string(),
            })
        }
        chatos_config::McpTransport::Sse => {
            let url = endpoint_url(cfg)?;
            let transport = SseClientTransport::start(Arc::from(url.as_str()))
                .await
                .map_err(|e| McpError::Connect {
                    server: cfg.name.clone(),
                    reason: e.to_string(),
                })?;
            ().serve(transport).await.map_err(|e| McpError::Connect {
                server: cfg.name.clone(),
                reason: e.to_string(),
            })
        }
    }
}

fn endpoint_url(cfg: &McpServerConfig) -> McpResult<String> {
    cfg.endpoint_url.clone().ok_or_else(|| McpError::InvalidConfig {
        server: cfg.name.clone(),
        reason: "endpoint_url is required for http/sse transport".to_string(),
    })
}

/// Extract an `Authorization` header value from `headersJson`, if present
/// (§4.8 "optional headers from headersJson"). Other header names are not
/// currently forwarded by the transport and are logged at debug level.
fn auth_header(cfg: &McpServerConfig) -> Option<String> {
    let raw = cfg.headers_json.as_ref()?;
    let headers: HashMap<String, String> = serde_json::from_str(raw).ok()?;
    for (key, value) in &headers {
        if key.eq_ignore_ascii_case("authorization") {
            return Some(value.clone());
        }
    }
    if !headers.is_empty() {
        tracing::debug!(server = %cfg.name, "non-authorization MCP headers are not forwarded");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn connect_with_no_servers_yields_empty_bridge() {
        let bridge = McpBridge::connect(&[], &[]).await.unwrap();
        assert!(bridge.tools().is_empty());
        bridge.close().await;
    }

    #[tokio::test]
    async fn disabled_servers_are_skipped() {
        let cfg = McpServerConfig {
            id: "s1".into(),
            name: "Task Manager".into(),
            transport: chatos_config::McpTransport::Stdio,
            command: Some("nonexistent-binary-xyz".into()),
            args: vec![],
            endpoint_url: None,
            headers_json: None,
            enabled: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let bridge = McpBridge::connect(&[cfg], &[]).await.unwrap();
        assert!(bridge.tools().is_empty());
        bridge.close().await;
    }

    #[tokio::test]
    async fn misconfigured_enabled_server_is_skipped_not_fatal() {
        let cfg = McpServerConfig {
            id: "s1".into(),
            name: "Broken".into(),
            transport: chatos_config::McpTransport::Stdio,
            command: None,
            args: vec![],
            endpoint_url: None,
            headers_json: None,
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let bridge = McpBridge::connect(&[cfg], &[]).await.unwrap();
        assert!(bridge.tools().is_empty());
        bridge.close().await;
    }
}
