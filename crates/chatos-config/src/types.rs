//! Typed records persisted by the config store (§3, §4.1 of the design spec).
//!
//! Every record carries its own `id` plus `created_at`/`updated_at`
//! timestamps; every write refreshes `updated_at`. Unknown settings keys are
//! preserved as opaque JSON rather than rejected (§9 "dynamic config blobs").

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A configured chat-completion endpoint.
///
/// `base_url` is normalized on construction: a trailing slash is stripped and
/// `/v1` is appended if the path does not already end with a version
/// segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Unique identifier.
    pub id: String,
    /// Human-readable label.
    pub name: String,
    /// API key sent with every request.
    pub api_key: String,
    /// Base URL of the chat-completion endpoint.
    pub base_url: String,
    /// Model identifier passed to the endpoint.
    pub model: String,
    /// Whether to inject a `thinking: {type: "enabled"}` request field for
    /// providers that support it.
    pub reasoning_enabled: bool,
    /// Whether to speak the "responses" SSE protocol instead of
    /// chat-completions.
    pub responses_enabled: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-write timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ModelConfig {
    /// Normalize a base URL: strip a trailing slash, then append `/v1` if
    /// the remaining path has no version segment.
    #[must_use]
    pub fn normalize_base_url(raw: &str) -> String {
        let trimmed = raw.trim_end_matches('/');
        if trimmed.ends_with("/v1") || trimmed.is_empty() {
            trimmed.to_string()
        } else {
            format!("{trimmed}/v1")
        }
    }

    /// True if `base_url` or `model` suggests a Moonshot/Kimi-compatible
    /// provider, the one known provider family that accepts the `thinking`
    /// request field (§4.6).
    #[must_use]
    pub fn is_moonshot_like(&self) -> bool {
        let haystack = format!("{} {}", self.base_url, self.model).to_lowercase();
        haystack.contains("moonshot") || haystack.contains("kimi")
    }
}

/// Transport used to reach an MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpTransport {
    /// Spawn `command` as a child process and speak MCP over its stdio.
    Stdio,
    /// Plain HTTP request/response transport.
    Http,
    /// Server-sent-events streaming transport.
    Sse,
}

/// A configured upstream MCP tool server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name; also the source of the `mcp_<slug>_` tool
    /// prefix (§4.8).
    pub name: String,
    /// Transport to use.
    pub transport: McpTransport,
    /// Executable to spawn (required for `Stdio`).
    pub command: Option<String>,
    /// Arguments passed to `command`.
    pub args: Vec<String>,
    /// Endpoint URL (required for `Http`/`Sse`).
    pub endpoint_url: Option<String>,
    /// Extra HTTP headers, JSON-encoded as an object of string to string.
    pub headers_json: Option<String>,
    /// Whether this server is active; disabled servers are never connected.
    pub enabled: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-write timestamp.
    pub updated_at: DateTime<Utc>,
}

impl McpServerConfig {
    /// Validate the transport-specific required fields (§3).
    ///
    /// # Errors
    ///
    /// Returns a message describing the missing field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        match self.transport {
            McpTransport::Stdio if self.command.is_none() => {
                Err("command is required for stdio transport".to_string())
            }
            McpTransport::Http | McpTransport::Sse if self.endpoint_url.is_none() => {
                Err("endpoint_url is required for http/sse transport".to_string())
            }
            _ => Ok(()),
        }
    }

    /// The `mcp_<slug(name)>_` prefix this server's tools are renamed under.
    ///
    /// Unlike [`chatos_core::slugify`] (which separates on `-`, used for
    /// catalog ids), this prefix separates words with `_` so it reads as one
    /// tool-name segment: `"Task Manager"` → `"mcp_task_manager_"`.
    #[must_use]
    pub fn tool_prefix(&self) -> String {
        format!("mcp_{}_", prefix_slug(&self.name))
    }
}

/// Lowercase `name`, replacing runs of non-alphanumeric characters with a
/// single `_`, then trim leading/trailing `_` (§4.1 `getEffectiveAllowPrefixes`).
#[must_use]
pub fn prefix_slug(name: &str) -> String {
    let lower = name.to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut last_was_sep = false;
    for ch in lower.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    out.trim_matches('_').to_string()
}

/// Per-run timeout/output-cap overrides (§3). Unset fields fall back to
/// CLI/env defaults at the call site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// LLM request timeout override, in milliseconds.
    pub ai_timeout_ms: Option<u64>,
    /// LLM output byte cap override.
    pub ai_max_output_bytes: Option<u64>,
    /// Tool-call loop turn-limit override.
    pub ai_tool_max_turns: Option<u32>,
    /// LLM retry-budget override.
    pub ai_max_retries: Option<u32>,
    /// Child-process timeout override, in milliseconds.
    pub command_timeout_ms: Option<u64>,
    /// Child-process output byte cap override.
    pub command_max_output_bytes: Option<u64>,
}

/// A stored marketplace manifest (§3, §4.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketplaceRecord {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// The raw manifest JSON as uploaded/registered.
    pub json: serde_json::Value,
    /// Number of plugins the manifest declares.
    pub plugin_count: usize,
    /// Whether this record currently contributes to the effective manifest.
    pub active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-write timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A tagged variant for the handful of settings the router reads by name,
/// with a typed fallback for anything else so unknown keys survive a
/// read-modify-write round-trip untouched (§9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum SettingValue {
    /// The `id` of the [`ModelConfig`] currently used for runs.
    ActiveModelId(String),
    /// A manual allow-prefix list overriding the MCP-server-derived one.
    AllowPrefixes(Vec<String>),
    /// Any other setting, keyed by name, preserved verbatim.
    Other(serde_json::Value),
}

/// Local agent registry file shape (`subagents.json`, §6): a flat list of
/// agent specs layered on top of the marketplace-derived catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentRegistryFile {
    /// Registry agents, keyed by id on load (registry wins on collision).
    pub agents: Vec<AgentSpec>,
}

/// One locally-registered agent, as persisted in `subagents.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// Optional grouping category.
    #[serde(default)]
    pub category: Option<String>,
    /// Skill ids this agent carries.
    #[serde(default)]
    pub skills: Vec<String>,
    /// Subset of `skills` used by default when none are requested.
    #[serde(default)]
    pub default_skills: Vec<String>,
    /// Commands this agent exposes.
    #[serde(default)]
    pub commands: Vec<CommandSpec>,
    /// Id of the command used when none is requested.
    #[serde(default)]
    pub default_command: Option<String>,
    /// Path to a system-prompt markdown file.
    #[serde(default)]
    pub system_prompt_path: Option<String>,
    /// Name of the plugin this agent came from, if any.
    #[serde(default)]
    pub plugin: Option<String>,
}

/// A runnable form of an [`AgentSpec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Unique within the owning agent.
    pub id: String,
    /// Display name; falls back to `id` when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Short description.
    #[serde(default)]
    pub description: Option<String>,
    /// Argv to spawn as a child process. Absent ⇒ prompt-only LLM turn.
    #[serde(default)]
    pub exec: Option<Vec<String>>,
    /// Working directory override.
    #[serde(default)]
    pub cwd: Option<String>,
    /// Extra environment variables to overlay on the spawn.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Path to a markdown file of prompt instructions.
    #[serde(default)]
    pub instructions_path: Option<String>,
}

/// A named text resource appended to a run's system prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSpec {
    /// Globally unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Short description.
    #[serde(default)]
    pub description: Option<String>,
    /// Path to the skill's markdown content.
    pub path: String,
    /// Name of the plugin this skill came from, if any.
    #[serde(default)]
    pub plugin: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_base_url_strips_slash_and_appends_v1() {
        assert_eq!(
            ModelConfig::normalize_base_url("https://api.example.com/"),
            "https://api.example.com/v1"
        );
        assert_eq!(
            ModelConfig::normalize_base_url("https://api.example.com/v1/"),
            "https://api.example.com/v1"
        );
        assert_eq!(
            ModelConfig::normalize_base_url("https://api.example.com/v1"),
            "https://api.example.com/v1"
        );
    }

    #[test]
    fn mcp_server_validate_requires_transport_fields() {
        let base = McpServerConfig {
            id: "a".into(),
            name: "Task Manager".into(),
            transport: McpTransport::Stdio,
            command: None,
            args: vec![],
            endpoint_url: None,
            headers_json: None,
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(base.validate().is_err());
        let mut with_command = base.clone();
        with_command.command = Some("npx".into());
        assert!(with_command.validate().is_ok());

        let mut http = base;
        http.transport = McpTransport::Http;
        assert!(http.validate().is_err());
        http.endpoint_url = Some("https://example.com".into());
        assert!(http.validate().is_ok());
    }

    #[test]
    fn tool_prefix_slugifies_name() {
        let cfg = McpServerConfig {
            id: "a".into(),
            name: "Task Manager".into(),
            transport: McpTransport::Stdio,
            command: Some("x".into()),
            args: vec![],
            endpoint_url: None,
            headers_json: None,
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(cfg.tool_prefix(), "mcp_task_manager_");
    }
}
