//! Mapping every dependency crate's error type onto [`RouterError`] (§7).
//!
//! The design note calls for "a single `impl From<…> for RouterError` per
//! source type", but neither `From`, `RouterError` (defined in
//! `chatos_core`), nor any of these source types live in this crate, so
//! Rust's orphan rule rules that out — an inherent or trait impl for a
//! foreign type is only legal in the crate that defines the type or the
//! trait. A free function per source type is the closest realization:
//! still exactly one place per error kind, still exhaustively matched so a
//! new variant fails to compile rather than silently falling through to
//! `Fatal`.

use chatos_config::ConfigError;
use chatos_core::RouterError;
use chatos_jobs::JobsError;
use chatos_llm::LlmError;
use chatos_mcp::McpError;
use chatos_process::ProcessError;
use chatos_storage::StorageError;

/// Map a config-store failure onto [`RouterError`].
#[must_use]
pub fn config_err(e: ConfigError) -> RouterError {
    match e {
        ConfigError::NotFound(msg) => RouterError::NotFound(msg),
        ConfigError::Invalid(msg) => RouterError::BadInput(msg),
        ConfigError::Serialization(e) => RouterError::Fatal(e.to_string()),
        ConfigError::Storage(e) => storage_err(e),
        ConfigError::Io(e) => RouterError::Fatal(e.to_string()),
    }
}

/// Map a storage-tier failure onto [`RouterError`].
#[must_use]
pub fn storage_err(e: StorageError) -> RouterError {
    RouterError::Fatal(e.to_string())
}

/// Map a job-store failure onto [`RouterError`].
#[must_use]
pub fn jobs_err(e: JobsError) -> RouterError {
    match e {
        JobsError::NotFound(msg) => RouterError::NotFound(msg),
        JobsError::ForeignSession { job_id, session_id } => {
            RouterError::ForeignSession(format!("job {job_id} does not belong to session {session_id}"))
        }
        JobsError::Serialization(e) => RouterError::Fatal(e.to_string()),
        JobsError::Storage(e) => storage_err(e),
    }
}

/// Map an LLM-driver failure onto [`RouterError`].
#[must_use]
pub fn llm_err(e: LlmError) -> RouterError {
    match e {
        LlmError::NoModel => RouterError::BadInput("no model configured".to_string()),
        LlmError::Transport(msg) | LlmError::InvalidResponse(msg) => RouterError::BadInput(msg),
        LlmError::Api { status, message } => {
            RouterError::Transient(format!("API error ({status}): {message}"))
        }
        LlmError::Aborted => RouterError::Transient("llm call aborted".to_string()),
        LlmError::TimedOut => RouterError::Transient("llm call timed out".to_string()),
        LlmError::RetriesExhausted(msg) => RouterError::Transient(msg),
        LlmError::Command(e) => process_err(e),
    }
}

/// Map a process-runner failure onto [`RouterError`].
#[must_use]
pub fn process_err(e: ProcessError) -> RouterError {
    match e {
        ProcessError::MissingExec => RouterError::BadInput("command has no exec".to_string()),
        ProcessError::Spawn(e) => RouterError::Transient(e.to_string()),
    }
}

/// Map an MCP bridge failure onto [`RouterError`].
#[must_use]
pub fn mcp_err(e: McpError) -> RouterError {
    match e {
        McpError::InvalidConfig { server, reason } => {
            RouterError::BadInput(format!("mcp server '{server}': {reason}"))
        }
        McpError::Connect { server, reason } => {
            RouterError::Transient(format!("mcp server '{server}': {reason}"))
        }
        McpError::ToolNotFound(name) => RouterError::NotFound(format!("mcp tool '{name}'")),
    }
}

/// Render a [`RouterError`] as an `rmcp` tool-level error string (§4.10:
/// "errors on the tool interface become MCP errors, not result payloads,
/// unless otherwise specified").
#[must_use]
pub fn to_tool_error(e: &RouterError) -> String {
    format!("{}: {e}", e.kind())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jobs_foreign_session_maps_to_router_foreign_session() {
        let mapped = jobs_err(JobsError::ForeignSession {
            job_id: "j1".to_string(),
            session_id: "s1".to_string(),
        });
        assert_eq!(mapped.kind(), "foreign_session");
    }

    #[test]
    fn process_missing_exec_maps_to_bad_input() {
        let mapped = process_err(ProcessError::MissingExec);
        assert_eq!(mapped.kind(), "bad_input");
    }

    #[test]
    fn to_tool_error_includes_kind_prefix() {
        let rendered = to_tool_error(&RouterError::NotFound("agent x".to_string()));
        assert_eq!(rendered, "not_found: not found: agent x");
    }
}
