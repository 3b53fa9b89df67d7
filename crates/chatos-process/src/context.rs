//! The command being run and the sub-agent context threaded into its
//! environment as `SUBAGENT_*` variables (§4.5).

use std::collections::HashMap;
use std::path::PathBuf;

use crate::quote::split_words;

/// An `exec` spec: a form of a command, or the raw shell-like string to
/// parse one from (§3 `Command`, §4.5).
#[derive(Debug, Clone)]
pub enum Exec {
    /// Already-split argv.
    Argv(Vec<String>),
    /// A shell-like string to split with POSIX quoting rules.
    Shell(String),
}

impl Exec {
    /// Resolve to argv, applying [`split_words`] for the `Shell` variant.
    #[must_use]
    pub fn into_argv(self) -> Vec<String> {
        match self {
            Exec::Argv(argv) => argv,
            Exec::Shell(s) => split_words(&s),
        }
    }
}

/// A runnable child-process spec (§3 `Command`, §4.5).
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    /// The program and its arguments.
    pub exec: Vec<String>,
    /// Working directory; defaults to the current directory when absent.
    pub cwd: Option<PathBuf>,
    /// Extra environment variables overlaid on the inherited environment.
    pub env: HashMap<String, String>,
}

/// The sub-agent context carried into a spawned command's environment
/// (§4.5): everything the spec lists under `SUBAGENT_*`.
#[derive(Debug, Clone, Default)]
pub struct SpawnContext {
    /// The task description passed to `run_sub_agent`.
    pub task: String,
    /// The resolved agent id, if any.
    pub agent_id: Option<String>,
    /// The resolved command id, if any.
    pub command_id: Option<String>,
    /// Skill ids in effect for this run.
    pub skills: Vec<String>,
    /// The requested category, if any.
    pub category: Option<String>,
    /// The free-text query, if any.
    pub query: Option<String>,
    /// The model id used for this run, if any.
    pub model: Option<String>,
    /// The caller's own model id, if known.
    pub caller_model: Option<String>,
    /// Effective allow-prefix list, comma-joined in the environment.
    pub allow_prefixes: Vec<String>,
    /// JSON summary of the enabled MCP servers available to this run.
    pub mcp_servers_summary: serde_json::Value,
}

impl SpawnContext {
    /// Build the `SUBAGENT_*` environment variable overlay.
    #[must_use]
    pub fn env_vars(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("SUBAGENT_TASK".to_string(), self.task.clone());
        if let Some(id) = &self.agent_id {
            vars.insert("SUBAGENT_AGENT_ID".to_string(), id.clone());
        }
        if let Some(id) = &self.command_id {
            vars.insert("SUBAGENT_COMMAND_ID".to_string(), id.clone());
        }
        vars.insert("SUBAGENT_SKILLS".to_string(), self.skills.join(","));
        if let Some(category) = &self.category {
            vars.insert("SUBAGENT_CATEGORY".to_string(), category.clone());
        }
        if let Some(query) = &self.query {
            vars.insert("SUBAGENT_QUERY".to_string(), query.clone());
        }
        if let Some(model) = &self.model {
            vars.insert("SUBAGENT_MODEL".to_string(), model.clone());
        }
        if let Some(caller_model) = &self.caller_model {
            vars.insert("SUBAGENT_CALLER_MODEL".to_string(), caller_model.clone());
        }
        vars.insert(
            "SUBAGENT_ALLOW_PREFIXES".to_string(),
            self.allow_prefixes.join(","),
        );
        vars.insert(
            "SUBAGENT_MCP_SERVERS".to_string(),
            self.mcp_servers_summary.to_string(),
        );
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_vars_joins_lists_with_commas() {
        let ctx = SpawnContext {
            task: "do thing".into(),
            skills: vec!["pandas".into(), "numpy".into()],
            allow_prefixes: vec!["mcp_fs_".into(), "mcp_git_".into()],
            mcp_servers_summary: serde_json::json!([{"name": "fs"}]),
            ..Default::default()
        };
        let vars = ctx.env_vars();
        assert_eq!(vars["SUBAGENT_TASK"], "do thing");
        assert_eq!(vars["SUBAGENT_SKILLS"], "pandas,numpy");
        assert_eq!(vars["SUBAGENT_ALLOW_PREFIXES"], "mcp_fs_,mcp_git_");
        assert!(vars["SUBAGENT_MCP_SERVERS"].contains("\"name\":\"fs\""));
    }

    #[test]
    fn exec_shell_splits_with_quoting() {
        let exec = Exec::Shell("echo 'hello world'".to_string());
        assert_eq!(exec.into_argv(), vec!["echo", "hello world"]);
    }
}
