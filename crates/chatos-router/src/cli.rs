//! Command-line surface (§6): one flag per recognized environment variable,
//! plus `--name` and the logging flags.

use std::path::PathBuf;

use clap::Parser;

/// `sub_agent_router` — an MCP tool server exposing sub-agent selection,
/// execution, and job supervision.
#[derive(Parser, Debug, Clone)]
#[command(name = "sub_agent_router")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Server name; also the per-instance state subdirectory.
    #[arg(long, default_value = "sub_agent_router")]
    pub name: String,

    /// Base state directory. Resolution otherwise follows
    /// `MCP_STATE_ROOT`, then `SUBAGENT_STATE_ROOT`, then
    /// `$HOME/.mcp-servers` (preferring the legacy `.mcp_servers` if it
    /// exists).
    #[arg(long = "state-root", env = "SUBAGENT_STATE_ROOT")]
    pub state_root: Option<PathBuf>,

    /// Path to the effective marketplace manifest.
    #[arg(long = "marketplace-path", env = "SUBAGENT_MARKETPLACE_PATH")]
    pub marketplace_path: Option<PathBuf>,

    /// Root directory for agent/skill/command markdown plugins.
    #[arg(long = "plugins-root", env = "SUBAGENT_PLUGINS_ROOT")]
    pub plugins_root: Option<PathBuf>,

    /// Default child-process wall-clock budget, in milliseconds.
    #[arg(long = "timeout-ms", env = "SUBAGENT_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Default per-stream byte cap on captured child-process output.
    #[arg(long = "max-output-bytes", env = "SUBAGENT_MAX_OUTPUT_BYTES")]
    pub max_output_bytes: Option<u64>,

    /// Default LLM request wall-clock budget, in milliseconds.
    #[arg(long = "llm-timeout-ms", env = "SUBAGENT_LLM_TIMEOUT_MS")]
    pub llm_timeout_ms: Option<u64>,

    /// Default LLM output byte cap.
    #[arg(long = "llm-max-output-bytes", env = "SUBAGENT_LLM_MAX_OUTPUT_BYTES")]
    pub llm_max_output_bytes: Option<u64>,

    /// Substitute a locally spawned process for the LLM HTTP transport; the
    /// command reads the rendered prompt from stdin and writes the answer
    /// to stdout. `chatos_llm` reads this from the environment directly, so
    /// passing it only as a flag (not already in the environment) is
    /// propagated to the environment at startup.
    #[arg(long = "llm-cmd", env = "SUBAGENT_LLM_CMD")]
    pub llm_cmd: Option<String>,

    /// Enable admin HTTP on this port. Realized as plain methods on the
    /// router's application struct rather than an HTTP listener (see
    /// `DESIGN.md`); accepted here for interface parity with every other
    /// recognized option.
    #[arg(long = "admin-port", env = "SUBAGENT_ADMIN_PORT")]
    pub admin_port: Option<u16>,

    /// Host to bind admin HTTP to.
    #[arg(long = "admin-host", env = "SUBAGENT_ADMIN_HOST")]
    pub admin_host: Option<String>,

    /// Process-wide session id override.
    #[arg(long = "session-id", env = "MODEL_CLI_SESSION_ID")]
    pub session_id: Option<String>,

    /// Process-wide run id override.
    #[arg(long = "run-id", env = "MODEL_CLI_RUN_ID")]
    pub run_id: Option<String>,

    /// Record LLM request/response/tool-call diagnostics as job events.
    #[arg(
        long = "log-ai",
        env = "SUBAGENT_LOG_AI",
        action = clap::ArgAction::Set,
        default_value_t = false
    )]
    pub log_ai: bool,

    /// Truncate diagnostic payloads to this many characters.
    #[arg(
        long = "log-ai-max-chars",
        env = "SUBAGENT_LOG_AI_MAX_CHARS",
        default_value_t = 4000
    )]
    pub log_ai_max_chars: usize,

    /// Mirror diagnostic payloads to files under this directory, one per job.
    #[arg(long = "log-ai-dir", env = "SUBAGENT_LOG_AI_DIR")]
    pub log_ai_dir: Option<PathBuf>,

    /// Base `tracing-subscriber` filter directive. Falls back to `RUST_LOG`,
    /// then `"info"`, when unset.
    #[arg(long = "log", env = "SUBAGENT_LOG")]
    pub log: Option<String>,

    /// Log output format.
    #[arg(long = "log-format", value_enum, default_value_t = LogFormatArg::Pretty)]
    pub log_format: LogFormatArg,
}

impl Cli {
    /// Resolve the base logging directive: `--log`/`SUBAGENT_LOG`, else
    /// `RUST_LOG`, else `"info"`.
    #[must_use]
    pub fn log_directive(&self) -> String {
        self.log
            .clone()
            .or_else(|| std::env::var("RUST_LOG").ok())
            .unwrap_or_else(|| "info".to_string())
    }
}

/// CLI-facing mirror of [`chatos_telemetry::LogFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable, colored when attached to a terminal.
    Pretty,
    /// Newline-delimited JSON, one object per event.
    Json,
}

impl From<LogFormatArg> for chatos_telemetry::LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => chatos_telemetry::LogFormat::Pretty,
            LogFormatArg::Json => chatos_telemetry::LogFormat::Json,
        }
    }
}
