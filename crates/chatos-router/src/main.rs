//! `sub_agent_router`: an MCP tool server over stdio exposing sub-agent
//! selection, execution, and job supervision (§4.10, §6).
//!
//! This binary owns the only `rmcp`-server-shaped code in the workspace:
//! it wires [`RouterApp`] (transport-agnostic) onto `rmcp`'s
//! `#[tool_router]`/`#[tool_handler]` machinery and serves it over stdio.
//! Everything else — selection, execution, persistence — lives in library
//! crates and is exercised directly by their own unit tests.

use std::sync::Arc;

use clap::Parser;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::transport::stdio;
use rmcp::{Json, ServerHandler, ServiceExt, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use chatos_catalog::Catalog;
use chatos_config::ConfigStore;
use chatos_core::{RunId, SessionId, StateRoot};
use chatos_jobs::{JobStore, JobSupervisor};
use chatos_router::{Cli, RouterApp, RouterDefaults, RunInput, SuggestInput, to_tool_error};
use chatos_storage::{KvStore, SurrealKvStore};

/// `get_sub_agent` keys on a single agent id.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct AgentIdParams {
    /// The agent id to look up.
    agent_id: String,
}

/// `get_sub_agent_status` / `cancel_sub_agent_job` share this shape.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct JobIdParams {
    /// The job id, as returned by `run_sub_agent`/`start_sub_agent_async`.
    job_id: String,
}

/// The MCP-facing wrapper around [`RouterApp`]: one `#[tool]` method per
/// entry in §4.10, each a thin adapter from `rmcp`'s typed parameters to
/// the transport-agnostic application methods.
#[derive(Clone)]
struct SubAgentRouterServer {
    app: Arc<RouterApp>,
    tool_router: ToolRouter<Self>,
}

impl SubAgentRouterServer {
    fn new(app: Arc<RouterApp>) -> Self {
        Self {
            app,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl SubAgentRouterServer {
    #[tool(description = "Fetch a sub-agent's catalog entry by id: name, description, category, skills, and commands.")]
    async fn get_sub_agent(&self, Parameters(params): Parameters<AgentIdParams>) -> Result<Json<Value>, String> {
        self.app
            .get_sub_agent(&params.agent_id)
            .await
            .map(Json)
            .map_err(|e| to_tool_error(&e))
    }

    #[tool(
        description = "Suggest the best-matching sub-agent for a task without running it. Deterministic scoring, or LLM-assisted when a model is configured."
    )]
    async fn suggest_sub_agent(&self, Parameters(params): Parameters<SuggestInput>) -> Result<Json<Value>, String> {
        self.app.suggest_sub_agent(params).await.map(Json).map_err(|e| to_tool_error(&e))
    }

    #[tool(description = "Select and run a sub-agent synchronously, returning its full result once it completes.")]
    async fn run_sub_agent(&self, Parameters(params): Parameters<RunInput>) -> Result<Json<Value>, String> {
        self.app.run_sub_agent(params).await.map(Json).map_err(|e| to_tool_error(&e))
    }

    #[tool(
        description = "Select and start a sub-agent job in the background, returning its job_id immediately; poll get_sub_agent_status for the outcome."
    )]
    async fn start_sub_agent_async(&self, Parameters(params): Parameters<RunInput>) -> Result<Json<Value>, String> {
        self.app
            .start_sub_agent_async(params)
            .await
            .map(Json)
            .map_err(|e| to_tool_error(&e))
    }

    #[tool(description = "Fetch the current status and, if terminal, the result of a job started with start_sub_agent_async.")]
    async fn get_sub_agent_status(&self, Parameters(params): Parameters<JobIdParams>) -> Result<Json<Value>, String> {
        self.app
            .get_sub_agent_status(&params.job_id)
            .await
            .map(Json)
            .map_err(|e| to_tool_error(&e))
    }

    #[tool(description = "Cancel a running sub-agent job. Idempotent: cancelling an already-terminal job reports its existing status.")]
    async fn cancel_sub_agent_job(&self, Parameters(params): Parameters<JobIdParams>) -> Result<Json<Value>, String> {
        self.app
            .cancel_sub_agent_job(&params.job_id)
            .await
            .map(Json)
            .map_err(|e| to_tool_error(&e))
    }
}

#[tool_handler]
impl ServerHandler for SubAgentRouterServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.app.server_name.clone(),
                title: Some("Sub-Agent Router".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Selects and runs configured sub-agents (external commands or LLM tool-calling \
                 conversations). Use suggest_sub_agent to preview a selection, run_sub_agent for a \
                 synchronous call, or start_sub_agent_async + get_sub_agent_status/cancel_sub_agent_job \
                 for long-running work."
                    .to_string(),
            ),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(llm_cmd) = &cli.llm_cmd {
        // `chatos_llm` reads this var directly; propagating it here lets
        // `--llm-cmd` work even when the matching env var itself was never
        // set (§6).
        #[allow(unsafe_code)]
        // SAFETY: single-threaded at this point in startup, before any task
        // that might read env vars concurrently has been spawned.
        unsafe {
            std::env::set_var("SUBAGENT_LLM_CMD", llm_cmd);
        }
    }

    chatos_telemetry::setup_logging(
        &chatos_telemetry::LogConfig::new(cli.log_directive()).with_format(cli.log_format.into()),
    )
    .ok();

    info!(server = %cli.name, "starting sub_agent_router");

    let state_root = match &cli.state_root {
        Some(path) => StateRoot::from_path(path.clone()),
        None => StateRoot::resolve()?,
    };
    let paths = state_root.server(&cli.name);
    paths.ensure()?;

    let kv = Arc::new(SurrealKvStore::open(&paths.db_path())?) as Arc<dyn KvStore>;

    let marketplace_path = cli.marketplace_path.clone().unwrap_or_else(|| paths.marketplace_path());
    let config = Arc::new(ConfigStore::new(Arc::clone(&kv), Some(marketplace_path.clone())));
    config.ensure_marketplace_file().await.ok();

    let registry_path = paths.registry_path();
    let registry_path = if registry_path.exists() { Some(registry_path) } else { None };
    let catalog = Arc::new(
        Catalog::load(
            marketplace_path,
            registry_path,
            cli.plugins_root.clone().or_else(|| Some(paths.plugins_dir())),
        )
        .await,
    );

    let jobs = Arc::new(JobStore::new(Arc::clone(&kv)));
    let supervisor = Arc::new(JobSupervisor::new());

    let session_id = cli.session_id.clone().map(SessionId::new).unwrap_or_else(SessionId::resolve);
    let run_id = cli.run_id.clone().map(RunId::new).unwrap_or_else(RunId::resolve);

    let defaults = RouterDefaults {
        command_timeout_ms: cli.timeout_ms,
        command_max_output_bytes: cli.max_output_bytes,
        llm_timeout_ms: cli.llm_timeout_ms,
        llm_max_output_bytes: cli.llm_max_output_bytes,
        log_ai: cli.log_ai,
        log_ai_max_chars: cli.log_ai_max_chars,
        log_ai_dir: cli.log_ai_dir.clone().or_else(|| Some(paths.dir().join("ai-logs"))),
    };

    let app = Arc::new(RouterApp {
        server_name: cli.name.clone(),
        catalog,
        config,
        jobs,
        supervisor,
        session_id,
        run_id,
        defaults,
    });

    if let Some(port) = cli.admin_port {
        info!(
            port,
            host = cli.admin_host.as_deref().unwrap_or("127.0.0.1"),
            "admin HTTP is not a separate listener in this build; use RouterApp::admin_overview from an embedding process"
        );
    }

    let server = SubAgentRouterServer::new(app);
    let running = server.serve(stdio()).await.inspect_err(|e| {
        error!(error = %e, "failed to start MCP server");
    })?;
    running.waiting().await?;

    Ok(())
}
