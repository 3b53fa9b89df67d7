//! `RouterApp`: the six sub-agent MCP tools plus the unified admin read
//! surface (§4.10, §4.11), independent of any transport.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use chatos_catalog::Catalog;
use chatos_config::ConfigStore;
use chatos_core::{RouterError, RouterResult, RunId, SessionId};
use chatos_jobs::{JobEventKind, JobStatus, JobStore, JobSupervisor, ListJobsQuery};
use chatos_llm::{LlmDriver, LlmToolDefinition};
use chatos_mcp::McpBridge;
use chatos_process::{self as process, RunOptions};
use chatos_toolloop::{ToolLoop, ToolLoopRequest};

use crate::envelope::with_chatos;
use crate::error::{config_err, jobs_err, mcp_err, process_err};
use crate::events::JobEventSink;
use crate::invoker::McpToolInvoker;
use crate::prompt::build_system_prompt;
use crate::resolve::{SelectInput, mcp_servers_summary, resolve, resolve_allow_prefixes};

/// Startup configuration that never changes after `main` builds it (§3.1
/// `ProcessConfig`, realized here as the subset `RouterApp` needs).
#[derive(Debug, Clone, Default)]
pub struct RouterDefaults {
    pub command_timeout_ms: Option<u64>,
    pub command_max_output_bytes: Option<u64>,
    pub llm_timeout_ms: Option<u64>,
    pub llm_max_output_bytes: Option<u64>,
    pub log_ai: bool,
    pub log_ai_max_chars: usize,
    pub log_ai_dir: Option<PathBuf>,
}

/// Inputs shared by `run_sub_agent` and `start_sub_agent_async`.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct RunInput {
    /// The task description passed to the selected agent.
    pub task: String,
    /// Pin an exact agent id, bypassing scoring entirely.
    pub agent_id: Option<String>,
    /// Restrict selection to agents in this category.
    pub category: Option<String>,
    /// Skills to prefer during selection and load into the system prompt.
    pub skills: Option<Vec<String>>,
    /// Free-text query tokens scored against agent metadata.
    pub query: Option<String>,
    /// Pin an exact command on the resolved agent.
    pub command_id: Option<String>,
    /// Override the configured model for this run.
    pub model: Option<String>,
    /// The caller's own model, forwarded to child processes for context.
    pub caller_model: Option<String>,
    /// Explicit MCP tool-name allow-prefixes, overriding the configured default.
    pub mcp_allow_prefixes: Option<Vec<String>>,
}

/// Inputs for `suggest_sub_agent`.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct SuggestInput {
    pub task: String,
    pub category: Option<String>,
    pub skills: Option<Vec<String>>,
    pub query: Option<String>,
    pub command_id: Option<String>,
}

/// The router's application state: catalog, config, durable jobs, and
/// in-memory job supervision, plus the process-wide identifiers and
/// defaults every run inherits. Transport-agnostic (§4.10, §4.11).
pub struct RouterApp {
    pub server_name: String,
    pub catalog: Arc<Catalog>,
    pub config: Arc<ConfigStore>,
    pub jobs: Arc<JobStore>,
    pub supervisor: Arc<JobSupervisor>,
    pub session_id: SessionId,
    pub run_id: RunId,
    pub defaults: RouterDefaults,
}

impl RouterApp {
    async fn effective_timeouts(&self) -> RouterResult<(Option<u64>, Option<u64>, Option<u64>, Option<u64>, u32, u32)> {
        let runtime = self.config.runtime_config().await.map_err(config_err)?;
        Ok((
            runtime.command_timeout_ms.or(self.defaults.command_timeout_ms),
            runtime.command_max_output_bytes.or(self.defaults.command_max_output_bytes),
            runtime.ai_timeout_ms.or(self.defaults.llm_timeout_ms),
            runtime.ai_max_output_bytes.or(self.defaults.llm_max_output_bytes),
            runtime.ai_tool_max_turns.unwrap_or(chatos_toolloop::DEFAULT_MAX_TURNS),
            runtime.ai_max_retries.unwrap_or(5),
        ))
    }

    fn job_event_sink(&self, job_id: &str) -> Arc<JobEventSink> {
        Arc::new(JobEventSink::new(
            Arc::clone(&self.jobs),
            job_id.to_string(),
            self.session_id.clone(),
            self.run_id.clone(),
            self.defaults.log_ai,
            self.defaults.log_ai_max_chars,
            self.defaults.log_ai_dir.clone(),
        ))
    }

    /// `get_sub_agent({agent_id})` (§4.10).
    pub async fn get_sub_agent(&self, agent_id: &str) -> RouterResult<Value> {
        let agent = self
            .catalog
            .get_agent(agent_id)
            .await
            .ok_or_else(|| RouterError::NotFound(format!("sub-agent {agent_id} not found")))?;
        let commands: Vec<Value> = agent
            .commands
            .iter()
            .map(|c| {
                json!({
                    "id": c.id,
                    "name": c.name.clone().unwrap_or_default(),
                    "description": c.description.clone().unwrap_or_default(),
                })
            })
            .collect();
        let payload = json!({
            "agent": {
                "id": agent.id,
                "name": agent.name,
                "description": agent.description,
                "category": agent.category,
                "skills": agent.skills,
            },
            "commands": commands,
            "default_command": agent.default_command.clone().unwrap_or_default(),
        });
        Ok(with_chatos(&self.server_name, "get_sub_agent", payload, "ok"))
    }

    /// `suggest_sub_agent({task, category?, skills?, query?, command_id?})`
    /// (§4.10, §4.4). Always succeeds at the tool level; a "no match"
    /// outcome is reported as `agent_id: null`, not a protocol error.
    pub async fn suggest_sub_agent(&self, input: SuggestInput) -> RouterResult<Value> {
        let agents = self.catalog.list_agents().await;
        if agents.is_empty() {
            return Ok(with_chatos(
                &self.server_name,
                "suggest_sub_agent",
                json!({
                    "agent_id": null,
                    "skills": Vec::<String>::new(),
                    "reason": "No sub-agents available. Load a marketplace or registry.",
                }),
                "ok",
            ));
        }

        let select_input = SelectInput {
            task: input.task,
            agent_id: None,
            category: input.category,
            skills: input.skills,
            query: input.query,
            command_id: input.command_id,
        };

        let resolved = match resolve(&self.catalog, &self.config, &select_input).await {
            Ok(resolved) => resolved,
            Err(RouterError::NotFound(_)) => {
                return Ok(with_chatos(
                    &self.server_name,
                    "suggest_sub_agent",
                    json!({
                        "agent_id": null,
                        "skills": Vec::<String>::new(),
                        "reason": "No matching sub-agent. Add one to the registry or marketplace.",
                    }),
                    "ok",
                ));
            }
            Err(e) => return Err(e),
        };

        Ok(with_chatos(
            &self.server_name,
            "suggest_sub_agent",
            json!({
                "agent_id": resolved.agent.id,
                "agent_name": resolved.agent.name,
                "skills": resolved.used_skills.iter().map(|s| s.id.clone()).collect::<Vec<_>>(),
                "reason": resolved.reason,
            }),
            "ok",
        ))
    }

    /// `run_sub_agent(...)` (§4.10): synchronous selection + execution.
    pub async fn run_sub_agent(&self, input: RunInput) -> RouterResult<Value> {
        let resolved = resolve(
            &self.catalog,
            &self.config,
            &SelectInput {
                task: input.task.clone(),
                agent_id: input.agent_id.clone(),
                category: input.category.clone(),
                skills: input.skills.clone(),
                query: input.query.clone(),
                command_id: input.command_id.clone(),
            },
        )
        .await?;

        if resolved.command.is_none() && resolved.agent.system_prompt_path.is_none() {
            return Err(RouterError::BadInput(format!(
                "sub-agent {} has no runnable prompt or command",
                resolved.agent.id
            )));
        }

        let job = self
            .jobs
            .create_job(
                input.task.clone(),
                Some(resolved.agent.id.clone()),
                resolved.command.as_ref().map(|c| c.id.clone()),
                Some(serde_json::to_value(&input).unwrap_or(Value::Null)),
                self.session_id.clone(),
                self.run_id.clone(),
            )
            .await
            .map_err(jobs_err)?;
        self.jobs
            .update_job_status(&job.id, JobStatus::Running, None, None)
            .await
            .map_err(jobs_err)?;
        self.jobs
            .append_event(
                job.id.clone(),
                JobEventKind::Start,
                Some(json!({
                    "agent_id": resolved.agent.id,
                    "command_id": resolved.command.as_ref().map(|c| c.id.clone()),
                })),
                self.session_id.clone(),
                self.run_id.clone(),
            )
            .await
            .map_err(jobs_err)?;

        let (command_timeout_ms, command_max_output_bytes, llm_timeout_ms, llm_max_output_bytes, tool_max_turns, max_retries) =
            self.effective_timeouts().await?;

        let payload = self
            .execute(
                &job.id,
                &input,
                &resolved,
                command_timeout_ms,
                command_max_output_bytes,
                llm_timeout_ms,
                llm_max_output_bytes,
                tool_max_turns,
                max_retries,
                None,
            )
            .await;

        let status = payload["status"].as_str().unwrap_or("error").to_string();
        let job_status = if status == "ok" { JobStatus::Done } else { JobStatus::Error };
        let error = payload["error"].as_str().map(str::to_string);
        self.jobs
            .update_job_status(&job.id, job_status, Some(payload.clone()), error)
            .await
            .map_err(jobs_err)?;
        self.jobs
            .append_event(
                job.id.clone(),
                JobEventKind::Finish,
                Some(json!({"status": job_status, "exit_code": payload.get("exit_code")})),
                self.session_id.clone(),
                self.run_id.clone(),
            )
            .await
            .map_err(jobs_err)?;

        Ok(with_chatos(&self.server_name, "run_sub_agent", payload, &status))
    }

    /// `start_sub_agent_async(...)` (§4.10): creates the job, starts the
    /// work on a background task, and returns immediately.
    pub async fn start_sub_agent_async(self: &Arc<Self>, input: RunInput) -> RouterResult<Value> {
        let resolved = resolve(
            &self.catalog,
            &self.config,
            &SelectInput {
                task: input.task.clone(),
                agent_id: input.agent_id.clone(),
                category: input.category.clone(),
                skills: input.skills.clone(),
                query: input.query.clone(),
                command_id: input.command_id.clone(),
            },
        )
        .await?;

        if resolved.command.is_none() && resolved.agent.system_prompt_path.is_none() {
            return Err(RouterError::BadInput(format!(
                "sub-agent {} has no runnable prompt or command",
                resolved.agent.id
            )));
        }

        let job = self
            .jobs
            .create_job(
                input.task.clone(),
                Some(resolved.agent.id.clone()),
                resolved.command.as_ref().map(|c| c.id.clone()),
                Some(serde_json::to_value(&input).unwrap_or(Value::Null)),
                self.session_id.clone(),
                self.run_id.clone(),
            )
            .await
            .map_err(jobs_err)?;
        self.jobs
            .update_job_status(&job.id, JobStatus::Running, None, None)
            .await
            .map_err(jobs_err)?;
        self.jobs
            .append_event(
                job.id.clone(),
                JobEventKind::Start,
                Some(json!({
                    "agent_id": resolved.agent.id,
                    "command_id": resolved.command.as_ref().map(|c| c.id.clone()),
                })),
                self.session_id.clone(),
                self.run_id.clone(),
            )
            .await
            .map_err(jobs_err)?;

        let response = with_chatos(
            &self.server_name,
            "start_sub_agent_async",
            json!({
                "status": "running",
                "job_id": job.id,
                "agent_id": resolved.agent.id,
                "agent_name": resolved.agent.name,
                "command_id": resolved.command.as_ref().map(|c| c.id.clone()),
                "skills": resolved.used_skills.iter().map(|s| s.id.clone()).collect::<Vec<_>>(),
                "reason": resolved.reason,
            }),
            "ok",
        );

        let app = Arc::clone(self);
        let job_id = job.id.clone();
        tokio::spawn(async move {
            let (command_timeout_ms, command_max_output_bytes, llm_timeout_ms, llm_max_output_bytes, tool_max_turns, max_retries) =
                match app.effective_timeouts().await {
                    Ok(v) => v,
                    Err(_) => (None, None, None, None, chatos_toolloop::DEFAULT_MAX_TURNS, 5),
                };
            let cancel = app.supervisor.track(job_id.clone(), None).await;
            let payload = app
                .execute(
                    &job_id,
                    &input,
                    &resolved,
                    command_timeout_ms,
                    command_max_output_bytes,
                    llm_timeout_ms,
                    llm_max_output_bytes,
                    tool_max_turns,
                    max_retries,
                    Some(cancel),
                )
                .await;

            let was_cancelled = app.supervisor.is_cancelled(&job_id).await;
            if was_cancelled {
                let _ = app
                    .jobs
                    .append_event(
                        job_id.clone(),
                        JobEventKind::FinishIgnored,
                        Some(json!({"status": payload["status"]})),
                        app.session_id.clone(),
                        app.run_id.clone(),
                    )
                    .await;
            } else {
                let status = payload["status"].as_str().unwrap_or("error").to_string();
                let job_status = if status == "ok" { JobStatus::Done } else { JobStatus::Error };
                let error = payload["error"].as_str().map(str::to_string);
                let _ = app.jobs.update_job_status(&job_id, job_status, Some(payload.clone()), error).await;
                let _ = app
                    .jobs
                    .append_event(
                        job_id.clone(),
                        JobEventKind::Finish,
                        Some(json!({"status": job_status, "exit_code": payload.get("exit_code")})),
                        app.session_id.clone(),
                        app.run_id.clone(),
                    )
                    .await;
            }
            app.supervisor.untrack(&job_id).await;
        });

        Ok(response)
    }

    /// `get_sub_agent_status({job_id})` (§4.10).
    pub async fn get_sub_agent_status(&self, job_id: &str) -> RouterResult<Value> {
        let job = self
            .jobs
            .get_job_in_session(job_id, &self.session_id)
            .await
            .map_err(jobs_err)?;
        Ok(with_chatos(
            &self.server_name,
            "get_sub_agent_status",
            json!({"job": job}),
            "ok",
        ))
    }

    /// `cancel_sub_agent_job({job_id})` (§4.10). Preserves any already
    /// recorded `resultJson`; only freezes the status.
    pub async fn cancel_sub_agent_job(&self, job_id: &str) -> RouterResult<Value> {
        let job = self
            .jobs
            .get_job_in_session(job_id, &self.session_id)
            .await
            .map_err(jobs_err)?;

        if job.status.is_terminal() {
            return Ok(with_chatos(
                &self.server_name,
                "cancel_sub_agent_job",
                json!({"cancelled": false, "job_id": job_id, "status": job.status}),
                "ok",
            ));
        }

        self.supervisor.cancel(job_id).await;
        let updated = self
            .jobs
            .update_job_status(job_id, JobStatus::Cancelled, job.result_json.clone(), job.error.clone())
            .await
            .map_err(jobs_err)?;
        self.jobs
            .append_event(
                job_id.to_string(),
                JobEventKind::Cancel,
                None,
                self.session_id.clone(),
                self.run_id.clone(),
            )
            .await
            .map_err(jobs_err)?;

        Ok(with_chatos(
            &self.server_name,
            "cancel_sub_agent_job",
            json!({"cancelled": true, "job_id": updated.id, "status": updated.status}),
            "ok",
        ))
    }

    /// Run the resolved agent/command to completion, returning the
    /// `run_sub_agent`-shaped result payload (without the `chatos`
    /// envelope or job-store side effects, which callers add).
    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        job_id: &str,
        input: &RunInput,
        resolved: &crate::resolve::Resolved,
        command_timeout_ms: Option<u64>,
        command_max_output_bytes: Option<u64>,
        llm_timeout_ms: Option<u64>,
        llm_max_output_bytes: Option<u64>,
        tool_max_turns: u32,
        max_retries: u32,
        cancel: Option<CancellationToken>,
    ) -> Value {
        let skills: Vec<String> = resolved.used_skills.iter().map(|s| s.id.clone()).collect();
        let base = json!({
            "job_id": job_id,
            "agent_id": resolved.agent.id,
            "agent_name": resolved.agent.name,
            "command_id": resolved.command.as_ref().map(|c| c.id.clone()),
            "skills": skills,
            "reason": resolved.reason,
        });

        let mcp_servers = match self.config.list_mcp_servers().await.map_err(config_err) {
            Ok(servers) => servers,
            Err(e) => return error_payload(base, e.to_string()),
        };
        let enabled_servers: Vec<_> = mcp_servers.into_iter().filter(|s| s.enabled).collect();
        let allow_prefixes = match resolve_allow_prefixes(&self.config, input.mcp_allow_prefixes.clone()).await {
            Ok(p) => p,
            Err(e) => return error_payload(base, e.to_string()),
        };

        if let Some(exec) = resolved.command.as_ref().and_then(|c| c.exec.clone()) {
            return self
                .execute_command(
                    base,
                    job_id,
                    input,
                    resolved,
                    exec,
                    &skills,
                    &allow_prefixes,
                    &enabled_servers,
                    command_timeout_ms,
                    command_max_output_bytes,
                    cancel,
                )
                .await;
        }

        self.execute_llm(
            base,
            job_id,
            input,
            resolved,
            &skills,
            &allow_prefixes,
            &enabled_servers,
            llm_timeout_ms,
            llm_max_output_bytes,
            tool_max_turns,
            max_retries,
            cancel,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_command(
        &self,
        base: Value,
        job_id: &str,
        input: &RunInput,
        resolved: &crate::resolve::Resolved,
        exec: Vec<String>,
        skills: &[String],
        allow_prefixes: &[String],
        enabled_servers: &[chatos_config::McpServerConfig],
        timeout_ms: Option<u64>,
        max_output_bytes: Option<u64>,
        cancel: Option<CancellationToken>,
    ) -> Value {
        let command = resolved.command.as_ref();
        let spec = process::CommandSpec {
            exec,
            cwd: command.and_then(|c| c.cwd.as_ref()).map(PathBuf::from),
            env: command.map(|c| c.env.clone()).unwrap_or_default(),
        };
        let ctx = process::SpawnContext {
            task: input.task.clone(),
            agent_id: Some(resolved.agent.id.clone()),
            command_id: command.map(|c| c.id.clone()),
            skills: skills.to_vec(),
            category: resolved.agent.category.clone(),
            query: input.query.clone(),
            model: input.model.clone(),
            caller_model: input.caller_model.clone(),
            allow_prefixes: allow_prefixes.to_vec(),
            mcp_servers_summary: mcp_servers_summary(enabled_servers),
        };
        let opts = RunOptions { timeout_ms, max_output_bytes };

        let handle = match process::spawn(&spec, &ctx, &opts).await {
            Ok(handle) => handle,
            Err(e) => return error_payload(base, process_err(e).to_string()),
        };
        if let (Some(process_handle), Some(_)) = (handle.process_handle(), &cancel) {
            self.supervisor.set_process(job_id, process_handle).await;
        }

        let result = match handle.wait().await {
            Ok(result) => result,
            Err(e) => return error_payload(base, process_err(e).to_string()),
        };

        let status = if result.success() { "ok" } else { "error" };
        let mut object = base.as_object().cloned().unwrap_or_default();
        object.insert("status".to_string(), json!(status));
        object.insert("stdout".to_string(), json!(result.stdout));
        object.insert("stderr".to_string(), json!(result.stderr));
        object.insert("exit_code".to_string(), json!(result.exit_code));
        object.insert("signal".to_string(), json!(result.signal));
        object.insert("duration_ms".to_string(), json!(result.duration_ms));
        object.insert("started_at".to_string(), json!(result.started_at));
        object.insert("finished_at".to_string(), json!(result.finished_at));
        object.insert("stdout_truncated".to_string(), json!(result.stdout_truncated));
        object.insert("stderr_truncated".to_string(), json!(result.stderr_truncated));
        object.insert("error".to_string(), json!(result.error));
        object.insert("timed_out".to_string(), json!(result.timed_out));
        Value::Object(object)
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_llm(
        &self,
        base: Value,
        job_id: &str,
        input: &RunInput,
        resolved: &crate::resolve::Resolved,
        _skills: &[String],
        allow_prefixes: &[String],
        enabled_servers: &[chatos_config::McpServerConfig],
        timeout_ms: Option<u64>,
        max_output_bytes: Option<u64>,
        tool_max_turns: u32,
        max_retries: u32,
        cancel: Option<CancellationToken>,
    ) -> Value {
        let model = match self.config.active_model().await.map_err(config_err) {
            Ok(Some(model)) => model,
            Ok(None) => return error_payload(base, "AI not configured: no active model".to_string()),
            Err(e) => return error_payload(base, e.to_string()),
        };
        let model_id = model.id.clone();

        let bridge = match McpBridge::connect(enabled_servers, allow_prefixes).await {
            Ok(bridge) => bridge,
            Err(e) => return error_payload(base, mcp_err(e).to_string()),
        };

        let system_prompt = build_system_prompt(
            &self.catalog,
            &resolved.agent,
            resolved.command.as_ref(),
            &resolved.used_skills,
            allow_prefixes,
        )
        .await;

        let tools: Vec<LlmToolDefinition> = bridge
            .tools()
            .iter()
            .map(|t| LlmToolDefinition {
                name: t.prefixed_name.clone(),
                description: t.description.clone().unwrap_or_default(),
                parameters: t.input_schema.clone(),
            })
            .collect();

        let cancel = cancel.unwrap_or_default();
        let sink = self.job_event_sink(job_id);
        let driver = LlmDriver::new(model, Some(sink.clone() as Arc<dyn chatos_llm::AiEventSink>), cancel.clone());
        let invoker = McpToolInvoker::new(&bridge);

        let started_at = Utc::now();
        let request = ToolLoopRequest {
            system_prompt,
            user_message: input.task.clone(),
            tools,
            max_turns: Some(tool_max_turns),
            max_output_bytes,
            timeout_ms,
            max_retries: Some(max_retries),
        };
        let loop_ = ToolLoop::new(&driver, &invoker, Some(sink.clone() as Arc<dyn chatos_toolloop::ToolLoopEventSink>), cancel);
        let outcome = loop_.run(&request).await;
        bridge.close().await;
        let finished_at = Utc::now();

        let _ = self
            .jobs
            .append_model_route(job_id.to_string(), model_id, self.session_id.clone(), self.run_id.clone())
            .await;

        let (status, error, timed_out) = match &outcome.stop_reason {
            None => ("ok", None, false),
            Some(chatos_toolloop::StopReason::MaxTurnsExceeded) => ("error", Some("max_turns_exceeded".to_string()), false),
            Some(chatos_toolloop::StopReason::Cancelled) => ("cancelled", Some("cancelled".to_string()), false),
            Some(chatos_toolloop::StopReason::TimedOut) => ("error", Some("timed out".to_string()), true),
            Some(chatos_toolloop::StopReason::LlmError) => ("error", Some("llm error".to_string()), false),
        };

        let mut object = base.as_object().cloned().unwrap_or_default();
        object.insert("status".to_string(), json!(status));
        object.insert("response".to_string(), json!(outcome.text.unwrap_or_default().trim()));
        object.insert("stderr".to_string(), json!(""));
        object.insert("exit_code".to_string(), Value::Null);
        object.insert("signal".to_string(), Value::Null);
        object.insert("duration_ms".to_string(), json!((finished_at - started_at).num_milliseconds().max(0)));
        object.insert("started_at".to_string(), json!(started_at));
        object.insert("finished_at".to_string(), json!(finished_at));
        object.insert("stdout_truncated".to_string(), json!(outcome.truncated));
        object.insert("stderr_truncated".to_string(), json!(false));
        object.insert("error".to_string(), json!(error));
        object.insert("timed_out".to_string(), json!(timed_out));
        Value::Object(object)
    }

    /// The unified admin read surface (§4.11): config plus job/session
    /// listings, backed directly by the config and job stores. Not an MCP
    /// tool; callers outside this crate wire a transport on top.
    pub async fn admin_overview(&self, query: &ListJobsQuery) -> RouterResult<Value> {
        let models = self.config.list_models().await.map_err(config_err)?;
        let mcp_servers = self.config.list_mcp_servers().await.map_err(config_err)?;
        let marketplaces = self.config.list_marketplaces().await.map_err(config_err)?;
        let runtime = self.config.runtime_config().await.map_err(config_err)?;
        let jobs = self.jobs.list_jobs(query).await.map_err(jobs_err)?;
        let sessions = self.jobs.list_sessions(None).await.map_err(jobs_err)?;

        Ok(json!({
            "models": models,
            "mcp_servers": mcp_servers,
            "marketplaces": marketplaces,
            "runtime_config": runtime,
            "jobs": jobs,
            "sessions": sessions,
        }))
    }
}

fn error_payload(base: Value, error: String) -> Value {
    let mut object = base.as_object().cloned().unwrap_or_default();
    object.insert("status".to_string(), json!("error"));
    object.insert("error".to_string(), json!(error));
    object.insert("timed_out".to_string(), json!(false));
    Value::Object(object)
}
