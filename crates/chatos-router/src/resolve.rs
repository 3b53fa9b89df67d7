//! Agent + command + skill resolution shared by `run_sub_agent`,
//! `start_sub_agent_async`, and `suggest_sub_agent` (§4.3, §4.4, §4.10).

use chatos_catalog::{Catalog, SelectQuery, select, select_with_llm};
use chatos_config::{AgentSpec, CommandSpec, ConfigStore, SkillSpec};
use chatos_core::{RouterError, RouterResult};
use chatos_llm::LlmDriver;
use tokio_util::sync::CancellationToken;

/// The outcome of resolving a selection request to a concrete agent,
/// command, and skill set.
pub struct Resolved {
    pub agent: AgentSpec,
    pub command: Option<CommandSpec>,
    pub used_skills: Vec<SkillSpec>,
    pub reason: String,
}

/// Selection inputs shared by every tool that resolves a sub-agent.
#[derive(Default, Clone)]
pub struct SelectInput {
    pub task: String,
    pub agent_id: Option<String>,
    pub category: Option<String>,
    pub skills: Option<Vec<String>>,
    pub query: Option<String>,
    pub command_id: Option<String>,
}

/// Resolve `input` against `catalog`, optionally asking `config`'s active
/// model to break ties (§4.4 "LLM-assisted selection").
///
/// When `input.agent_id` is set the agent is looked up directly and no
/// scoring runs, mirroring the reference server's "explicit id always
/// wins" behavior.
pub async fn resolve(catalog: &Catalog, config: &ConfigStore, input: &SelectInput) -> RouterResult<Resolved> {
    if let Some(id) = &input.agent_id {
        let agent = catalog
            .get_agent(id)
            .await
            .ok_or_else(|| RouterError::NotFound(format!("sub-agent {id} not found")))?;
        let command = Catalog::resolve_command(&agent, input.command_id.as_deref()).cloned();
        let used_skills = select_skill_specs(catalog, &agent, input.skills.clone()).await;
        return Ok(Resolved {
            agent,
            command,
            used_skills,
            reason: id.clone(),
        });
    }

    let agents = catalog.list_agents().await;
    let query = SelectQuery {
        task: input.task.clone(),
        category: input.category.clone(),
        skills: input.skills.clone().unwrap_or_default(),
        query: input.query.clone(),
        command_id: input.command_id.clone(),
    };

    let selection = match config
        .active_model()
        .await
        .map_err(crate::error::config_err)?
    {
        Some(model) => {
            let driver = LlmDriver::new(model, None, CancellationToken::new());
            select_with_llm(&driver, &agents, &query).await
        }
        None => select(&agents, &query),
    };

    let selection = selection
        .ok_or_else(|| RouterError::NotFound("no matching sub-agent; add one to the registry or marketplace".to_string()))?;

    let agent = catalog
        .get_agent(&selection.agent_id)
        .await
        .ok_or_else(|| RouterError::NotFound(format!("sub-agent {} not found", selection.agent_id)))?;
    let used_skills = catalog.resolve_skills(&selection.used_skills).await;

    Ok(Resolved {
        agent,
        command: selection.command,
        used_skills,
        reason: selection.reason,
    })
}

async fn select_skill_specs(catalog: &Catalog, agent: &AgentSpec, requested: Option<Vec<String>>) -> Vec<SkillSpec> {
    let ids = requested.unwrap_or_else(|| {
        if agent.default_skills.is_empty() {
            agent.skills.clone()
        } else {
            agent.default_skills.clone()
        }
    });
    catalog.resolve_skills(&ids).await
}

/// Resolve the effective allow-prefix list for a run: an explicit,
/// non-empty override wins; otherwise the config store's derived default
/// (§4.1 `getEffectiveAllowPrefixes`).
pub async fn resolve_allow_prefixes(config: &ConfigStore, explicit: Option<Vec<String>>) -> RouterResult<Vec<String>> {
    if let Some(list) = explicit {
        let trimmed: Vec<String> = list.into_iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        if !trimmed.is_empty() {
            return Ok(trimmed);
        }
    }
    config.effective_allow_prefixes().await.map_err(crate::error::config_err)
}

/// JSON summary of the enabled MCP servers, carried into `SUBAGENT_MCP_SERVERS`.
pub fn mcp_servers_summary(servers: &[chatos_config::McpServerConfig]) -> serde_json::Value {
    serde_json::Value::Array(
        servers
            .iter()
            .map(|s| {
                serde_json::json!({
                    "id": s.id,
                    "name": s.name,
                    "transport": s.transport,
                    "command": s.command,
                    "args": s.args,
                    "endpoint_url": s.endpoint_url,
                    "headers_json": s.headers_json,
                })
            })
            .collect(),
    )
}

