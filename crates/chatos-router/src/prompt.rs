//! System-prompt assembly for LLM-backed runs (§4.10).

use chatos_catalog::Catalog;
use chatos_config::{AgentSpec, CommandSpec, SkillSpec};

/// Appended to every assembled system prompt so sub-agents cannot recurse
/// back into the router's own tools.
pub const SUBAGENT_GUARDRAIL: &str = "Tooling guard: sub-agents cannot call mcp_subagent_router_* or other sub-agent routing tools. Complete the task directly with available project/shell/task tools.";

/// Assemble the system prompt for an LLM-backed run from the agent's
/// system prompt file, the command's instructions file, the resolved
/// skills' contents, the effective allow-prefix list, and the guardrail.
pub async fn build_system_prompt(
    catalog: &Catalog,
    agent: &AgentSpec,
    command: Option<&CommandSpec>,
    skills: &[SkillSpec],
    allow_prefixes: &[String],
) -> String {
    let mut sections = Vec::new();
    sections.push(format!("You are {}.", agent.name));

    if let Some(path) = agent.system_prompt_path.as_deref() {
        let content = catalog.read_content(path).await;
        if !content.is_empty() {
            sections.push(content);
        }
    }

    if let Some(cmd) = command {
        if let Some(path) = cmd.instructions_path.as_deref() {
            let content = catalog.read_content(path).await;
            if !content.is_empty() {
                sections.push(format!("Command instructions:\n{content}"));
            }
        }
    }

    if !skills.is_empty() {
        let mut blocks = Vec::new();
        for skill in skills {
            let content = catalog.read_content(&skill.path).await;
            if !content.is_empty() {
                blocks.push(format!("Skill: {}\n{}", skill.name, content));
            }
        }
        if !blocks.is_empty() {
            sections.push(format!("Skills:\n{}", blocks.join("\n\n")));
        }
    }

    if !allow_prefixes.is_empty() {
        sections.push(format!("Allowed MCP prefixes: {}", allow_prefixes.join(", ")));
    }

    sections.push(SUBAGENT_GUARDRAIL.to_string());
    sections.join("\n\n")
}
