//! Deterministic and (optionally) LLM-assisted sub-agent selection (§4.4).

use chatos_config::{AgentSpec, CommandSpec};
use chatos_llm::{LlmDriver, LlmRequest, Message};
use serde_json::Value;

use crate::catalog::Catalog;

/// A selection request (§4.4).
#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    /// Free-text task description.
    pub task: String,
    /// Optional category filter; disqualifies agents with a different
    /// non-empty category.
    pub category: Option<String>,
    /// Requested skill ids.
    pub skills: Vec<String>,
    /// Optional free-text query, scored separately from `task`.
    pub query: Option<String>,
    /// Optional specific command id or name requested; disqualifies agents
    /// with no matching command.
    pub command_id: Option<String>,
}

/// The outcome of a selection (§4.4).
#[derive(Debug, Clone)]
pub struct Selection {
    /// The chosen agent's id.
    pub agent_id: String,
    /// The resolved command, if the agent has one.
    pub command: Option<CommandSpec>,
    /// Skill ids to apply to the run.
    pub used_skills: Vec<String>,
    /// Human-readable explanation of the match.
    pub reason: String,
    /// The raw score (ranking only, not meant to be displayed).
    pub score: u32,
}

/// Lowercase and split on whitespace and `[,;|/]`, dropping empty tokens
/// (§4.4 "Tokenization").
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '|' | '/'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn agent_token_set(agent: &AgentSpec) -> Vec<String> {
    let mut haystack = vec![agent.name.clone(), agent.description.clone()];
    if let Some(category) = &agent.category {
        haystack.push(category.clone());
    }
    haystack.extend(agent.skills.iter().cloned());
    for command in &agent.commands {
        haystack.push(command.id.clone());
        if let Some(name) = &command.name {
            haystack.push(name.clone());
        }
        if let Some(description) = &command.description {
            haystack.push(description.clone());
        }
    }
    haystack.iter().flat_map(|s| tokenize(s)).collect()
}

struct Scored {
    score: u32,
    reasons: Vec<String>,
}

fn score_agent(
    agent: &AgentSpec,
    query: &SelectQuery,
    task_tokens: &[String],
    query_tokens: &[String],
) -> Option<Scored> {
    if let Some(wanted) = query.command_id.as_deref() {
        let has_match = agent
            .commands
            .iter()
            .any(|c| c.id.eq_ignore_ascii_case(wanted) || c.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(wanted)));
        if !has_match {
            return None;
        }
    }
    if let Some(category) = query.category.as_deref() {
        if let Some(agent_category) = agent.category.as_deref() {
            if !agent_category.is_empty() && !agent_category.eq_ignore_ascii_case(category) {
                return None;
            }
        }
    }

    let mut score = 0u32;
    let mut reasons = Vec::new();

    if let Some(category) = query.category.as_deref() {
        if agent.category.as_deref().is_some_and(|c| c.eq_ignore_ascii_case(category)) {
            score = score.saturating_add(4);
            reasons.push(format!("category:{category}"));
        }
    }

    let matched_skills: Vec<&str> = query
        .skills
        .iter()
        .filter(|requested| agent.skills.iter().any(|owned| owned.eq_ignore_ascii_case(requested)))
        .map(String::as_str)
        .collect();
    if !matched_skills.is_empty() {
        let count = u32::try_from(matched_skills.len()).unwrap_or(u32::MAX);
        score = score.saturating_add(3u32.saturating_mul(count));
        reasons.push(format!("skills:{}", matched_skills.join(",")));
    }

    let token_set = agent_token_set(agent);
    let matched_query: Vec<&str> = query_tokens
        .iter()
        .filter(|t| token_set.iter().any(|owned| owned == *t))
        .map(String::as_str)
        .collect();
    if !matched_query.is_empty() {
        let count = u32::try_from(matched_query.len()).unwrap_or(u32::MAX);
        score = score.saturating_add(2u32.saturating_mul(count));
        reasons.push(format!("query:{}", matched_query.join(",")));
    }

    let matched_task: Vec<&str> = task_tokens
        .iter()
        .filter(|t| token_set.iter().any(|owned| owned == *t))
        .map(String::as_str)
        .collect();
    if !matched_task.is_empty() {
        let count = u32::try_from(matched_task.len()).unwrap_or(u32::MAX);
        score = score.saturating_add(count);
        reasons.push(format!("task:{}", matched_task.join(",")));
    }

    if let Some(wanted) = query.command_id.as_deref() {
        score = score.saturating_add(5);
        reasons.push(format!("command:{wanted}"));
    }

    Some(Scored { score, reasons })
}

/// Deterministically score every agent and return the best match, ties
/// broken by input order (§4.4).
#[must_use]
pub fn select(agents: &[AgentSpec], query: &SelectQuery) -> Option<Selection> {
    let task_tokens = tokenize(&query.task);
    let query_tokens = query.query.as_deref().map(tokenize).unwrap_or_default();

    let mut best: Option<(usize, Scored)> = None;
    for (index, agent) in agents.iter().enumerate() {
        let Some(scored) = score_agent(agent, query, &task_tokens, &query_tokens) else {
            continue;
        };
        let replace = match &best {
            None => true,
            Some((_, current)) => scored.score > current.score,
        };
        if replace {
            best = Some((index, scored));
        }
    }

    let (index, scored) = best?;
    let agent = &agents[index];
    let reason = if scored.reasons.is_empty() {
        "Best available match".to_string()
    } else {
        scored.reasons.join("|")
    };
    let used_skills = if query.skills.is_empty() {
        agent.skills.clone()
    } else {
        query.skills.clone()
    };
    let command = Catalog::resolve_command(agent, query.command_id.as_deref()).cloned();

    Some(Selection {
        agent_id: agent.id.clone(),
        command,
        used_skills,
        reason,
        score: scored.score,
    })
}

/// Ask `driver` to choose among `agents`, parsing the first top-level JSON
/// object in its reply as `{agent_id, skills, reason}`; falls back to
/// [`select`] if the call fails, parsing fails, or the id is unknown (§4.4
/// "LLM-assisted selection").
pub async fn select_with_llm(driver: &LlmDriver, agents: &[AgentSpec], query: &SelectQuery) -> Option<Selection> {
    let request = LlmRequest {
        messages: vec![
            Message::system(
                "You select the best sub-agent for a task. Reply with exactly one JSON \
                 object and no other text: {\"agent_id\": string, \"skills\": string[], \
                 \"reason\": string}.",
            ),
            Message::user(render_candidates_prompt(agents, query)),
        ],
        tools: Vec::new(),
        timeout_ms: None,
        max_output_bytes: None,
        max_retries: None,
    };

    let Ok(response) = driver.complete(&request).await else {
        return select(agents, query);
    };
    let Some(parsed) = extract_first_json_object(&response.text) else {
        return select(agents, query);
    };
    let Some(agent_id) = parsed.get("agent_id").and_then(Value::as_str) else {
        return select(agents, query);
    };
    let Some(agent) = agents.iter().find(|a| a.id == agent_id) else {
        return select(agents, query);
    };

    let used_skills = parsed
        .get("skills")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_else(|| {
            if query.skills.is_empty() {
                agent.skills.clone()
            } else {
                query.skills.clone()
            }
        });
    let reason = parsed
        .get("reason")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| "Best available match".to_string());
    let command = Catalog::resolve_command(agent, query.command_id.as_deref()).cloned();

    Some(Selection {
        agent_id: agent.id.clone(),
        command,
        used_skills,
        reason,
        score: 0,
    })
}

fn render_candidates_prompt(agents: &[AgentSpec], query: &SelectQuery) -> String {
    let candidates: Vec<Value> = agents
        .iter()
        .map(|agent| {
            serde_json::json!({
                "id": agent.id,
                "name": agent.name,
                "description": agent.description,
                "category": agent.category,
                "skills": agent.skills,
                "commands": agent.commands.iter().map(|c| c.id.clone()).collect::<Vec<_>>(),
            })
        })
        .collect();
    serde_json::json!({
        "task": query.task,
        "category": query.category,
        "skills": query.skills,
        "query": query.query,
        "command_id": query.command_id,
        "candidates": candidates,
    })
    .to_string()
}

/// Extract the first top-level, brace-balanced JSON object substring from
/// `text` and parse it (models often wrap replies in prose or code fences).
fn extract_first_json_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escape = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escape {
                escape = false;
            } else if byte == b'\\' {
                escape = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth = depth.saturating_add(1),
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let end = start.saturating_add(offset).saturating_add(1);
                    return serde_json::from_str(&text[start..end]).ok();
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn agent(id: &str, name: &str, category: Option<&str>, skills: &[&str]) -> AgentSpec {
        AgentSpec {
            id: id.to_string(),
            name: name.to_string(),
            description: format!("{name} handles things"),
            category: category.map(str::to_string),
            skills: skills.iter().map(|s| (*s).to_string()).collect(),
            default_skills: vec![],
            commands: vec![CommandSpec {
                id: "run".into(),
                name: Some("Run".into()),
                description: None,
                exec: None,
                cwd: None,
                env: HashMap::new(),
                instructions_path: None,
            }],
            default_command: Some("run".into()),
            system_prompt_path: None,
            plugin: None,
        }
    }

    #[test]
    fn tokenize_splits_on_delimiters_and_drops_empties() {
        assert_eq!(
            tokenize("Fix the bug, please; thanks/ok"),
            vec!["fix", "the", "bug", "please", "thanks", "ok"]
        );
    }

    #[test]
    fn category_match_outranks_plain_task_overlap() {
        let agents = vec![
            agent("general", "General Helper", None, &[]),
            agent("writer", "Writer", Some("writing"), &["prose"]),
        ];
        let query = SelectQuery {
            task: "write a blog post about writer".into(),
            category: Some("writing".into()),
            ..Default::default()
        };
        let selection = select(&agents, &query).unwrap();
        assert_eq!(selection.agent_id, "writer");
        assert!(selection.reason.contains("category:writing"));
    }

    #[test]
    fn category_mismatch_disqualifies_agent() {
        let agents = vec![agent("writer", "Writer", Some("writing"), &[])];
        let query = SelectQuery {
            task: "writer".into(),
            category: Some("coding".into()),
            ..Default::default()
        };
        assert!(select(&agents, &query).is_none());
    }

    #[test]
    fn command_id_mismatch_disqualifies_agent() {
        let agents = vec![agent("writer", "Writer", None, &[])];
        let query = SelectQuery {
            task: "writer".into(),
            command_id: Some("missing".into()),
            ..Default::default()
        };
        assert!(select(&agents, &query).is_none());
    }

    #[test]
    fn ties_are_broken_by_input_order() {
        let agents = vec![agent("first", "Helper", None, &[]), agent("second", "Helper", None, &[])];
        let query = SelectQuery {
            task: "generic task".into(),
            ..Default::default()
        };
        let selection = select(&agents, &query).unwrap();
        assert_eq!(selection.agent_id, "first");
        assert_eq!(selection.reason, "Best available match");
    }

    #[test]
    fn requested_skills_become_used_skills_when_present() {
        let agents = vec![agent("writer", "Writer", None, &["prose", "editing"])];
        let query = SelectQuery {
            task: "writer".into(),
            skills: vec!["prose".into()],
            ..Default::default()
        };
        let selection = select(&agents, &query).unwrap();
        assert_eq!(selection.used_skills, vec!["prose".to_string()]);
    }

    #[test]
    fn extract_first_json_object_ignores_surrounding_prose() {
        let text = "Sure, here you go:\n```json\n{\"agent_id\": \"writer\", \"reason\": \"fits\"}\n```\nThanks!";
        let parsed = extract_first_json_object(text).unwrap();
        assert_eq!(parsed["agent_id"], "writer");
    }
}
