//! In-memory merge of marketplace-derived and locally-registered agents and
//! skills, plus memoized file content reads (§4.3).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chatos_config::{AgentRegistryFile, AgentSpec, CommandSpec, SkillSpec};
use tokio::sync::RwLock;
use tracing::warn;

use crate::loader::load_marketplace;

#[derive(Default)]
struct CatalogState {
    agent_order: Vec<String>,
    agents: HashMap<String, AgentSpec>,
    skill_order: Vec<String>,
    skills: HashMap<String, SkillSpec>,
    content_cache: HashMap<String, String>,
}

/// Merged, queryable view over marketplace and registry agents/skills
/// (§4.3). Safe to share across tasks; [`Catalog::reload`] rebuilds both
/// mappings atomically under the write lock.
pub struct Catalog {
    manifest_path: PathBuf,
    registry_path: Option<PathBuf>,
    plugins_root: RwLock<Option<PathBuf>>,
    state: RwLock<CatalogState>,
}

impl Catalog {
    /// Load the catalog from the effective manifest at `manifest_path` and,
    /// if given, the local registry file at `registry_path`.
    pub async fn load(
        manifest_path: impl Into<PathBuf>,
        registry_path: Option<PathBuf>,
        plugins_root: Option<PathBuf>,
    ) -> Self {
        let catalog = Self {
            manifest_path: manifest_path.into(),
            registry_path,
            plugins_root: RwLock::new(plugins_root),
            state: RwLock::new(CatalogState::default()),
        };
        catalog.reload().await;
        catalog
    }

    /// Rebuild both mappings from disk (§4.3 `reload`). Registry agents
    /// override marketplace agents on id collision; load order otherwise
    /// follows first occurrence (marketplace, then registry).
    pub async fn reload(&self) {
        let plugins_root = self.plugins_root.read().await.clone();
        let (marketplace_agents, marketplace_skills) =
            load_marketplace(&self.manifest_path, plugins_root.as_deref());
        let registry_agents = self.registry_path.as_deref().map(load_registry).unwrap_or_default();

        let mut agent_order = Vec::new();
        let mut agents: HashMap<String, AgentSpec> = HashMap::new();
        for agent in marketplace_agents.into_iter().chain(registry_agents) {
            if !agents.contains_key(&agent.id) {
                agent_order.push(agent.id.clone());
            }
            agents.insert(agent.id.clone(), agent);
        }

        let mut skill_order = Vec::new();
        let mut skills: HashMap<String, SkillSpec> = HashMap::new();
        for skill in marketplace_skills {
            if !skills.contains_key(&skill.id) {
                skill_order.push(skill.id.clone());
            }
            skills.insert(skill.id.clone(), skill);
        }

        let mut state = self.state.write().await;
        state.agent_order = agent_order;
        state.agents = agents;
        state.skill_order = skill_order;
        state.skills = skills;
        state.content_cache.clear();
    }

    /// Change the plugins root and reload (§4.3 `setPluginsRoot`).
    pub async fn set_plugins_root(&self, root: Option<PathBuf>) {
        *self.plugins_root.write().await = root;
        self.reload().await;
    }

    /// All agents, in first-seen load order.
    pub async fn list_agents(&self) -> Vec<AgentSpec> {
        let state = self.state.read().await;
        state.agent_order.iter().filter_map(|id| state.agents.get(id).cloned()).collect()
    }

    /// Fetch one agent by id.
    pub async fn get_agent(&self, id: &str) -> Option<AgentSpec> {
        self.state.read().await.agents.get(id).cloned()
    }

    /// All skills, in first-seen load order.
    pub async fn list_skills(&self) -> Vec<SkillSpec> {
        let state = self.state.read().await;
        state.skill_order.iter().filter_map(|id| state.skills.get(id).cloned()).collect()
    }

    /// Fetch one skill by id.
    pub async fn get_skill(&self, id: &str) -> Option<SkillSpec> {
        self.state.read().await.skills.get(id).cloned()
    }

    /// Keep only known skill ids, preserving `ids`' order (§4.3
    /// `resolveSkills`).
    pub async fn resolve_skills(&self, ids: &[String]) -> Vec<SkillSpec> {
        let state = self.state.read().await;
        ids.iter().filter_map(|id| state.skills.get(id).cloned()).collect()
    }

    /// Resolve a command on `agent` by id or name, case-insensitive; falls
    /// back to the agent's `defaultCommand`, else its first command (§4.3
    /// `resolveCommand`).
    #[must_use]
    pub fn resolve_command<'a>(agent: &'a AgentSpec, command_id: Option<&str>) -> Option<&'a CommandSpec> {
        if let Some(wanted) = command_id {
            if let Some(cmd) = agent
                .commands
                .iter()
                .find(|c| c.id.eq_ignore_ascii_case(wanted) || c.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(wanted)))
            {
                return Some(cmd);
            }
        }
        if let Some(default_id) = agent.default_command.as_deref() {
            if let Some(cmd) = agent.commands.iter().find(|c| c.id == default_id) {
                return Some(cmd);
            }
        }
        agent.commands.first()
    }

    /// Read and cache a file's content. A missing or unreadable path
    /// resolves to an empty string rather than an error, and the empty
    /// result is cached like any other read (§4.3 `readContent`).
    pub async fn read_content(&self, path: &str) -> String {
        if let Some(cached) = self.state.read().await.content_cache.get(path) {
            return cached.clone();
        }
        let content = std::fs::read_to_string(path).unwrap_or_default();
        self.state.write().await.content_cache.insert(path.to_string(), content.clone());
        content
    }
}

fn load_registry(path: &Path) -> Vec<AgentSpec> {
    let Ok(raw) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    match serde_json::from_str::<AgentRegistryFile>(&raw) {
        Ok(file) => file.agents,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "invalid subagents registry file");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn manifest_with_agent(root: &Path, id: &str, name: &str) {
        fs::write(
            root.join("manifest.json"),
            serde_json::json!({
                "plugins": [{
                    "name": "Pack",
                    "source": ".",
                    "skills": [],
                    "agents": [{"id": id, "name": name, "commands": [{"id": "run"}]}],
                }],
            })
            .to_string(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn registry_agent_overrides_marketplace_agent_by_id() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        manifest_with_agent(root, "writer", "Marketplace Writer");
        fs::write(
            root.join("subagents.json"),
            serde_json::json!({
                "agents": [{"id": "writer", "name": "Registry Writer", "description": "", "skills": [], "defaultSkills": [], "commands": []}],
            })
            .to_string(),
        )
        .unwrap();

        let catalog = Catalog::load(root.join("manifest.json"), Some(root.join("subagents.json")), None).await;
        let agents = catalog.list_agents().await;
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].name, "Registry Writer");
    }

    #[tokio::test]
    async fn resolve_command_falls_back_to_default_then_first() {
        let agent = AgentSpec {
            id: "a".into(),
            name: "A".into(),
            description: String::new(),
            category: None,
            skills: vec![],
            default_skills: vec![],
            commands: vec![
                CommandSpec { id: "x".into(), name: None, description: None, exec: None, cwd: None, env: HashMap::new(), instructions_path: None },
                CommandSpec { id: "y".into(), name: Some("Why".into()), description: None, exec: None, cwd: None, env: HashMap::new(), instructions_path: None },
            ],
            default_command: Some("y".into()),
            system_prompt_path: None,
            plugin: None,
        };

        assert_eq!(Catalog::resolve_command(&agent, Some("why")).unwrap().id, "y");
        assert_eq!(Catalog::resolve_command(&agent, None).unwrap().id, "y");

        let mut no_default = agent.clone();
        no_default.default_command = None;
        assert_eq!(Catalog::resolve_command(&no_default, None).unwrap().id, "x");
    }

    #[tokio::test]
    async fn read_content_caches_and_defaults_to_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let file_path = tmp.path().join("note.md");
        fs::write(&file_path, "hello").unwrap();

        let catalog = Catalog::load(tmp.path().join("manifest.json"), None, None).await;
        assert_eq!(catalog.read_content(file_path.to_str().unwrap()).await, "hello");
        assert_eq!(catalog.read_content("/nonexistent/path.md").await, "");
    }
}
