//! Marketplace manifest parsing: turns the effective manifest JSON into
//! agent and skill specs (§4.2).

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chatos_config::{AgentSpec, CommandSpec, SkillSpec};
use serde_json::Value;
use tracing::warn;

/// Parse the manifest at `manifest_path` into agents and deduped skills.
///
/// Plugin `source` paths are resolved against `plugins_root` if given,
/// otherwise against the manifest's own directory. An unreadable or invalid
/// manifest, or one with no `source` directory on disk, yields an empty
/// result rather than an error (§4.2).
#[must_use]
pub fn load_marketplace(
    manifest_path: &Path,
    plugins_root: Option<&Path>,
) -> (Vec<AgentSpec>, Vec<SkillSpec>) {
    let Ok(raw) = std::fs::read_to_string(manifest_path) else {
        return (Vec::new(), Vec::new());
    };
    let Ok(manifest) = serde_json::from_str::<Value>(&raw) else {
        return (Vec::new(), Vec::new());
    };
    let Some(plugins) = manifest.get("plugins").and_then(Value::as_array) else {
        return (Vec::new(), Vec::new());
    };

    let manifest_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let mut agents = Vec::new();
    let mut skills = Vec::new();
    let mut seen_skill_ids: HashSet<String> = HashSet::new();

    for plugin in plugins {
        let Some(plugin_name) = plugin.get("name").and_then(Value::as_str) else {
            continue;
        };
        let Some(source) = plugin.get("source").and_then(Value::as_str) else {
            continue;
        };
        let base = plugins_root.unwrap_or(manifest_dir);
        let plugin_dir = base.join(source);
        if !plugin_dir.is_dir() {
            warn!(plugin = plugin_name, dir = %plugin_dir.display(), "skipping plugin: source directory not found");
            continue;
        }

        let plugin_skill_ids = load_plugin_skills(plugin, &plugin_dir, plugin_name, &mut seen_skill_ids, &mut skills);

        let agent_entries = plugin.get("agents").and_then(Value::as_array).cloned().unwrap_or_default();
        for agent_value in &agent_entries {
            if let Some(agent) = parse_agent(agent_value, plugin_name, &plugin_skill_ids) {
                agents.push(agent);
            }
        }
    }

    (agents, skills)
}

/// Resolve and parse every skill path declared by one plugin, deduping
/// against `seen_skill_ids` (which is shared across the whole manifest, so
/// a skill already emitted by an earlier plugin is skipped but still
/// counted as one of this plugin's skills).
fn load_plugin_skills(
    plugin: &Value,
    plugin_dir: &Path,
    plugin_name: &str,
    seen_skill_ids: &mut HashSet<String>,
    skills: &mut Vec<SkillSpec>,
) -> Vec<String> {
    let skill_paths = plugin.get("skills").and_then(Value::as_array).cloned().unwrap_or_default();
    let mut plugin_skill_ids = Vec::new();

    for skill_value in &skill_paths {
        let Some(rel) = skill_value.as_str() else {
            continue;
        };
        let Some(resolved) = resolve_skill_path(plugin_dir, rel) else {
            warn!(plugin = plugin_name, path = rel, "skipping missing skill file");
            continue;
        };
        let id = derive_skill_id(&resolved);
        plugin_skill_ids.push(id.clone());
        if !seen_skill_ids.insert(id.clone()) {
            continue;
        }
        let (title, description) = parse_markdown_heading(&resolved, &id);
        skills.push(SkillSpec {
            id,
            name: title,
            description,
            path: resolved.to_string_lossy().into_owned(),
            plugin: Some(plugin_name.to_string()),
        });
    }

    plugin_skill_ids
}

/// Resolve a skill reference relative to `plugin_dir`: as-is, then with
/// `.md`, then `/SKILL.md`, then `/index.md` (§4.2 step 2).
fn resolve_skill_path(plugin_dir: &Path, rel: &str) -> Option<PathBuf> {
    let candidates = [
        plugin_dir.join(rel),
        plugin_dir.join(format!("{rel}.md")),
        plugin_dir.join(rel).join("SKILL.md"),
        plugin_dir.join(rel).join("index.md"),
    ];
    candidates.into_iter().find(|c| c.is_file())
}

/// Slugify the basename; for `SKILL.md`/`index.md` use the parent directory
/// name instead (§4.2 step 4).
fn derive_skill_id(path: &Path) -> String {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if file_name.eq_ignore_ascii_case("SKILL.md") || file_name.eq_ignore_ascii_case("index.md") {
        let parent_name = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .unwrap_or(file_name);
        chatos_core::slugify(parent_name)
    } else {
        let stem = path.file_stem().and_then(|n| n.to_str()).unwrap_or(file_name);
        chatos_core::slugify(stem)
    }
}

/// Parse `title` from the first `# …` line and `description` from the first
/// non-heading, non-empty line after it (§4.2 step 3). An unreadable file or
/// one with no heading falls back to `fallback_title`.
fn parse_markdown_heading(path: &Path, fallback_title: &str) -> (String, Option<String>) {
    let Ok(text) = std::fs::read_to_string(path) else {
        return (fallback_title.to_string(), None);
    };
    let mut lines = text.lines();
    let title = lines
        .find_map(|l| l.trim_start().strip_prefix("# ").map(|t| t.trim().to_string()))
        .unwrap_or_else(|| fallback_title.to_string());
    let description = lines
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string);
    (title, description)
}

fn parse_agent(value: &Value, plugin_name: &str, plugin_skill_ids: &[String]) -> Option<AgentSpec> {
    let name = value.get("name").and_then(Value::as_str)?.to_string();
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| chatos_core::slugify(&name));
    let description = value.get("description").and_then(Value::as_str).unwrap_or_default().to_string();
    let category = value.get("category").and_then(Value::as_str).map(str::to_string);
    let skills = plugin_skill_ids.to_vec();
    let default_skills = value
        .get("defaultSkills")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_else(|| skills.clone());
    let commands = value
        .get("commands")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(parse_command).collect())
        .unwrap_or_default();
    let default_command = value.get("defaultCommand").and_then(Value::as_str).map(str::to_string);
    let system_prompt_path = value.get("systemPromptPath").and_then(Value::as_str).map(str::to_string);

    Some(AgentSpec {
        id,
        name,
        description,
        category,
        skills,
        default_skills,
        commands,
        default_command,
        system_prompt_path,
        plugin: Some(plugin_name.to_string()),
    })
}

fn parse_command(value: &Value) -> Option<CommandSpec> {
    let id = value.get("id").and_then(Value::as_str)?.to_string();
    let name = value.get("name").and_then(Value::as_str).map(str::to_string);
    let description = value.get("description").and_then(Value::as_str).map(str::to_string);
    let exec = value
        .get("exec")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect());
    let cwd = value.get("cwd").and_then(Value::as_str).map(str::to_string);
    let env: HashMap<String, String> = value
        .get("env")
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();
    let instructions_path = value.get("instructionsPath").and_then(Value::as_str).map(str::to_string);

    Some(CommandSpec {
        id,
        name,
        description,
        exec,
        cwd,
        env,
        instructions_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn loads_agents_and_skills_from_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "writer/SKILL.md", "# Writer\nHelps draft prose.\n");
        write(
            root,
            "manifest.json",
            &serde_json::json!({
                "plugins": [{
                    "name": "Prose Pack",
                    "source": "writer",
                    "skills": ["."],
                    "agents": [{
                        "id": "writer-agent",
                        "name": "Writer Agent",
                        "description": "Drafts prose",
                        "category": "writing",
                        "commands": [{"id": "draft", "name": "Draft"}],
                        "defaultCommand": "draft",
                    }],
                }],
            })
            .to_string(),
        );

        let (agents, skills) = load_marketplace(&root.join("manifest.json"), None);
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].id, "writer-agent");
        assert_eq!(agents[0].skills, vec!["writer".to_string()]);
        assert_eq!(agents[0].commands[0].id, "draft");
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].id, "writer");
        assert_eq!(skills[0].name, "Writer");
        assert_eq!(skills[0].description.as_deref(), Some("Helps draft prose."));
    }

    #[test]
    fn unreadable_manifest_yields_empty_result() {
        let (agents, skills) = load_marketplace(Path::new("/nonexistent/manifest.json"), None);
        assert!(agents.is_empty());
        assert!(skills.is_empty());
    }

    #[test]
    fn missing_plugin_source_is_skipped_without_failing_others() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "ok/SKILL.md", "# Ok\nWorks.\n");
        write(
            root,
            "manifest.json",
            &serde_json::json!({
                "plugins": [
                    {"name": "Missing", "source": "missing-dir", "agents": []},
                    {
                        "name": "Ok Pack",
                        "source": "ok",
                        "skills": ["."],
                        "agents": [{"name": "Ok Agent"}],
                    },
                ],
            })
            .to_string(),
        );

        let (agents, skills) = load_marketplace(&root.join("manifest.json"), None);
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].id, "ok-agent");
        assert_eq!(skills.len(), 1);
    }

    #[test]
    fn dedups_skills_by_id_keeping_first() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "a/shared.md", "# First\nFrom a.\n");
        write(root, "b/shared.md", "# Second\nFrom b.\n");
        write(
            root,
            "manifest.json",
            &serde_json::json!({
                "plugins": [
                    {"name": "A", "source": "a", "skills": ["shared"], "agents": []},
                    {"name": "B", "source": "b", "skills": ["shared"], "agents": []},
                ],
            })
            .to_string(),
        );

        let (_, skills) = load_marketplace(&root.join("manifest.json"), None);
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].name, "First");
    }
}
