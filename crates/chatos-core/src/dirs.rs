//! State-directory resolution for the sub-agent router.
//!
//! [`StateRoot`] resolves the base directory under which every server
//! instance keeps its persisted state, honoring `MCP_STATE_ROOT` /
//! `SUBAGENT_STATE_ROOT` and the legacy `.mcp_servers` directory name.
//! [`ServerPaths`] derives the per-server-name file layout underneath it.

use std::path::{Path, PathBuf};

/// Base directory under which all server instances keep state.
///
/// Resolution order: `$MCP_STATE_ROOT`, then `$SUBAGENT_STATE_ROOT`, then
/// `$HOME/.mcp-servers` — unless `$HOME/.mcp_servers` (the legacy name)
/// already exists on disk, in which case it is preferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRoot {
    root: PathBuf,
}

impl StateRoot {
    /// Resolve the state root from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if no override is set and `$HOME` is unavailable.
    pub fn resolve() -> std::io::Result<Self> {
        if let Ok(custom) = std::env::var("MCP_STATE_ROOT") {
            return Ok(Self::from_path(custom));
        }
        if let Ok(custom) = std::env::var("SUBAGENT_STATE_ROOT") {
            return Ok(Self::from_path(custom));
        }
        let home = std::env::var("HOME").map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "neither MCP_STATE_ROOT, SUBAGENT_STATE_ROOT, nor HOME is set",
            )
        })?;
        let legacy = PathBuf::from(&home).join(".mcp_servers");
        if legacy.is_dir() {
            return Ok(Self { root: legacy });
        }
        Ok(Self {
            root: PathBuf::from(home).join(".mcp-servers"),
        })
    }

    /// Construct from an explicit path (used in tests and by CLI overrides).
    #[must_use]
    pub fn from_path(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The resolved root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Derive the per-server-name path layout.
    #[must_use]
    pub fn server(&self, server_name: &str) -> ServerPaths {
        ServerPaths::new(self.root.join(server_name))
    }
}

/// Persisted-state layout for a single server instance, rooted at
/// `<stateDir>/<serverName>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPaths {
    dir: PathBuf,
}

impl ServerPaths {
    fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Ensure the directory and its `plugins/` subdirectory exist.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.plugins_dir())
    }

    /// The server's state directory itself.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Embedded `SurrealKV` database directory, `<serverName>.db`.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.dir.join(format!(
            "{}.db",
            self.dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("server")
        ))
    }

    /// Local agent registry file, `subagents.json`.
    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.dir.join("subagents.json")
    }

    /// Effective merged marketplace manifest, `marketplace.json`.
    #[must_use]
    pub fn marketplace_path(&self) -> PathBuf {
        self.dir.join("marketplace.json")
    }

    /// Root directory for agent/skill/command markdown plugins.
    #[must_use]
    pub fn plugins_dir(&self) -> PathBuf {
        self.dir.join("plugins")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_paths_layout() {
        let root = StateRoot::from_path("/tmp/state-root-test");
        let paths = root.server("sub_agent_router");
        assert_eq!(
            paths.dir(),
            Path::new("/tmp/state-root-test/sub_agent_router")
        );
        assert_eq!(
            paths.db_path(),
            Path::new("/tmp/state-root-test/sub_agent_router/sub_agent_router.db")
        );
        assert_eq!(
            paths.registry_path(),
            Path::new("/tmp/state-root-test/sub_agent_router/subagents.json")
        );
        assert_eq!(
            paths.marketplace_path(),
            Path::new("/tmp/state-root-test/sub_agent_router/marketplace.json")
        );
        assert_eq!(
            paths.plugins_dir(),
            Path::new("/tmp/state-root-test/sub_agent_router/plugins")
        );
    }

    #[test]
    fn ensure_creates_plugins_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = StateRoot::from_path(dir.path());
        let paths = root.server("router");
        paths.ensure().unwrap();
        assert!(paths.plugins_dir().is_dir());
    }
}
