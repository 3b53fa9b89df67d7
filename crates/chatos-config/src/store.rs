//! The config store (§4.1): typed CRUD over model profiles, MCP server
//! definitions, marketplace records, runtime overrides, and a JSON-blob
//! settings map, all persisted through a [`chatos_storage::KvStore`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chatos_storage::KvStore;
use chrono::Utc;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{
    MarketplaceRecord, McpServerConfig, ModelConfig, RuntimeConfig, SettingValue,
};

const MODEL_PREFIX: &str = "model:";
const MCP_PREFIX: &str = "mcp:";
const MARKETPLACE_PREFIX: &str = "marketplace:";
const SETTING_PREFIX: &str = "setting:";
const RUNTIME_CONFIG_KEY: &str = "runtime_config";
const ACTIVE_MODEL_KEY: &str = "active_model_id";
const ALLOW_PREFIXES_KEY: &str = "allow_prefixes";

/// Persisted runtime settings, model profiles, MCP server definitions, and
/// marketplace blobs, backed by a single embedded key/value store.
pub struct ConfigStore {
    kv: Arc<dyn KvStore>,
    marketplace_file: Option<PathBuf>,
}

impl ConfigStore {
    /// Wrap a key/value store. `marketplace_file`, if given, is rewritten by
    /// [`Self::ensure_marketplace_file`] after every activation change.
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>, marketplace_file: Option<PathBuf>) -> Self {
        Self {
            kv,
            marketplace_file,
        }
    }

    // -- model configs ----------------------------------------------------

    /// Persist a model config, setting `updated_at` to now.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if serialization or the backing store fails.
    pub async fn upsert_model(&self, mut model: ModelConfig) -> ConfigResult<ModelConfig> {
        model.base_url = ModelConfig::normalize_base_url(&model.base_url);
        model.updated_at = Utc::now();
        let bytes = serde_json::to_vec(&model)?;
        self.kv.set(&format!("{MODEL_PREFIX}{}", model.id), bytes).await?;
        Ok(model)
    }

    /// Fetch a model config by id.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if absent, or a storage/serialization error.
    pub async fn get_model(&self, id: &str) -> ConfigResult<ModelConfig> {
        let entry = self
            .kv
            .get(&format!("{MODEL_PREFIX}{id}"))
            .await?
            .ok_or_else(|| ConfigError::NotFound(format!("model {id}")))?;
        Ok(serde_json::from_slice(&entry.value)?)
    }

    /// List all model configs.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the backing store fails.
    pub async fn list_models(&self) -> ConfigResult<Vec<ModelConfig>> {
        let keys = self.kv.list_keys(MODEL_PREFIX).await?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = self.kv.get(&key).await? {
                out.push(serde_json::from_slice(&entry.value)?);
            }
        }
        Ok(out)
    }

    /// Delete a model config by id. Missing ids are not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the backing store fails.
    pub async fn delete_model(&self, id: &str) -> ConfigResult<()> {
        self.kv.delete(&format!("{MODEL_PREFIX}{id}")).await?;
        Ok(())
    }

    /// The id of the model config used for runs, if one has been selected.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the backing store fails.
    pub async fn active_model_id(&self) -> ConfigResult<Option<String>> {
        match self.kv.get(ACTIVE_MODEL_KEY).await? {
            Some(entry) => Ok(Some(serde_json::from_slice(&entry.value)?)),
            None => Ok(None),
        }
    }

    /// Select the active model config by id.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the backing store fails.
    pub async fn set_active_model_id(&self, id: &str) -> ConfigResult<()> {
        let bytes = serde_json::to_vec(id)?;
        self.kv.set(ACTIVE_MODEL_KEY, bytes).await?;
        Ok(())
    }

    /// Fetch the currently active model config, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the backing store fails or the active id
    /// no longer resolves to a stored model.
    pub async fn active_model(&self) -> ConfigResult<Option<ModelConfig>> {
        match self.active_model_id().await? {
            Some(id) => Ok(Some(self.get_model(&id).await?)),
            None => Ok(None),
        }
    }

    // -- MCP servers --------------------------------------------------------

    /// Persist an MCP server definition, validating transport-specific
    /// required fields first.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on a validation failure, or a
    /// storage/serialization error.
    pub async fn upsert_mcp_server(
        &self,
        mut server: McpServerConfig,
    ) -> ConfigResult<McpServerConfig> {
        server.validate().map_err(ConfigError::Invalid)?;
        server.updated_at = Utc::now();
        let bytes = serde_json::to_vec(&server)?;
        self.kv.set(&format!("{MCP_PREFIX}{}", server.id), bytes).await?;
        Ok(server)
    }

    /// Fetch an MCP server definition by id.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if absent, or a storage/serialization error.
    pub async fn get_mcp_server(&self, id: &str) -> ConfigResult<McpServerConfig> {
        let entry = self
            .kv
            .get(&format!("{MCP_PREFIX}{id}"))
            .await?
            .ok_or_else(|| ConfigError::NotFound(format!("mcp server {id}")))?;
        Ok(serde_json::from_slice(&entry.value)?)
    }

    /// List all MCP server definitions.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the backing store fails.
    pub async fn list_mcp_servers(&self) -> ConfigResult<Vec<McpServerConfig>> {
        let keys = self.kv.list_keys(MCP_PREFIX).await?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = self.kv.get(&key).await? {
                out.push(serde_json::from_slice(&entry.value)?);
            }
        }
        Ok(out)
    }

    /// Delete an MCP server definition by id. Missing ids are not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the backing store fails.
    pub async fn delete_mcp_server(&self, id: &str) -> ConfigResult<()> {
        self.kv.delete(&format!("{MCP_PREFIX}{id}")).await?;
        Ok(())
    }

    /// The manual allow-prefix list, if one has been set.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the backing store fails.
    pub async fn allow_prefixes(&self) -> ConfigResult<Vec<String>> {
        match self.kv.get(ALLOW_PREFIXES_KEY).await? {
            Some(entry) => Ok(serde_json::from_slice(&entry.value)?),
            None => Ok(Vec::new()),
        }
    }

    /// Set the manual allow-prefix list.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the backing store fails.
    pub async fn set_allow_prefixes(&self, prefixes: Vec<String>) -> ConfigResult<()> {
        let bytes = serde_json::to_vec(&prefixes)?;
        self.kv.set(ALLOW_PREFIXES_KEY, bytes).await?;
        Ok(())
    }

    /// The effective allow-prefix list (§4.1): the manual list if non-empty,
    /// else one `mcp_<slug>_` prefix per *enabled* MCP server, de-duplicated
    /// and in first-seen order.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the backing store fails.
    pub async fn effective_allow_prefixes(&self) -> ConfigResult<Vec<String>> {
        let manual = self.allow_prefixes().await?;
        if !manual.is_empty() {
            return Ok(manual);
        }
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for server in self.list_mcp_servers().await? {
            if !server.enabled {
                continue;
            }
            let prefix = server.tool_prefix();
            if seen.insert(prefix.clone()) {
                out.push(prefix);
            }
        }
        Ok(out)
    }

    // -- runtime config overrides -------------------------------------------

    /// Fetch the runtime config overrides, defaulting to all-unset.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the backing store fails.
    pub async fn runtime_config(&self) -> ConfigResult<RuntimeConfig> {
        match self.kv.get(RUNTIME_CONFIG_KEY).await? {
            Some(entry) => Ok(serde_json::from_slice(&entry.value)?),
            None => Ok(RuntimeConfig::default()),
        }
    }

    /// Persist the runtime config overrides.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the backing store fails.
    pub async fn set_runtime_config(&self, config: &RuntimeConfig) -> ConfigResult<()> {
        let bytes = serde_json::to_vec(config)?;
        self.kv.set(RUNTIME_CONFIG_KEY, bytes).await?;
        Ok(())
    }

    // -- arbitrary settings ---------------------------------------------------

    /// Fetch an arbitrary setting by name, preserving unknown keys as opaque
    /// JSON (§9).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the backing store fails.
    pub async fn get_setting(&self, key: &str) -> ConfigResult<Option<SettingValue>> {
        match self.kv.get(&format!("{SETTING_PREFIX}{key}")).await? {
            Some(entry) => Ok(Some(serde_json::from_slice(&entry.value)?)),
            None => Ok(None),
        }
    }

    /// Persist an arbitrary setting by name.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the backing store fails.
    pub async fn set_setting(&self, key: &str, value: &SettingValue) -> ConfigResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.kv.set(&format!("{SETTING_PREFIX}{key}"), bytes).await?;
        Ok(())
    }

    // -- marketplace records --------------------------------------------------

    /// Persist a marketplace record (insert or update).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the backing store fails.
    pub async fn save_marketplace(
        &self,
        mut record: MarketplaceRecord,
    ) -> ConfigResult<MarketplaceRecord> {
        record.updated_at = Utc::now();
        let bytes = serde_json::to_vec(&record)?;
        self.kv
            .set(&format!("{MARKETPLACE_PREFIX}{}", record.id), bytes)
            .await?;
        Ok(record)
    }

    /// Mark a marketplace record active or inactive, then rewrite the
    /// effective manifest file (§4.1 `ensureMarketplaceFile`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the record doesn't exist, or a
    /// storage/IO error.
    pub async fn set_marketplace_active(&self, id: &str, active: bool) -> ConfigResult<()> {
        let mut record = self.get_marketplace(id).await?;
        record.active = active;
        self.save_marketplace(record).await?;
        self.ensure_marketplace_file().await
    }

    /// Delete a marketplace record, then rewrite the effective manifest file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the backing store or file write fails.
    pub async fn delete_marketplace(&self, id: &str) -> ConfigResult<()> {
        self.kv.delete(&format!("{MARKETPLACE_PREFIX}{id}")).await?;
        self.ensure_marketplace_file().await
    }

    /// Fetch a marketplace record by id.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if absent, or a storage/serialization error.
    pub async fn get_marketplace(&self, id: &str) -> ConfigResult<MarketplaceRecord> {
        let entry = self
            .kv
            .get(&format!("{MARKETPLACE_PREFIX}{id}"))
            .await?
            .ok_or_else(|| ConfigError::NotFound(format!("marketplace {id}")))?;
        Ok(serde_json::from_slice(&entry.value)?)
    }

    /// List all marketplace records.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the backing store fails.
    pub async fn list_marketplaces(&self) -> ConfigResult<Vec<MarketplaceRecord>> {
        let keys = self.kv.list_keys(MARKETPLACE_PREFIX).await?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = self.kv.get(&key).await? {
                out.push(serde_json::from_slice(&entry.value)?);
            }
        }
        Ok(out)
    }

    /// Rewrite the effective merged manifest to disk from the currently
    /// active marketplace records (§3, invariant iv).
    ///
    /// Merge rule: plugins are merged in first-occurrence order, keyed by
    /// `source` path if present, else `name`, else the plugin's JSON form;
    /// records are visited in `id` order so the merge is deterministic. A
    /// no-op if no marketplace file path was configured.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the backing store or file write fails.
    pub async fn ensure_marketplace_file(&self) -> ConfigResult<()> {
        let Some(path) = self.marketplace_file.as_ref() else {
            return Ok(());
        };
        let mut records = self
            .list_marketplaces()
            .await?
            .into_iter()
            .filter(|r| r.active)
            .collect::<Vec<_>>();
        records.sort_by(|a, b| a.id.cmp(&b.id));

        let merged = crate::marketplace::merge_effective_manifest(&records);
        write_json_atomic(path, &merged)?;
        Ok(())
    }
}

fn write_json_atomic(path: &Path, value: &serde_json::Value) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_string_pretty(value)?;
    std::fs::write(path, body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatos_storage::MemoryKvStore;

    fn store() -> ConfigStore {
        ConfigStore::new(Arc::new(MemoryKvStore::new()), None)
    }

    fn model(id: &str) -> ModelConfig {
        ModelConfig {
            id: id.to_string(),
            name: "Default".into(),
            api_key: "sk-test".into(),
            base_url: "https://api.example.com".into(),
            model: "gpt-test".into(),
            reasoning_enabled: false,
            responses_enabled: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn model_roundtrip_normalizes_base_url() {
        let store = store();
        let saved = store.upsert_model(model("m1")).await.unwrap();
        assert_eq!(saved.base_url, "https://api.example.com/v1");
        let loaded = store.get_model("m1").await.unwrap();
        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn active_model_resolves_through_id() {
        let store = store();
        store.upsert_model(model("m1")).await.unwrap();
        assert!(store.active_model().await.unwrap().is_none());
        store.set_active_model_id("m1").await.unwrap();
        let active = store.active_model().await.unwrap().unwrap();
        assert_eq!(active.id, "m1");
    }

    #[tokio::test]
    async fn effective_allow_prefixes_prefers_manual_list() {
        let store = store();
        store
            .upsert_mcp_server(McpServerConfig {
                id: "s1".into(),
                name: "Task Manager".into(),
                transport: crate::types::McpTransport::Stdio,
                command: Some("npx".into()),
                args: vec![],
                endpoint_url: None,
                headers_json: None,
                enabled: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        assert_eq!(
            store.effective_allow_prefixes().await.unwrap(),
            vec!["mcp_task_manager_".to_string()]
        );
        store
            .set_allow_prefixes(vec!["custom_".to_string()])
            .await
            .unwrap();
        assert_eq!(
            store.effective_allow_prefixes().await.unwrap(),
            vec!["custom_".to_string()]
        );
    }

    #[tokio::test]
    async fn disabled_servers_do_not_contribute_prefixes() {
        let store = store();
        store
            .upsert_mcp_server(McpServerConfig {
                id: "s1".into(),
                name: "Off".into(),
                transport: crate::types::McpTransport::Stdio,
                command: Some("npx".into()),
                args: vec![],
                endpoint_url: None,
                headers_json: None,
                enabled: false,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        assert!(store.effective_allow_prefixes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn settings_preserve_unknown_keys() {
        let store = store();
        let value = SettingValue::Other(serde_json::json!({"custom": true}));
        store.set_setting("my_key", &value).await.unwrap();
        let loaded = store.get_setting("my_key").await.unwrap().unwrap();
        assert_eq!(loaded, value);
    }
}
