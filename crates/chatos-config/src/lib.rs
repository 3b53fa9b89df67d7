//! Persisted runtime settings, model profiles, MCP server definitions, and
//! marketplace blobs for the sub-agent router (§4.1).
//!
//! [`ConfigStore`] is the single entry point: typed CRUD over
//! [`ModelConfig`]/[`McpServerConfig`]/[`MarketplaceRecord`]/[`RuntimeConfig`],
//! plus the derived [`ConfigStore::effective_allow_prefixes`] and the
//! [`ConfigStore::ensure_marketplace_file`] side effect that keeps the
//! on-disk effective manifest consistent with the active record set.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod marketplace;
mod store;
mod types;

pub use error::{ConfigError, ConfigResult};
pub use store::ConfigStore;
pub use types::{
    AgentRegistryFile, AgentSpec, CommandSpec, MarketplaceRecord, McpServerConfig, McpTransport,
    ModelConfig, RuntimeConfig, SettingValue, SkillSpec, prefix_slug,
};
