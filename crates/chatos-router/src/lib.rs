//! The sub-agent router's public tool surface (§4.10), transport-agnostic.
//!
//! [`RouterApp`] holds every long-lived collaborator (catalog, config, job
//! store/supervisor, process-wide ids) and implements the six MCP tools
//! plus the unified admin read surface. `bin/main.rs` is the only consumer
//! that knows about `rmcp`; everything here is plain `async fn`s over JSON.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod app;
mod envelope;
mod error;
mod events;
mod invoker;
mod prompt;
mod resolve;

pub mod cli;

pub use app::{RouterApp, RouterDefaults, RunInput, SuggestInput};
pub use cli::{Cli, LogFormatArg};
pub use envelope::with_chatos;
pub use error::to_tool_error;
pub use resolve::{Resolved, SelectInput, mcp_servers_summary, resolve, resolve_allow_prefixes};
