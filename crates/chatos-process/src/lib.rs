//! Child-process execution for the sub-agent router (§4.5 "Process
//! runner").
//!
//! Spawns a command with a `SUBAGENT_*` environment overlay, captures
//! stdout/stderr under independent byte caps, and enforces a
//! SIGTERM-then-SIGKILL timeout escalation. [`kill::ProcessHandle`] is the
//! piece of this crate the router's job supervision map (§5) holds onto so
//! an external `cancel_sub_agent_job` call can reach a still-running child.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod context;
mod error;
mod kill;
mod quote;
mod runner;

pub use context::{CommandSpec, Exec, SpawnContext};
pub use error::{ProcessError, ProcessResult};
pub use kill::ProcessHandle;
pub use quote::split_words;
pub use runner::{RunHandle, RunOptions, RunResult, spawn, spawn_with_input};
