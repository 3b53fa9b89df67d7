//! Structured logging setup for the sub-agent router.
//!
//! A single [`setup_logging`] call at startup installs one
//! `tracing-subscriber` `fmt` layer for the whole process; nothing downstream
//! configures logging again. Every component logs through `tracing` — the
//! job store (§4.9 of the design spec) is the durable record of what a job
//! did, `tracing` output is the operational superset used to watch the
//! process live.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, setup_logging};
