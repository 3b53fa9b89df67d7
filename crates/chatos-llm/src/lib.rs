//! Chat-completions/responses LLM driver for the sub-agent router (§4.6).
//!
//! [`driver::LlmDriver`] speaks either streaming protocol style against a
//! [`chatos_config::ModelConfig`], retries transient failures with
//! [`chatos_core::retry`], and emits [`events::AiEvent`]s so a caller can
//! persist a run's request/response/retry history as `JobEvent`s. Setting
//! `SUBAGENT_LLM_CMD` substitutes a locally spawned process (via
//! `chatos-process`) for the HTTP transport entirely.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod driver;
mod error;
mod events;
mod types;

pub use driver::{LlmDriver, LlmRequest};
pub use error::{LlmError, LlmResult};
pub use events::{AiEvent, AiEventSink, truncate_for_event};
pub use types::{LlmResponse, LlmToolDefinition, Message, MessageContent, MessageRole, ToolCall};
