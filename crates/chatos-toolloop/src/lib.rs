//! Multi-turn LLM/tool-calling orchestration loop for the sub-agent router
//! (§4.7).
//!
//! [`ToolLoop`] drives a conversation against any [`LlmTurn`], dispatching
//! tool calls through a [`ToolInvoker`] and emitting [`ToolLoopEvent`]s a
//! caller can persist as `JobEvent`s, until a final textual answer or a
//! [`StopReason`] is reached.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod events;
mod invoker;
mod loop_;
mod turn;

pub use events::{ToolLoopEvent, ToolLoopEventSink};
pub use invoker::ToolInvoker;
pub use loop_::{DEFAULT_MAX_TURNS, StopReason, ToolLoop, ToolLoopOutcome, ToolLoopRequest};
pub use turn::LlmTurn;
