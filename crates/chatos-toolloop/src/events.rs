//! Events emitted by a running tool-call loop, destined to become `JobEvent`s
//! of type `tool_call`/`tool_result`/`finish_error` (§4.7, §4.9).

use async_trait::async_trait;

/// One diagnostic point in a tool-call loop's lifetime.
#[derive(Debug, Clone)]
pub enum ToolLoopEvent {
    /// The model requested a tool call this turn.
    ToolCall {
        /// 1-based turn number.
        turn: u32,
        /// The tool's name, as emitted by the model.
        name: String,
        /// Raw JSON arguments, as emitted by the model (may be malformed).
        arguments: String,
    },
    /// A tool call's result (or a synthesized parse-error result) was
    /// produced and appended to the conversation.
    ToolResult {
        /// 1-based turn number.
        turn: u32,
        /// The tool's name.
        name: String,
        /// The JSON (or error-JSON) result, as a string.
        result: String,
    },
    /// The loop ended without a textual answer (§4.7 "Boundary decision").
    FinishError {
        /// Why the loop ended without an answer, e.g.
        /// `"max_turns_exceeded"`, `"cancelled"`, `"timeout"`.
        reason: String,
    },
}

/// Receives [`ToolLoopEvent`]s as they occur. Implementations should not
/// block; the loop awaits each call before continuing.
#[async_trait]
pub trait ToolLoopEventSink: Send + Sync {
    /// Handle one event.
    async fn on_event(&self, event: ToolLoopEvent);
}
