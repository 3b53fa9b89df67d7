//! Wire-adjacent types shared by both protocol styles (§4.6).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message in a chat-completion conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who is speaking.
    pub role: MessageRole,
    /// What they said.
    pub content: MessageContent,
}

impl Message {
    /// Build a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Build a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Build an assistant message (a prior turn's reply).
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Build a tool-result message reporting `result` for `tool_call_id`
    /// (§4.7 step 3).
    #[must_use]
    pub fn tool_result(tool_call_id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: MessageContent::ToolResult {
                tool_call_id: tool_call_id.into(),
                content: result.into(),
            },
        }
    }
}

/// Speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The system prompt.
    System,
    /// The end user / caller.
    User,
    /// A prior model reply.
    Assistant,
    /// A tool-call result fed back to the model.
    Tool,
}

/// Message body, either plain text, an assistant turn carrying tool calls,
/// or a tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text.
    Text(String),
    /// An assistant turn that issued tool calls (§4.7 step 3).
    ToolCalls {
        /// Any accompanying text (often empty).
        #[serde(default)]
        text: String,
        /// The calls the model made.
        calls: Vec<ToolCall>,
    },
    /// A tool result being reported back to the model.
    ToolResult {
        /// The id of the call this responds to.
        tool_call_id: String,
        /// The tool's JSON (or error-JSON) output, as a string.
        content: String,
    },
}

/// One tool invocation the model requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// The call's id, echoed back in the matching tool-result message.
    pub id: String,
    /// The tool name.
    pub name: String,
    /// Raw JSON arguments, as emitted by the model (may be malformed).
    pub arguments: String,
}

/// A tool the model may call, in the shape both protocol styles expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmToolDefinition {
    /// Tool name, referenced by [`ToolCall::name`].
    pub name: String,
    /// Human-readable description shown to the model.
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: Value,
}

/// The accumulated result of one non-streaming-observer LLM turn (§4.6,
/// §4.7).
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    /// Accumulated text content.
    pub text: String,
    /// Tool calls requested in this turn, in the order the model emitted
    /// them (§4.7: "The loop never calls tools in parallel; ordering
    /// matches the model's reply order").
    pub tool_calls: Vec<ToolCall>,
    /// Set if the response was cut short by the output-byte cap.
    pub truncated: bool,
}
