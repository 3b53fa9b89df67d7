//! Structured events the driver emits for persistence as `JobEvent`s (§4.6,
//! §4.9). Emission never affects the main control flow: handler failures
//! are swallowed (§7 "LLM event-handler exceptions are swallowed to protect
//! the main flow").

use serde_json::Value;

use chatos_core::truncate::truncate_with_marker as core_truncate_with_marker;

/// One diagnostic point in an LLM call's lifetime.
#[derive(Debug, Clone)]
pub enum AiEvent {
    /// A request is about to be sent.
    Request {
        /// JSON body of the request (secrets redacted by the caller).
        payload: Value,
    },
    /// A response was received successfully.
    Response {
        /// JSON summary of the response.
        payload: Value,
    },
    /// A non-retryable (or retry-exhausted) failure occurred.
    Error {
        /// Human-readable error message.
        message: String,
    },
    /// An attempt failed and is being retried.
    Retry {
        /// 1-based attempt number that just failed.
        attempt: u32,
        /// Delay before the next attempt, in milliseconds.
        delay_ms: u64,
        /// The error that triggered the retry.
        message: String,
    },
}

/// Receives [`AiEvent`]s as they occur. Implementations should not block;
/// the driver awaits each call before continuing.
#[async_trait::async_trait]
pub trait AiEventSink: Send + Sync {
    /// Handle one event. Errors are logged and otherwise ignored by the
    /// driver (§7).
    async fn on_event(&self, event: AiEvent);
}

/// Truncate a string destined for an event payload to `max_chars`,
/// appending the `"…[truncated N chars]"` marker (§4.6).
#[must_use]
pub fn truncate_for_event(s: &str, max_chars: usize) -> String {
    core_truncate_with_marker(s, max_chars)
}
