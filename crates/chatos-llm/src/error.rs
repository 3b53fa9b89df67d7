//! LLM driver error types.

use thiserror::Error;

/// Errors surfaced by the LLM driver (§4.6, §7).
#[derive(Debug, Error)]
pub enum LlmError {
    /// No model is configured for this run.
    #[error("no model configured")]
    NoModel,

    /// The HTTP transport itself failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint returned a non-2xx status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or error message.
        message: String,
    },

    /// A streamed chunk or final response could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The run was cancelled by an external signal.
    #[error("aborted")]
    Aborted,

    /// The request's wall-clock timeout elapsed.
    #[error("timed out")]
    TimedOut,

    /// The retry budget was exhausted; carries the last attempt's error.
    #[error("retries exhausted: {0}")]
    RetriesExhausted(String),

    /// `SUBAGENT_LLM_CMD` failed to spawn or run.
    #[error("llm command failed: {0}")]
    Command(#[from] chatos_process::ProcessError),
}

/// Result alias for LLM driver operations.
pub type LlmResult<T> = Result<T, LlmError>;
