//! Job, event, and model-route record shapes (§3, §4.9).

use chatos_core::{RunId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of a [`Job`]. Transitions: `Queued -> Running ->
/// {Done, Error, Cancelled}`; terminal states are sticky (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, not yet started.
    Queued,
    /// Running in-process.
    Running,
    /// Finished successfully.
    Done,
    /// Finished with an error.
    Error,
    /// Cancelled before or during completion.
    Cancelled,
}

impl JobStatus {
    /// Whether this status is terminal — once reached, it does not change
    /// (except a `Cancelled` job may still see a trailing `finish_ignored`
    /// event, never a status overwrite).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Cancelled)
    }
}

/// A single asynchronous invocation of `run_sub_agent`, persistently
/// tracked (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job id.
    pub id: String,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// The task text the job was created for.
    pub task: String,
    /// The resolved agent id, if one was selected before the job started.
    pub agent_id: Option<String>,
    /// The resolved command id, if any.
    pub command_id: Option<String>,
    /// Arbitrary request payload, preserved for audit/replay.
    pub payload_json: Option<Value>,
    /// The run's result payload, once available.
    pub result_json: Option<Value>,
    /// The run's error message, if it ended in `Error`.
    pub error: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last status/result/error write time.
    pub updated_at: DateTime<Utc>,
    /// The session this job belongs to.
    pub session_id: SessionId,
    /// The run that created this job.
    pub run_id: RunId,
}

/// The closed set of [`JobEvent`] kinds (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    /// The job's work began.
    Start,
    /// The job failed to start (e.g. unknown agent, spawn failure).
    StartError,
    /// The job finished successfully.
    Finish,
    /// The job finished with an error.
    FinishError,
    /// The underlying run completed after the job had already been
    /// cancelled; its outcome is recorded but does not change the status
    /// (§4.10, §5).
    FinishIgnored,
    /// The job was cancelled.
    Cancel,
    /// An LLM request was sent.
    AiRequest,
    /// An LLM response was received.
    AiResponse,
    /// An LLM request failed (after retries, or non-retryable).
    AiError,
    /// An LLM request is being retried.
    AiRetry,
    /// A tool was called during an LLM tool-loop run.
    ToolCall,
    /// A tool call's result was recorded.
    ToolResult,
}

/// An append-only record of a significant point in a job's lifetime (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    /// Unique event id.
    pub id: String,
    /// The job this event belongs to.
    pub job_id: String,
    /// What kind of event this is.
    pub kind: JobEventKind,
    /// Event-specific payload (e.g. the tool name/arguments for
    /// `tool_call`, the reason for `finish_error`).
    pub payload_json: Option<Value>,
    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
    /// The session the owning job belongs to.
    pub session_id: SessionId,
    /// The run that recorded this event.
    pub run_id: RunId,
}

/// One entry in the model-route log: which model config a job's LLM calls
/// were routed through (C10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRoute {
    /// Unique entry id.
    pub id: String,
    /// The job this route applies to.
    pub job_id: String,
    /// The model config id used.
    pub model_id: String,
    /// When the route was recorded.
    pub created_at: DateTime<Utc>,
    /// The session the owning job belongs to.
    pub session_id: SessionId,
    /// The run that recorded this entry.
    pub run_id: RunId,
}
