//! Job store error types.

use thiserror::Error;

/// Errors surfaced by the job store.
#[derive(Debug, Error)]
pub enum JobsError {
    /// The requested job, event index, or session does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A job lookup was attempted with a session it does not belong to
    /// (§4.10 `get_sub_agent_status`/`cancel_sub_agent_job`).
    #[error("job {job_id} does not belong to session {session_id}")]
    ForeignSession {
        /// The job's id.
        job_id: String,
        /// The session that attempted the access.
        session_id: String,
    },

    /// A stored value could not be decoded as JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing key/value store failed.
    #[error("storage error: {0}")]
    Storage(#[from] chatos_storage::StorageError),
}

/// Result alias for job store operations.
pub type JobsResult<T> = Result<T, JobsError>;
