//! Process runner error types.

use thiserror::Error;

/// Errors surfaced by [`crate::spawn`]/[`crate::run_with_input`] before a
/// child ever starts running. Once a child is running, failures are
/// recorded on [`crate::RunResult::error`] instead of returned here, so a
/// tool call always gets a result payload (§7).
#[derive(Debug, Error)]
pub enum ProcessError {
    /// `exec` was empty.
    #[error("Command spec is missing exec")]
    MissingExec,

    /// The OS refused to spawn the process.
    #[error("failed to spawn process: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Result alias for process-runner setup.
pub type ProcessResult<T> = Result<T, ProcessError>;
