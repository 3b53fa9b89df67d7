//! In-memory supervision of in-flight jobs (§5, §9): the `inflight` map
//! lets a cancellation request reach a running job's cancellation token
//! and OS process, and the `cancelled` set lets a job that finishes after
//! being cancelled recognize that its result must be recorded as
//! `finish_ignored` rather than overwriting the `cancelled` status.
//!
//! Grounded on `SubAgentPool`'s active-handle map and
//! [`chatos_process::ProcessHandle::terminate_then_kill`]'s own doc note
//! that it is "kept in the router's in-memory supervision map (§5) so a
//! cancellation request arriving after the spawn call returns can still
//! reach the OS process."

use std::collections::{HashMap, HashSet};

use chatos_process::ProcessHandle;
use tokio_util::sync::CancellationToken;

/// A handle to one in-flight job, tracked for the lifetime of its run.
struct JobHandle {
    cancel: CancellationToken,
    process: Option<ProcessHandle>,
}

/// Tracks in-flight jobs so `cancel_sub_agent_job` (§4.10) can reach a
/// running job regardless of which task is currently driving it.
#[derive(Default)]
pub struct JobSupervisor {
    inflight: tokio::sync::Mutex<HashMap<String, JobHandle>>,
    cancelled: tokio::sync::Mutex<HashSet<String>>,
}

impl JobSupervisor {
    /// Build an empty supervisor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a job, returning the [`CancellationToken`] its
    /// execution should select on.
    pub async fn track(&self, job_id: impl Into<String>, process: Option<ProcessHandle>) -> CancellationToken {
        let cancel = CancellationToken::new();
        let handle = JobHandle {
            cancel: cancel.clone(),
            process,
        };
        self.inflight.lock().await.insert(job_id.into(), handle);
        cancel
    }

    /// Attach (or replace) the OS process handle for a tracked job, for
    /// jobs whose process is spawned after `track` is called.
    pub async fn set_process(&self, job_id: &str, process: ProcessHandle) {
        if let Some(handle) = self.inflight.lock().await.get_mut(job_id) {
            handle.process = Some(process);
        }
    }

    /// Stop tracking a job once its run has reached a terminal outcome.
    /// Does not clear the `cancelled` flag — a later `finish`/`finish_error`
    /// for an already-cancelled job must still see it (§9: cancellation
    /// does not clear `resultJson`, and a cancelled job's status never
    /// flips back).
    pub async fn untrack(&self, job_id: &str) {
        self.inflight.lock().await.remove(job_id);
    }

    /// Whether `job_id` was ever cancelled.
    pub async fn is_cancelled(&self, job_id: &str) -> bool {
        self.cancelled.lock().await.contains(job_id)
    }

    /// Cancel a tracked job: marks it cancelled, signals its token, and
    /// best-effort terminates its OS process if one was attached.
    /// Returns `true` if a live handle was found (i.e. the job was still
    /// in-flight), `false` if it had already finished or was never
    /// tracked — the caller still records the `cancelled` flag either way,
    /// since a cancellation racing a fast completion should still cause a
    /// later out-of-band result to be ignored.
    pub async fn cancel(&self, job_id: &str) -> bool {
        self.cancelled.lock().await.insert(job_id.to_string());

        let handle = self.inflight.lock().await.remove(job_id);
        match handle {
            Some(handle) => {
                handle.cancel.cancel();
                if let Some(process) = handle.process {
                    process.terminate_then_kill().await;
                }
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_before_tracking_still_marks_cancelled() {
        let supervisor = JobSupervisor::new();
        let found = supervisor.cancel("job-1").await;
        assert!(!found);
        assert!(supervisor.is_cancelled("job-1").await);
    }

    #[tokio::test]
    async fn track_then_cancel_signals_token() {
        let supervisor = JobSupervisor::new();
        let token = supervisor.track("job-1", None).await;
        assert!(!token.is_cancelled());

        let found = supervisor.cancel("job-1").await;
        assert!(found);
        assert!(token.is_cancelled());
        assert!(supervisor.is_cancelled("job-1").await);
    }

    #[tokio::test]
    async fn untrack_does_not_clear_cancelled_flag() {
        let supervisor = JobSupervisor::new();
        let _token = supervisor.track("job-1", None).await;
        supervisor.cancel("job-1").await;
        supervisor.untrack("job-1").await;
        assert!(supervisor.is_cancelled("job-1").await);
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let supervisor = JobSupervisor::new();
        let token = supervisor.track("job-1", None).await;
        assert!(supervisor.cancel("job-1").await);
        assert!(!supervisor.cancel("job-1").await);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn untracked_job_reports_not_cancelled() {
        let supervisor = JobSupervisor::new();
        assert!(!supervisor.is_cancelled("job-missing").await);
    }
}
