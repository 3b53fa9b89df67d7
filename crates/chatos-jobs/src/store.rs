//! The durable job store (§4.9): `createJob`/`updateJobStatus`/
//! `appendEvent`/`listJobs`/`listSessions`/`appendModelRoute`, all persisted
//! through a [`chatos_storage::KvStore`] exactly as
//! `chatos_config::ConfigStore` persists its settings (§4.1) — append-only
//! id lists play the role of the spec's `(session_id)`/`(status)`/
//! `(job_id)` indexes.

use std::sync::Arc;

use chatos_core::{RunId, SessionId};
use chatos_storage::KvStore;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{JobsError, JobsResult};
use crate::types::{Job, JobEvent, JobEventKind, JobStatus, ModelRoute};

const JOB_PREFIX: &str = "job:";
const JOB_SESSION_INDEX_PREFIX: &str = "job_index:session:";
const JOB_ALL_INDEX_KEY: &str = "job_index:all";
const SESSION_INDEX_KEY: &str = "session_index";
const EVENT_PREFIX: &str = "event:";
const EVENT_INDEX_PREFIX: &str = "event_index:";
const MODEL_ROUTE_PREFIX: &str = "model_route:";
const MODEL_ROUTE_INDEX_PREFIX: &str = "model_route_index:";

/// Default `listJobs` limit (§4.9).
const DEFAULT_LIST_LIMIT: usize = 200;
/// Default `listSessions` limit (§4.9).
const DEFAULT_SESSION_LIMIT: usize = 50;

/// Filter/pagination parameters for [`JobStore::list_jobs`] (§4.9).
#[derive(Debug, Clone, Default)]
pub struct ListJobsQuery {
    /// Restrict to one session. Ignored if `all_sessions` is set.
    pub session_id: Option<String>,
    /// Restrict to one status.
    pub status: Option<JobStatus>,
    /// Maximum rows returned. Defaults to 200.
    pub limit: Option<usize>,
    /// Ignore `session_id` and return jobs across every session.
    pub all_sessions: bool,
}

/// Durable jobs + events + model-route log (§4.9).
pub struct JobStore {
    kv: Arc<dyn KvStore>,
    // Append-only index lists (job ids per session/global, event ids per
    // job) are read-modify-write over the same store; this lock serializes
    // those updates so two concurrent jobs never clobber each other's
    // append (mirrors the config store's one-key-at-a-time writes, which
    // don't need this because they never share a key across calls).
    index_lock: tokio::sync::Mutex<()>,
}

impl JobStore {
    /// Wrap a key/value store.
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            index_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn read_index(&self, key: &str) -> JobsResult<Vec<String>> {
        match self.kv.get(key).await? {
            Some(entry) => Ok(serde_json::from_slice(&entry.value)?),
            None => Ok(Vec::new()),
        }
    }

    async fn write_index(&self, key: &str, ids: &[String]) -> JobsResult<()> {
        let bytes = serde_json::to_vec(ids)?;
        self.kv.set(key, bytes).await?;
        Ok(())
    }

    async fn touch_session_recency(&self, session_id: &str) -> JobsResult<()> {
        let mut sessions = self.read_index(SESSION_INDEX_KEY).await?;
        sessions.retain(|s| s != session_id);
        sessions.insert(0, session_id.to_string());
        self.write_index(SESSION_INDEX_KEY, &sessions).await
    }

    /// Create a job with `status = queued` (§4.9 `createJob`).
    ///
    /// # Errors
    ///
    /// Returns a [`JobsError`] if the backing store fails.
    pub async fn create_job(
        &self,
        task: impl Into<String>,
        agent_id: Option<String>,
        command_id: Option<String>,
        payload_json: Option<Value>,
        session_id: SessionId,
        run_id: RunId,
    ) -> JobsResult<Job> {
        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4().to_string(),
            status: JobStatus::Queued,
            task: task.into(),
            agent_id,
            command_id,
            payload_json,
            result_json: None,
            error: None,
            created_at: now,
            updated_at: now,
            session_id,
            run_id,
        };

        let _guard = self.index_lock.lock().await;
        let bytes = serde_json::to_vec(&job)?;
        self.kv
            .set(&format!("{JOB_PREFIX}{}", job.id), bytes)
            .await?;

        let session_key = format!("{JOB_SESSION_INDEX_PREFIX}{}", job.session_id.as_str());
        let mut session_jobs = self.read_index(&session_key).await?;
        session_jobs.push(job.id.clone());
        self.write_index(&session_key, &session_jobs).await?;

        let mut all_jobs = self.read_index(JOB_ALL_INDEX_KEY).await?;
        all_jobs.push(job.id.clone());
        self.write_index(JOB_ALL_INDEX_KEY, &all_jobs).await?;

        self.touch_session_recency(job.session_id.as_str()).await?;

        Ok(job)
    }

    /// Fetch a job by id.
    ///
    /// # Errors
    ///
    /// Returns [`JobsError::NotFound`] if absent, or a storage/serialization error.
    pub async fn get_job(&self, id: &str) -> JobsResult<Job> {
        let entry = self
            .kv
            .get(&format!("{JOB_PREFIX}{id}"))
            .await?
            .ok_or_else(|| JobsError::NotFound(format!("job {id}")))?;
        Ok(serde_json::from_slice(&entry.value)?)
    }

    /// Fetch a job by id, requiring it belong to `session_id` (§4.10
    /// `get_sub_agent_status`/`cancel_sub_agent_job`).
    ///
    /// # Errors
    ///
    /// Returns [`JobsError::NotFound`] if absent, [`JobsError::ForeignSession`]
    /// if it belongs to a different session, or a storage/serialization error.
    pub async fn get_job_in_session(&self, id: &str, session_id: &SessionId) -> JobsResult<Job> {
        let job = self.get_job(id).await?;
        if job.session_id != *session_id {
            return Err(JobsError::ForeignSession {
                job_id: id.to_string(),
                session_id: session_id.as_str().to_string(),
            });
        }
        Ok(job)
    }

    /// Change a job's status, result, and error, bumping `updated_at`
    /// (§4.9 `updateJobStatus`). Does not touch events or indexes.
    ///
    /// # Errors
    ///
    /// Returns a [`JobsError`] if the job doesn't exist or the store fails.
    pub async fn update_job_status(
        &self,
        id: &str,
        status: JobStatus,
        result_json: Option<Value>,
        error: Option<String>,
    ) -> JobsResult<Job> {
        let _guard = self.index_lock.lock().await;
        let mut job = self.get_job(id).await?;
        job.status = status;
        job.result_json = result_json;
        job.error = error;
        job.updated_at = Utc::now();
        let bytes = serde_json::to_vec(&job)?;
        self.kv.set(&format!("{JOB_PREFIX}{id}"), bytes).await?;
        Ok(job)
    }

    /// Append an event (§4.9 `appendEvent`). Always allowed, even once a
    /// job is terminal — a `finish_ignored` event is recorded after a
    /// cancelled job's underlying run eventually completes (§4.10, §5).
    ///
    /// # Errors
    ///
    /// Returns a [`JobsError`] if the backing store fails.
    pub async fn append_event(
        &self,
        job_id: impl Into<String>,
        kind: JobEventKind,
        payload_json: Option<Value>,
        session_id: SessionId,
        run_id: RunId,
    ) -> JobsResult<JobEvent> {
        let job_id = job_id.into();
        let event = JobEvent {
            id: Uuid::new_v4().to_string(),
            job_id: job_id.clone(),
            kind,
            payload_json,
            created_at: Utc::now(),
            session_id,
            run_id,
        };

        let _guard = self.index_lock.lock().await;
        let bytes = serde_json::to_vec(&event)?;
        self.kv
            .set(&format!("{EVENT_PREFIX}{}", event.id), bytes)
            .await?;

        let index_key = format!("{EVENT_INDEX_PREFIX}{job_id}");
        let mut ids = self.read_index(&index_key).await?;
        ids.push(event.id.clone());
        self.write_index(&index_key, &ids).await?;

        Ok(event)
    }

    /// Events for one job, in append (strict causal) order (§5).
    ///
    /// # Errors
    ///
    /// Returns a [`JobsError`] if the backing store fails.
    pub async fn list_events(&self, job_id: &str) -> JobsResult<Vec<JobEvent>> {
        let ids = self
            .read_index(&format!("{EVENT_INDEX_PREFIX}{job_id}"))
            .await?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = self.kv.get(&format!("{EVENT_PREFIX}{id}")).await? {
                out.push(serde_json::from_slice(&entry.value)?);
            }
        }
        Ok(out)
    }

    /// List jobs (§4.9 `listJobs`), most recently created first, optionally
    /// filtered by session and/or status, capped at `limit` (default 200).
    ///
    /// # Errors
    ///
    /// Returns a [`JobsError`] if neither `session_id` nor `all_sessions` is
    /// set, or if the backing store fails.
    pub async fn list_jobs(&self, query: &ListJobsQuery) -> JobsResult<Vec<Job>> {
        let ids = if query.all_sessions {
            self.read_index(JOB_ALL_INDEX_KEY).await?
        } else {
            let session_id = query.session_id.as_deref().ok_or_else(|| {
                JobsError::NotFound("listJobs requires session_id unless all_sessions".into())
            })?;
            self.read_index(&format!("{JOB_SESSION_INDEX_PREFIX}{session_id}"))
                .await?
        };

        let mut jobs = Vec::new();
        for id in ids {
            let Some(entry) = self.kv.get(&format!("{JOB_PREFIX}{id}")).await? else {
                continue;
            };
            let job: Job = serde_json::from_slice(&entry.value)?;
            if let Some(status) = query.status {
                if job.status != status {
                    continue;
                }
            }
            jobs.push(job);
        }

        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(query.limit.unwrap_or(DEFAULT_LIST_LIMIT));
        Ok(jobs)
    }

    /// List sessions (§4.9 `listSessions`), most recently active first,
    /// capped at `limit` (default 50).
    ///
    /// # Errors
    ///
    /// Returns a [`JobsError`] if the backing store fails.
    pub async fn list_sessions(&self, limit: Option<usize>) -> JobsResult<Vec<String>> {
        let mut sessions = self.read_index(SESSION_INDEX_KEY).await?;
        sessions.truncate(limit.unwrap_or(DEFAULT_SESSION_LIMIT));
        Ok(sessions)
    }

    /// Append a model-route log entry (C10 `appendModelRoute`).
    ///
    /// # Errors
    ///
    /// Returns a [`JobsError`] if the backing store fails.
    pub async fn append_model_route(
        &self,
        job_id: impl Into<String>,
        model_id: impl Into<String>,
        session_id: SessionId,
        run_id: RunId,
    ) -> JobsResult<ModelRoute> {
        let job_id = job_id.into();
        let route = ModelRoute {
            id: Uuid::new_v4().to_string(),
            job_id: job_id.clone(),
            model_id: model_id.into(),
            created_at: Utc::now(),
            session_id,
            run_id,
        };

        let _guard = self.index_lock.lock().await;
        let bytes = serde_json::to_vec(&route)?;
        self.kv
            .set(&format!("{MODEL_ROUTE_PREFIX}{}", route.id), bytes)
            .await?;

        let index_key = format!("{MODEL_ROUTE_INDEX_PREFIX}{job_id}");
        let mut ids = self.read_index(&index_key).await?;
        ids.push(route.id.clone());
        self.write_index(&index_key, &ids).await?;

        Ok(route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatos_storage::MemoryKvStore;

    fn store() -> JobStore {
        JobStore::new(Arc::new(MemoryKvStore::new()))
    }

    fn ids() -> (SessionId, RunId) {
        (SessionId::new("sess-1"), RunId::new("run-1"))
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = store();
        let (session, run) = ids();
        let job = store
            .create_job("do the thing", None, None, None, session.clone(), run)
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Queued);

        let loaded = store.get_job(&job.id).await.unwrap();
        assert_eq!(loaded.id, job.id);
        assert_eq!(loaded.task, "do the thing");
    }

    #[tokio::test]
    async fn get_job_in_session_rejects_foreign_session() {
        let store = store();
        let (session, run) = ids();
        let job = store
            .create_job("t", None, None, None, session, run)
            .await
            .unwrap();

        let other = SessionId::new("sess-2");
        let err = store.get_job_in_session(&job.id, &other).await.unwrap_err();
        assert!(matches!(err, JobsError::ForeignSession { .. }));
    }

    #[tokio::test]
    async fn update_job_status_is_sticky_in_practice() {
        let store = store();
        let (session, run) = ids();
        let job = store
            .create_job("t", None, None, None, session, run)
            .await
            .unwrap();

        let updated = store
            .update_job_status(&job.id, JobStatus::Running, None, None)
            .await
            .unwrap();
        assert_eq!(updated.status, JobStatus::Running);

        let done = store
            .update_job_status(
                &job.id,
                JobStatus::Done,
                Some(serde_json::json!({"ok": true})),
                None,
            )
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Done);
        assert!(done.result_json.is_some());
    }

    #[tokio::test]
    async fn append_event_preserves_causal_order() {
        let store = store();
        let (session, run) = ids();
        let job = store
            .create_job("t", None, None, None, session.clone(), run.clone())
            .await
            .unwrap();

        store
            .append_event(&job.id, JobEventKind::Start, None, session.clone(), run.clone())
            .await
            .unwrap();
        store
            .append_event(
                &job.id,
                JobEventKind::ToolCall,
                Some(serde_json::json!({"name": "fs.read"})),
                session.clone(),
                run.clone(),
            )
            .await
            .unwrap();
        store
            .append_event(&job.id, JobEventKind::Finish, None, session, run)
            .await
            .unwrap();

        let events = store.list_events(&job.id).await.unwrap();
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                JobEventKind::Start,
                JobEventKind::ToolCall,
                JobEventKind::Finish
            ]
        );
    }

    #[tokio::test]
    async fn list_jobs_filters_by_session_and_status() {
        let store = store();
        let (session_a, run) = ids();
        let session_b = SessionId::new("sess-2");

        let j1 = store
            .create_job("a1", None, None, None, session_a.clone(), run.clone())
            .await
            .unwrap();
        let _j2 = store
            .create_job("b1", None, None, None, session_b.clone(), run.clone())
            .await
            .unwrap();

        store
            .update_job_status(&j1.id, JobStatus::Done, None, None)
            .await
            .unwrap();

        let a_jobs = store
            .list_jobs(&ListJobsQuery {
                session_id: Some(session_a.as_str().to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(a_jobs.len(), 1);
        assert_eq!(a_jobs[0].id, j1.id);

        let all_jobs = store
            .list_jobs(&ListJobsQuery {
                all_sessions: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all_jobs.len(), 2);

        let done_jobs = store
            .list_jobs(&ListJobsQuery {
                all_sessions: true,
                status: Some(JobStatus::Done),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(done_jobs.len(), 1);
        assert_eq!(done_jobs[0].id, j1.id);
    }

    #[tokio::test]
    async fn list_jobs_subset_of_all_sessions_invariant() {
        let store = store();
        let (session, run) = ids();
        for i in 0..3 {
            store
                .create_job(format!("t{i}"), None, None, None, session.clone(), run.clone())
                .await
                .unwrap();
        }

        let scoped = store
            .list_jobs(&ListJobsQuery {
                session_id: Some(session.as_str().to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let all = store
            .list_jobs(&ListJobsQuery {
                all_sessions: true,
                ..Default::default()
            })
            .await
            .unwrap();

        let all_ids: std::collections::HashSet<_> = all.iter().map(|j| j.id.clone()).collect();
        assert!(scoped.iter().all(|j| all_ids.contains(&j.id)));
    }

    #[tokio::test]
    async fn list_sessions_orders_by_recent_activity() {
        let store = store();
        let run = RunId::new("run-1");
        let session_a = SessionId::new("a");
        let session_b = SessionId::new("b");

        store
            .create_job("t", None, None, None, session_a.clone(), run.clone())
            .await
            .unwrap();
        store
            .create_job("t", None, None, None, session_b.clone(), run.clone())
            .await
            .unwrap();
        // Touch `a` again so it becomes most-recent.
        store
            .create_job("t2", None, None, None, session_a.clone(), run)
            .await
            .unwrap();

        let sessions = store.list_sessions(None).await.unwrap();
        assert_eq!(sessions, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn append_model_route_round_trips() {
        let store = store();
        let (session, run) = ids();
        let job = store
            .create_job("t", None, None, None, session.clone(), run.clone())
            .await
            .unwrap();

        let route = store
            .append_model_route(&job.id, "model-1", session, run)
            .await
            .unwrap();
        assert_eq!(route.job_id, job.id);
        assert_eq!(route.model_id, "model-1");
    }
}
